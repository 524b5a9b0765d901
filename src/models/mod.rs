pub mod billing_plan;
pub mod common;
pub mod payment;
