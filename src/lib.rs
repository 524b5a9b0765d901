//! Billing-plan schedules for the coaching platform.
//!
//! The core ([`services::schedule`] and [`services::mutation`]) is pure: a
//! plan snapshot and the caller's current date go in, a classified list of
//! due dates or a new payment mark comes out. The store and HTTP handlers
//! around it play the persistence and routing roles.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use error::{ScheduleError, StoreError};
pub use models::billing_plan::BillingPlan;
pub use models::common::BillingCycle;
pub use models::payment::{PaymentEntry, PaymentStatus};
pub use services::mutation::{toggle, toggle_as_of};
pub use services::schedule::generate;
