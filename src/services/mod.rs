pub mod mutation;
pub mod plan_store;
pub mod schedule;
pub mod summary;
