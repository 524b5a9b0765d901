use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while turning a stored plan into a schedule, or while
/// applying a paid/unpaid toggle to one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The stored record cannot describe a schedule. This is a defect in the
    /// data, never a user input problem.
    #[error("Invalid billing plan: {0}")]
    InvalidPlan(String),

    #[error("No payment entry scheduled on {0}")]
    EntryNotFound(NaiveDate),

    #[error("Cannot mark {0} as paid before it is due")]
    FuturePayment(NaiveDate),
}

impl ScheduleError {
    pub fn invalid_plan(reason: impl Into<String>) -> Self {
        ScheduleError::InvalidPlan(reason.into())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No billing plan found for patient {0}")]
    PlanNotFound(Uuid),

    #[error("Patient {0} already has a billing plan")]
    PlanAlreadyExists(Uuid),

    #[error("Rejected plan update: {0}")]
    InvalidUpdate(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}
