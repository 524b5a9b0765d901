use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Overdue,
    Upcoming,
}

impl PaymentStatus {
    /// Classifies a due date against the paid high-water mark and `today`.
    pub fn classify(date: NaiveDate, last_payment_date: Option<NaiveDate>, today: NaiveDate) -> Self {
        match last_payment_date {
            Some(last_paid) if date <= last_paid => PaymentStatus::Paid,
            _ if date < today => PaymentStatus::Overdue,
            _ => PaymentStatus::Upcoming,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Overdue => write!(f, "overdue"),
            PaymentStatus::Upcoming => write!(f, "upcoming"),
        }
    }
}

/// One due date of a generated schedule. Derived on every read, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentEntry {
    pub date: NaiveDate,
    pub status: PaymentStatus,
}

impl PaymentEntry {
    pub fn new(date: NaiveDate, status: PaymentStatus) -> Self {
        Self { date, status }
    }
}

#[derive(Debug, Deserialize)]
pub struct TogglePaymentRequest {
    pub date: NaiveDate,
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct TogglePaymentResponse {
    pub new_last_payment_date: Option<NaiveDate>,
    pub entries: Vec<PaymentEntry>,
}
