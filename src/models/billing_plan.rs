use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::ScheduleError;
use crate::models::common::{BillingCycle, PlanStatus};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A billing plan row as the store keeps it. Dates and the cycle are plain
/// strings, so a record may hold values no schedule can be built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingPlanRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub price: Decimal,
    pub currency: String,
    pub billing_cycle: String,
    pub status: PlanStatus,
    pub start_date: String,
    pub next_payment_date: Option<String>,
    pub last_payment_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Typed snapshot of a plan, the only input the schedule core reads.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingPlan {
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub price: Decimal,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub status: PlanStatus,
    pub start_date: NaiveDate,
    pub next_payment_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_create_dates"))]
pub struct CreateBillingPlanRequest {
    pub patient_id: Uuid,
    pub professional_id: Uuid,

    #[validate(custom = "validate_price")]
    pub price: Decimal,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    pub billing_cycle: BillingCycle,
    pub status: Option<PlanStatus>,
    pub start_date: NaiveDate,
    pub next_payment_date: Option<NaiveDate>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Partial edit. For `next_payment_date` and `notes` an absent field leaves
/// the stored value alone while an explicit `null` clears it.
#[derive(Debug, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_update_notes"))]
pub struct UpdateBillingPlanRequest {
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    pub billing_cycle: Option<BillingCycle>,
    pub status: Option<PlanStatus>,
    pub start_date: Option<NaiveDate>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub next_payment_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub today: Option<NaiveDate>,
    pub paid_limit: Option<usize>,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || price.is_zero() {
        return Err(ValidationError::new("price_must_be_positive"));
    }
    Ok(())
}

fn validate_create_dates(request: &CreateBillingPlanRequest) -> Result<(), ValidationError> {
    if let Some(next) = request.next_payment_date {
        if next <= request.start_date {
            return Err(ValidationError::new("next_payment_date_not_after_start_date"));
        }
    }
    Ok(())
}

fn validate_update_notes(request: &UpdateBillingPlanRequest) -> Result<(), ValidationError> {
    if let Some(Some(notes)) = &request.notes {
        if notes.chars().count() > 2000 {
            let mut error = ValidationError::new("length");
            error.message = Some("Notes must be at most 2000 characters".into());
            return Err(error);
        }
    }
    Ok(())
}

/// Distinguishes `"field": null` (`Some(None)`) from a missing field, which
/// `#[serde(default)]` leaves as `None`.
fn present_or_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
        ScheduleError::invalid_plan(format!("{} '{}' is not a calendar date: {}", field, value, e))
    })
}

fn parse_optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ScheduleError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_date(field, v).map(Some),
    }
}

impl BillingPlanRecord {
    pub fn new(request: CreateBillingPlanRequest, default_currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            professional_id: request.professional_id,
            price: request.price,
            currency: request
                .currency
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| default_currency.to_string()),
            billing_cycle: request.billing_cycle.to_string(),
            status: request.status.unwrap_or_default(),
            start_date: format_date(request.start_date),
            next_payment_date: request.next_payment_date.map(format_date),
            last_payment_date: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the fields present in `request`, leaving the others untouched.
    /// Returns true when the schedule shape (start date, cycle or custom next
    /// date) changed.
    pub fn apply_update(&mut self, request: UpdateBillingPlanRequest) -> bool {
        let mut reshaped = false;

        if let Some(price) = request.price {
            self.price = price;
        }
        if let Some(currency) = request.currency {
            self.currency = currency.to_uppercase();
        }
        if let Some(cycle) = request.billing_cycle {
            reshaped |= self.billing_cycle != cycle.as_str();
            self.billing_cycle = cycle.to_string();
        }
        if let Some(status) = request.status {
            self.status = status;
        }
        if let Some(start_date) = request.start_date {
            let start_date = format_date(start_date);
            reshaped |= self.start_date != start_date;
            self.start_date = start_date;
        }
        if let Some(next) = request.next_payment_date {
            let next = next.map(format_date);
            reshaped |= self.next_payment_date != next;
            self.next_payment_date = next;
        }
        if let Some(notes) = request.notes {
            self.notes = notes;
        }

        self.updated_at = Utc::now();
        reshaped
    }

    pub fn set_last_payment_date(&mut self, date: Option<NaiveDate>) {
        self.last_payment_date = date.map(format_date);
        self.updated_at = Utc::now();
    }
}

impl TryFrom<&BillingPlanRecord> for BillingPlan {
    type Error = ScheduleError;

    fn try_from(record: &BillingPlanRecord) -> Result<Self, Self::Error> {
        if record.start_date.trim().is_empty() {
            return Err(ScheduleError::invalid_plan("start_date is missing"));
        }

        Ok(BillingPlan {
            patient_id: record.patient_id,
            professional_id: record.professional_id,
            price: record.price,
            currency: record.currency.clone(),
            billing_cycle: record.billing_cycle.parse()?,
            status: record.status,
            start_date: parse_date("start_date", &record.start_date)?,
            next_payment_date: parse_optional_date("next_payment_date", record.next_payment_date.as_deref())?,
            last_payment_date: parse_optional_date("last_payment_date", record.last_payment_date.as_deref())?,
            notes: record.notes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_request() -> CreateBillingPlanRequest {
        CreateBillingPlanRequest {
            patient_id: Uuid::new_v4(),
            professional_id: Uuid::new_v4(),
            price: Decimal::new(450_00, 2),
            currency: None,
            billing_cycle: BillingCycle::Monthly,
            status: None,
            start_date: date(2024, 1, 1),
            next_payment_date: None,
            notes: None,
        }
    }

    #[test]
    fn test_record_round_trips_to_plan() {
        let record = BillingPlanRecord::new(create_request(), "ZAR");
        assert_eq!(record.start_date, "2024-01-01");
        assert_eq!(record.billing_cycle, "monthly");
        assert_eq!(record.currency, "ZAR");
        assert_eq!(record.status, PlanStatus::Active);

        let plan = BillingPlan::try_from(&record).unwrap();
        assert_eq!(plan.start_date, date(2024, 1, 1));
        assert_eq!(plan.billing_cycle, BillingCycle::Monthly);
        assert_eq!(plan.last_payment_date, None);
    }

    #[test]
    fn test_unparsable_start_date_is_invalid_plan() {
        let mut record = BillingPlanRecord::new(create_request(), "ZAR");
        record.start_date = "01/01/2024".to_string();
        assert!(matches!(BillingPlan::try_from(&record), Err(ScheduleError::InvalidPlan(_))));

        record.start_date = String::new();
        assert!(matches!(BillingPlan::try_from(&record), Err(ScheduleError::InvalidPlan(_))));
    }

    #[test]
    fn test_unknown_cycle_is_invalid_plan() {
        let mut record = BillingPlanRecord::new(create_request(), "ZAR");
        record.billing_cycle = "fortnightly".to_string();
        assert!(matches!(BillingPlan::try_from(&record), Err(ScheduleError::InvalidPlan(_))));
    }

    #[test]
    fn test_blank_optional_dates_read_as_none() {
        let mut record = BillingPlanRecord::new(create_request(), "ZAR");
        record.last_payment_date = Some(" ".to_string());
        let plan = BillingPlan::try_from(&record).unwrap();
        assert_eq!(plan.last_payment_date, None);
    }

    #[test]
    fn test_create_request_validation() {
        let request = create_request();
        assert!(request.validate().is_ok());

        let mut request = create_request();
        request.price = Decimal::ZERO;
        assert!(request.validate().is_err());

        let mut request = create_request();
        request.currency = Some("RAND".to_string());
        assert!(request.validate().is_err());

        let mut request = create_request();
        request.billing_cycle = BillingCycle::Custom;
        request.next_payment_date = Some(date(2023, 12, 1));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_apply_update_reports_reshaping() {
        let mut record = BillingPlanRecord::new(create_request(), "ZAR");

        let reshaped = record.apply_update(UpdateBillingPlanRequest {
            notes: Some(Some("Paid by EFT".to_string())),
            price: Some(Decimal::new(500_00, 2)),
            ..Default::default()
        });
        assert!(!reshaped);
        assert_eq!(record.price, Decimal::new(500_00, 2));

        let reshaped = record.apply_update(UpdateBillingPlanRequest {
            billing_cycle: Some(BillingCycle::Quarterly),
            ..Default::default()
        });
        assert!(reshaped);
        assert_eq!(record.billing_cycle, "quarterly");

        let reshaped = record.apply_update(UpdateBillingPlanRequest {
            billing_cycle: Some(BillingCycle::Quarterly),
            ..Default::default()
        });
        assert!(!reshaped);
    }

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let request: UpdateBillingPlanRequest =
            serde_json::from_str(r#"{"next_payment_date": null, "notes": "Paid by EFT"}"#).unwrap();
        assert_eq!(request.next_payment_date, Some(None));
        assert_eq!(request.notes, Some(Some("Paid by EFT".to_string())));

        let request: UpdateBillingPlanRequest = serde_json::from_str(r#"{"price": 500.0}"#).unwrap();
        assert_eq!(request.next_payment_date, None);
        assert_eq!(request.notes, None);

        let request: UpdateBillingPlanRequest =
            serde_json::from_str(r#"{"next_payment_date": "2024-03-15"}"#).unwrap();
        assert_eq!(request.next_payment_date, Some(Some(date(2024, 3, 15))));
    }

    #[test]
    fn test_apply_update_clears_next_date_and_notes() {
        let mut request = create_request();
        request.billing_cycle = BillingCycle::Custom;
        request.next_payment_date = Some(date(2024, 2, 15));
        request.notes = Some("Sessions every Tuesday".to_string());
        let mut record = BillingPlanRecord::new(request, "ZAR");

        let reshaped = record.apply_update(UpdateBillingPlanRequest {
            price: Some(Decimal::new(500_00, 2)),
            ..Default::default()
        });
        assert!(!reshaped);
        assert_eq!(record.next_payment_date.as_deref(), Some("2024-02-15"));
        assert_eq!(record.notes.as_deref(), Some("Sessions every Tuesday"));

        let reshaped = record.apply_update(UpdateBillingPlanRequest {
            next_payment_date: Some(None),
            notes: Some(None),
            ..Default::default()
        });
        assert!(reshaped);
        assert_eq!(record.next_payment_date, None);
        assert_eq!(record.notes, None);
    }

    #[test]
    fn test_update_notes_length_is_validated() {
        let request = UpdateBillingPlanRequest {
            notes: Some(Some("x".repeat(2001))),
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = UpdateBillingPlanRequest {
            notes: Some(None),
            ..Default::default()
        };
        assert!(request.validate().is_ok());
    }
}
