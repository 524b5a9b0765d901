//! Due-date schedule generation for billing plans.
//!
//! A schedule is rebuilt from the plan's scalars on every read. Each periodic
//! due date is the previous one stepped forward by the cycle's months,
//! clamped to the last day of the month when the day does not exist there
//! (Jan 31 runs Feb 29, Mar 29, Apr 29, ...).

use chrono::{Months, NaiveDate};

use crate::error::ScheduleError;
use crate::models::billing_plan::BillingPlan;
use crate::models::payment::{PaymentEntry, PaymentStatus};

fn step(due: NaiveDate, cycle_months: u32) -> Result<NaiveDate, ScheduleError> {
    due.checked_add_months(Months::new(cycle_months)).ok_or_else(|| {
        ScheduleError::invalid_plan(format!(
            "stepping {} by {} months is out of calendar range",
            due, cycle_months
        ))
    })
}

/// Builds the full schedule of `plan` as seen on `today`.
///
/// Periodic plans step forward until the first entry that is neither paid nor
/// in the past, so the result always ends on exactly one `Upcoming` entry.
/// Custom plans hold the start date and, when set, the single next payment
/// date.
pub fn generate(plan: &BillingPlan, today: NaiveDate) -> Result<Vec<PaymentEntry>, ScheduleError> {
    let classify = |date: NaiveDate| PaymentEntry::new(date, PaymentStatus::classify(date, plan.last_payment_date, today));

    let entries = match plan.billing_cycle.months() {
        Some(cycle_months) => {
            let mut entries = Vec::new();
            let mut due = plan.start_date;
            loop {
                let entry = classify(due);
                entries.push(entry);
                if entry.status == PaymentStatus::Upcoming {
                    break;
                }
                due = step(due, cycle_months)?;
            }
            entries
        }
        None => {
            let mut entries = vec![classify(plan.start_date)];
            match plan.next_payment_date {
                Some(next) if next > plan.start_date => entries.push(classify(next)),
                Some(next) => log::warn!(
                    "Ignoring next payment {} of patient {}: not after start date {}",
                    next,
                    plan.patient_id,
                    plan.start_date
                ),
                None => {}
            }
            entries
        }
    };

    log::debug!(
        "Generated {} {} entries for patient {} as of {}",
        entries.len(),
        plan.billing_cycle,
        plan.patient_id,
        today
    );
    Ok(entries)
}

/// Whether `date` is one of the plan's due dates, independent of `today`.
pub fn falls_on_due_date(plan: &BillingPlan, date: NaiveDate) -> Result<bool, ScheduleError> {
    if date < plan.start_date {
        return Ok(false);
    }

    match plan.billing_cycle.months() {
        Some(cycle_months) => {
            let mut due = plan.start_date;
            while due < date {
                due = step(due, cycle_months)?;
            }
            Ok(due == date)
        }
        None => Ok(date == plan.start_date || plan.next_payment_date == Some(date)),
    }
}
