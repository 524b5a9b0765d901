use chrono::NaiveDate;

use crate::error::ScheduleError;
use crate::models::billing_plan::BillingPlan;
use crate::models::payment::PaymentEntry;

/// Resolves a "mark paid / unpaid" click on `target_date` into the plan's new
/// `last_payment_date`.
///
/// Marking an unpaid entry pays it and everything before it. Unmarking a
/// paid entry moves the high-water mark back to the entry before it, or
/// clears it when the first entry is unmarked. Paid entries therefore always
/// form a prefix of `entries`.
pub fn toggle(
    plan: &BillingPlan,
    entries: &[PaymentEntry],
    target_date: NaiveDate,
) -> Result<Option<NaiveDate>, ScheduleError> {
    let position = entries
        .iter()
        .position(|entry| entry.date == target_date)
        .ok_or_else(|| {
            log::warn!(
                "Rejected toggle for patient {}: {} is not a scheduled due date",
                plan.patient_id,
                target_date
            );
            ScheduleError::EntryNotFound(target_date)
        })?;

    let new_last_payment_date = if entries[position].status.is_paid() {
        position.checked_sub(1).map(|previous| entries[previous].date)
    } else {
        Some(target_date)
    };

    log::debug!(
        "Toggled {} for patient {}: last payment {:?} -> {:?}",
        target_date,
        plan.patient_id,
        plan.last_payment_date,
        new_last_payment_date
    );
    Ok(new_last_payment_date)
}

/// [`toggle`] as applied on `today`: an unpaid entry dated after `today`
/// cannot be marked, so the high-water mark never lands in the future.
/// Unmarking is always allowed.
pub fn toggle_as_of(
    plan: &BillingPlan,
    entries: &[PaymentEntry],
    target_date: NaiveDate,
    today: NaiveDate,
) -> Result<Option<NaiveDate>, ScheduleError> {
    let new_last_payment_date = toggle(plan, entries, target_date)?;
    if new_last_payment_date.map_or(false, |date| date > today) {
        log::warn!(
            "Rejected toggle for patient {}: {} is after {}",
            plan.patient_id,
            target_date,
            today
        );
        return Err(ScheduleError::FuturePayment(target_date));
    }
    Ok(new_last_payment_date)
}
