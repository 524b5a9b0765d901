use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::billing_plan::BillingPlan;
use crate::models::common::{BillingCycle, PlanStatus};
use crate::models::payment::{PaymentEntry, PaymentStatus};

#[derive(Debug, Serialize, PartialEq)]
pub struct BillingSummary {
    pub patient_id: Uuid,
    pub billing_cycle: BillingCycle,
    pub plan_status: PlanStatus,
    pub price: Decimal,
    pub currency: String,
    pub paid_count: usize,
    pub overdue_count: usize,
    pub amount_overdue: Decimal,
    pub next_due_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
}

impl BillingSummary {
    pub fn from_schedule(plan: &BillingPlan, entries: &[PaymentEntry]) -> Self {
        let count = |status: PaymentStatus| entries.iter().filter(|e| e.status == status).count();
        let overdue_count = count(PaymentStatus::Overdue);

        Self {
            patient_id: plan.patient_id,
            billing_cycle: plan.billing_cycle,
            plan_status: plan.status,
            price: plan.price,
            currency: plan.currency.clone(),
            paid_count: count(PaymentStatus::Paid),
            overdue_count,
            amount_overdue: plan.price * Decimal::from(overdue_count),
            next_due_date: entries
                .iter()
                .find(|e| e.status == PaymentStatus::Upcoming)
                .map(|e| e.date),
            last_payment_date: plan.last_payment_date,
        }
    }
}

/// Trims a schedule for display: the most recent `paid_limit` paid entries,
/// then every unpaid entry.
pub fn recent_entries(entries: &[PaymentEntry], paid_limit: usize) -> Vec<PaymentEntry> {
    let paid = entries.iter().take_while(|e| e.status.is_paid()).count();
    let skip = paid.saturating_sub(paid_limit);
    entries[skip..].to_vec()
}
