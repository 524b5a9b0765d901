use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::billing_plan::{
    BillingPlan, BillingPlanRecord, CreateBillingPlanRequest, UpdateBillingPlanRequest,
};
use crate::models::common::BillingCycle;
use crate::services::{mutation, schedule};

/// In-process store of billing plans, one per patient. Dates are kept as the
/// plain strings the rest of the platform writes.
#[derive(Clone)]
pub struct PlanStore {
    plans: Arc<RwLock<HashMap<Uuid, BillingPlanRecord>>>,
    default_currency: String,
}

impl PlanStore {
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            plans: Arc::new(RwLock::new(HashMap::new())),
            default_currency: default_currency.into(),
        }
    }

    pub async fn create_plan(&self, request: CreateBillingPlanRequest) -> Result<BillingPlanRecord, StoreError> {
        let mut plans = self.plans.write().await;

        if plans.contains_key(&request.patient_id) {
            return Err(StoreError::PlanAlreadyExists(request.patient_id));
        }

        let record = BillingPlanRecord::new(request, &self.default_currency);
        plans.insert(record.patient_id, record.clone());

        log::info!(
            "Created {} billing plan {} for patient {}",
            record.billing_cycle,
            record.id,
            record.patient_id
        );
        Ok(record)
    }

    /// Raw access for callers that store records directly, such as imports.
    pub async fn insert_record(&self, record: BillingPlanRecord) -> Result<(), StoreError> {
        let mut plans = self.plans.write().await;
        if plans.contains_key(&record.patient_id) {
            return Err(StoreError::PlanAlreadyExists(record.patient_id));
        }
        plans.insert(record.patient_id, record);
        Ok(())
    }

    pub async fn get_plan(&self, patient_id: &Uuid) -> Result<BillingPlanRecord, StoreError> {
        let plans = self.plans.read().await;
        plans
            .get(patient_id)
            .cloned()
            .ok_or(StoreError::PlanNotFound(*patient_id))
    }

    pub async fn list_plans_for_professional(&self, professional_id: &Uuid) -> Vec<BillingPlanRecord> {
        let plans = self.plans.read().await;
        let mut records: Vec<_> = plans
            .values()
            .filter(|p| p.professional_id == *professional_id)
            .cloned()
            .collect();
        records.sort_by_key(|p| p.created_at);
        records
    }

    /// Applies a partial edit. When the schedule's shape changes and the
    /// recorded last payment no longer lands on a due date, the payment mark
    /// is cleared.
    pub async fn update_plan(
        &self,
        patient_id: &Uuid,
        request: UpdateBillingPlanRequest,
    ) -> Result<BillingPlanRecord, StoreError> {
        let mut plans = self.plans.write().await;
        let record = plans
            .get_mut(patient_id)
            .ok_or(StoreError::PlanNotFound(*patient_id))?;

        let mut updated = record.clone();
        if updated.apply_update(request) {
            let plan = BillingPlan::try_from(&updated)?;
            if let (BillingCycle::Custom, Some(next)) = (plan.billing_cycle, plan.next_payment_date) {
                if next <= plan.start_date {
                    return Err(StoreError::InvalidUpdate(format!(
                        "next payment date {} must be after start date {}",
                        next, plan.start_date
                    )));
                }
            }
            if let Some(last_paid) = plan.last_payment_date {
                if !schedule::falls_on_due_date(&plan, last_paid)? {
                    log::info!(
                        "Cleared last payment {} on patient {}: no longer a due date",
                        last_paid,
                        patient_id
                    );
                    updated.set_last_payment_date(None);
                }
            }
        }

        *record = updated.clone();
        log::info!("Updated billing plan for patient {}", patient_id);
        Ok(updated)
    }

    pub async fn delete_plan(&self, patient_id: &Uuid) -> Result<(), StoreError> {
        let mut plans = self.plans.write().await;
        plans
            .remove(patient_id)
            .map(|record| log::info!("Deleted billing plan {} for patient {}", record.id, patient_id))
            .ok_or(StoreError::PlanNotFound(*patient_id))
    }

    /// Partial update of the payment high-water mark; every other field is
    /// left as stored.
    pub async fn set_last_payment_date(
        &self,
        patient_id: &Uuid,
        date: Option<NaiveDate>,
    ) -> Result<BillingPlanRecord, StoreError> {
        let mut plans = self.plans.write().await;
        let record = plans
            .get_mut(patient_id)
            .ok_or(StoreError::PlanNotFound(*patient_id))?;

        record.set_last_payment_date(date);
        log::info!("Set last payment date of patient {} to {:?}", patient_id, date);
        Ok(record.clone())
    }

    /// Reads the plan, resolves the toggle against a fresh schedule and
    /// writes the new mark back, all under one write lock.
    pub async fn toggle_payment(
        &self,
        patient_id: &Uuid,
        target_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<BillingPlanRecord, StoreError> {
        let mut plans = self.plans.write().await;
        let record = plans
            .get_mut(patient_id)
            .ok_or(StoreError::PlanNotFound(*patient_id))?;

        let plan = BillingPlan::try_from(&*record)?;
        let entries = schedule::generate(&plan, today)?;
        let new_last_payment_date = mutation::toggle_as_of(&plan, &entries, target_date, today)?;

        record.set_last_payment_date(new_last_payment_date);
        log::info!(
            "Toggled payment {} for patient {}: last payment now {:?}",
            target_date,
            patient_id,
            new_last_payment_date
        );
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScheduleError;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_request(patient_id: Uuid, professional_id: Uuid) -> CreateBillingPlanRequest {
        CreateBillingPlanRequest {
            patient_id,
            professional_id,
            price: Decimal::new(450_00, 2),
            currency: Some("usd".to_string()),
            billing_cycle: BillingCycle::Monthly,
            status: None,
            start_date: date(2024, 1, 31),
            next_payment_date: None,
            notes: Some("Sessions every Tuesday".to_string()),
        }
    }

    #[tokio::test]
    async fn test_one_plan_per_patient() {
        let store = PlanStore::new("ZAR");
        let patient_id = Uuid::new_v4();

        let record = store.create_plan(create_request(patient_id, Uuid::new_v4())).await.unwrap();
        assert_eq!(record.currency, "USD");

        let duplicate = store.create_plan(create_request(patient_id, Uuid::new_v4())).await;
        assert!(matches!(duplicate, Err(StoreError::PlanAlreadyExists(id)) if id == patient_id));
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let store = PlanStore::new("ZAR");
        let patient_id = Uuid::new_v4();
        store.create_plan(create_request(patient_id, Uuid::new_v4())).await.unwrap();

        assert!(store.get_plan(&patient_id).await.is_ok());
        store.delete_plan(&patient_id).await.unwrap();
        assert!(matches!(store.get_plan(&patient_id).await, Err(StoreError::PlanNotFound(_))));
        assert!(store.delete_plan(&patient_id).await.is_err());
    }

    #[tokio::test]
    async fn test_list_plans_for_professional() {
        let store = PlanStore::new("ZAR");
        let professional_id = Uuid::new_v4();
        store.create_plan(create_request(Uuid::new_v4(), professional_id)).await.unwrap();
        store.create_plan(create_request(Uuid::new_v4(), professional_id)).await.unwrap();
        store.create_plan(create_request(Uuid::new_v4(), Uuid::new_v4())).await.unwrap();

        assert_eq!(store.list_plans_for_professional(&professional_id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_toggle_payment_writes_back_only_the_mark() {
        let store = PlanStore::new("ZAR");
        let patient_id = Uuid::new_v4();
        let created = store.create_plan(create_request(patient_id, Uuid::new_v4())).await.unwrap();
        let today = date(2024, 4, 15);

        let record = store.toggle_payment(&patient_id, date(2024, 3, 29), today).await.unwrap();
        assert_eq!(record.last_payment_date.as_deref(), Some("2024-03-29"));
        assert_eq!(record.price, created.price);
        assert_eq!(record.notes, created.notes);
        assert_eq!(record.start_date, created.start_date);

        let record = store.toggle_payment(&patient_id, date(2024, 3, 29), today).await.unwrap();
        assert_eq!(record.last_payment_date.as_deref(), Some("2024-02-29"));
    }

    #[tokio::test]
    async fn test_toggle_payment_rejects_unknown_date() {
        let store = PlanStore::new("ZAR");
        let patient_id = Uuid::new_v4();
        store.create_plan(create_request(patient_id, Uuid::new_v4())).await.unwrap();

        let result = store.toggle_payment(&patient_id, date(2024, 3, 1), date(2024, 4, 15)).await;
        assert!(matches!(
            result,
            Err(StoreError::Schedule(ScheduleError::EntryNotFound(_)))
        ));
        assert_eq!(store.get_plan(&patient_id).await.unwrap().last_payment_date, None);
    }

    #[tokio::test]
    async fn test_toggle_payment_rejects_future_entry() {
        let store = PlanStore::new("ZAR");
        let patient_id = Uuid::new_v4();
        store.create_plan(create_request(patient_id, Uuid::new_v4())).await.unwrap();
        let today = date(2024, 4, 15);

        let result = store.toggle_payment(&patient_id, date(2024, 4, 29), today).await;
        assert!(matches!(
            result,
            Err(StoreError::Schedule(ScheduleError::FuturePayment(d))) if d == date(2024, 4, 29)
        ));

        let record = store.get_plan(&patient_id).await.unwrap();
        assert_eq!(record.last_payment_date, None);
        let plan = BillingPlan::try_from(&record).unwrap();
        let entries = schedule::generate(&plan, today).unwrap();
        assert!(entries.iter().filter(|e| e.date >= today).count() <= 1);
    }

    #[tokio::test]
    async fn test_corrupt_record_surfaces_invalid_plan() {
        let store = PlanStore::new("ZAR");
        let mut record = BillingPlanRecord::new(create_request(Uuid::new_v4(), Uuid::new_v4()), "ZAR");
        record.billing_cycle = "biweekly".to_string();
        let patient_id = record.patient_id;
        store.insert_record(record).await.unwrap();

        let result = store.toggle_payment(&patient_id, date(2024, 1, 31), date(2024, 4, 15)).await;
        assert!(matches!(
            result,
            Err(StoreError::Schedule(ScheduleError::InvalidPlan(_)))
        ));
    }

    #[tokio::test]
    async fn test_reshaping_plan_clears_stale_mark() {
        let store = PlanStore::new("ZAR");
        let patient_id = Uuid::new_v4();
        store.create_plan(create_request(patient_id, Uuid::new_v4())).await.unwrap();
        store.set_last_payment_date(&patient_id, Some(date(2024, 2, 29))).await.unwrap();

        let record = store
            .update_plan(
                &patient_id,
                UpdateBillingPlanRequest {
                    billing_cycle: Some(BillingCycle::Quarterly),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(record.billing_cycle, "quarterly");
        assert_eq!(record.last_payment_date, None);
    }

    #[tokio::test]
    async fn test_custom_update_with_early_next_date_is_rejected() {
        let store = PlanStore::new("ZAR");
        let patient_id = Uuid::new_v4();
        store.create_plan(create_request(patient_id, Uuid::new_v4())).await.unwrap();

        let result = store
            .update_plan(
                &patient_id,
                UpdateBillingPlanRequest {
                    billing_cycle: Some(BillingCycle::Custom),
                    next_payment_date: Some(Some(date(2024, 1, 1))),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::InvalidUpdate(_))));
        assert_eq!(store.get_plan(&patient_id).await.unwrap().billing_cycle, "monthly");
    }

    #[tokio::test]
    async fn test_reshaping_plan_keeps_mark_still_on_schedule() {
        let store = PlanStore::new("ZAR");
        let patient_id = Uuid::new_v4();
        store.create_plan(create_request(patient_id, Uuid::new_v4())).await.unwrap();
        store.set_last_payment_date(&patient_id, Some(date(2024, 4, 30))).await.unwrap();

        let record = store
            .update_plan(
                &patient_id,
                UpdateBillingPlanRequest {
                    billing_cycle: Some(BillingCycle::Quarterly),
                    price: Some(Decimal::new(1200_00, 2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(record.last_payment_date.as_deref(), Some("2024-04-30"));
        assert_eq!(record.price, Decimal::new(1200_00, 2));
    }
}
