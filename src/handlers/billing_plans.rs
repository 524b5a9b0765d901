use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, patch, post, HttpResponse, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::config::BillingConfig;
use crate::error::{ScheduleError, StoreError};
use crate::models::billing_plan::{
    BillingPlan, BillingPlanRecord, CreateBillingPlanRequest, ScheduleQuery, UpdateBillingPlanRequest,
};
use crate::models::common::ApiResponse;
use crate::models::payment::{PaymentEntry, TogglePaymentRequest, TogglePaymentResponse};
use crate::services::plan_store::PlanStore;
use crate::services::schedule;
use crate::services::summary::{recent_entries, BillingSummary};

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub patient_id: Uuid,
    pub today: NaiveDate,
    pub hidden_paid_count: usize,
    pub entries: Vec<PaymentEntry>,
}

#[derive(Debug, serde::Deserialize)]
pub struct SummaryQuery {
    pub today: Option<NaiveDate>,
}

// The server's calendar date is only ever read here, at the edge.
fn resolve_today(requested: Option<NaiveDate>) -> NaiveDate {
    requested.unwrap_or_else(|| Local::now().date_naive())
}

fn error_response(error: StoreError) -> HttpResponse {
    let body = ApiResponse::<()>::error(error.to_string());
    match &error {
        StoreError::PlanNotFound(_) => HttpResponse::NotFound().json(body),
        StoreError::PlanAlreadyExists(_) => HttpResponse::Conflict().json(body),
        StoreError::InvalidUpdate(_) => HttpResponse::BadRequest().json(body),
        StoreError::Schedule(ScheduleError::EntryNotFound(_) | ScheduleError::FuturePayment(_)) => {
            HttpResponse::BadRequest().json(body)
        }
        StoreError::Schedule(ScheduleError::InvalidPlan(reason)) => {
            log::error!("Stored billing plan is corrupt: {}", reason);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

fn validation_response(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::<()>::error(format!("Validation failed: {}", errors)))
}

fn snapshot(record: &BillingPlanRecord) -> Result<BillingPlan, HttpResponse> {
    BillingPlan::try_from(record).map_err(|e| error_response(e.into()))
}

#[post("")]
pub async fn create_plan(
    store: Data<PlanStore>,
    payload: Json<CreateBillingPlanRequest>,
) -> Result<HttpResponse> {
    let request = payload.into_inner();
    if let Err(errors) = request.validate() {
        return Ok(validation_response(errors));
    }

    match store.create_plan(request).await {
        Ok(record) => Ok(HttpResponse::Created().json(ApiResponse::success(record))),
        Err(e) => Ok(error_response(e)),
    }
}

#[get("/{patient_id}")]
pub async fn get_plan(store: Data<PlanStore>, path: Path<Uuid>) -> Result<HttpResponse> {
    match store.get_plan(&path.into_inner()).await {
        Ok(record) => Ok(HttpResponse::Ok().json(ApiResponse::success(record))),
        Err(e) => Ok(error_response(e)),
    }
}

#[patch("/{patient_id}")]
pub async fn update_plan(
    store: Data<PlanStore>,
    path: Path<Uuid>,
    payload: Json<UpdateBillingPlanRequest>,
) -> Result<HttpResponse> {
    let request = payload.into_inner();
    if let Err(errors) = request.validate() {
        return Ok(validation_response(errors));
    }

    match store.update_plan(&path.into_inner(), request).await {
        Ok(record) => Ok(HttpResponse::Ok().json(ApiResponse::success(record))),
        Err(e) => Ok(error_response(e)),
    }
}

#[delete("/{patient_id}")]
pub async fn delete_plan(store: Data<PlanStore>, path: Path<Uuid>) -> Result<HttpResponse> {
    let patient_id = path.into_inner();
    match store.delete_plan(&patient_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            patient_id,
            "Billing plan deleted".to_string(),
        ))),
        Err(e) => Ok(error_response(e)),
    }
}

#[get("/{patient_id}/schedule")]
pub async fn get_schedule(
    store: Data<PlanStore>,
    billing: Data<BillingConfig>,
    path: Path<Uuid>,
    query: Query<ScheduleQuery>,
) -> Result<HttpResponse> {
    let patient_id = path.into_inner();
    let record = match store.get_plan(&patient_id).await {
        Ok(record) => record,
        Err(e) => return Ok(error_response(e)),
    };
    let plan = match snapshot(&record) {
        Ok(plan) => plan,
        Err(response) => return Ok(response),
    };

    let today = resolve_today(query.today);
    let entries = match schedule::generate(&plan, today) {
        Ok(entries) => entries,
        Err(e) => return Ok(error_response(e.into())),
    };

    let paid_limit = query.paid_limit.unwrap_or(billing.paid_display_limit);
    let shown = recent_entries(&entries, paid_limit);

    Ok(HttpResponse::Ok().json(ApiResponse::success(ScheduleResponse {
        patient_id,
        today,
        hidden_paid_count: entries.len() - shown.len(),
        entries: shown,
    })))
}

#[get("/{patient_id}/summary")]
pub async fn get_summary(
    store: Data<PlanStore>,
    path: Path<Uuid>,
    query: Query<SummaryQuery>,
) -> Result<HttpResponse> {
    let record = match store.get_plan(&path.into_inner()).await {
        Ok(record) => record,
        Err(e) => return Ok(error_response(e)),
    };
    let plan = match snapshot(&record) {
        Ok(plan) => plan,
        Err(response) => return Ok(response),
    };

    match schedule::generate(&plan, resolve_today(query.today)) {
        Ok(entries) => Ok(HttpResponse::Ok().json(ApiResponse::success(
            BillingSummary::from_schedule(&plan, &entries),
        ))),
        Err(e) => Ok(error_response(e.into())),
    }
}

#[post("/{patient_id}/toggle")]
pub async fn toggle_payment(
    store: Data<PlanStore>,
    path: Path<Uuid>,
    payload: Json<TogglePaymentRequest>,
) -> Result<HttpResponse> {
    let patient_id = path.into_inner();
    let today = resolve_today(payload.today);

    let record = match store.toggle_payment(&patient_id, payload.date, today).await {
        Ok(record) => record,
        Err(e) => return Ok(error_response(e)),
    };
    let plan = match snapshot(&record) {
        Ok(plan) => plan,
        Err(response) => return Ok(response),
    };

    match schedule::generate(&plan, today) {
        Ok(entries) => Ok(HttpResponse::Ok().json(ApiResponse::success(TogglePaymentResponse {
            new_last_payment_date: plan.last_payment_date,
            entries,
        }))),
        Err(e) => Ok(error_response(e.into())),
    }
}

#[get("/{professional_id}/billing-plans")]
pub async fn list_professional_plans(store: Data<PlanStore>, path: Path<Uuid>) -> Result<HttpResponse> {
    let plans = store.list_plans_for_professional(&path.into_inner()).await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(plans)))
}
