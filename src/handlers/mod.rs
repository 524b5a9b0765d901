pub mod billing_plans;
pub mod health;

use actix_web::web;

/// Registers every billing route on `cfg`; mounted under `/api/v1`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/billing-plans")
            .service(billing_plans::create_plan)
            .service(billing_plans::get_schedule)
            .service(billing_plans::get_summary)
            .service(billing_plans::toggle_payment)
            .service(billing_plans::get_plan)
            .service(billing_plans::update_plan)
            .service(billing_plans::delete_plan),
    )
    .service(web::scope("/professionals").service(billing_plans::list_professional_plans))
    .route("/health", web::get().to(health::health_check));
}
