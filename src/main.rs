use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;

use coaching_billing::config::Config;
use coaching_billing::handlers;
use coaching_billing::services::plan_store::PlanStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let plan_store = web::Data::new(PlanStore::new(config.billing.default_currency.clone()));
    let billing_config = web::Data::new(config.billing.clone());
    let cors_origin = config.server.cors_allowed_origin.clone();

    let bind_address = config.bind_address();
    log::info!("Starting billing plan server on {}", bind_address);

    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header(),
            None => Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header(),
        };

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(plan_store.clone())
            .app_data(billing_config.clone())
            .service(web::scope("/api/v1").configure(handlers::configure))
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await?;

    Ok(())
}
