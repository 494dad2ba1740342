use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod model;
mod models;
mod routes;
mod utils;
mod workflow;

use config::Config;
use db::{init_db, leave_store::MySqlWorkflowStore};

use crate::api::LeaveService;
use crate::auth::bootstrap::{self, BootstrapAdmin};
use crate::docs::ApiDoc;
use crate::utils::policy_cache;
use crate::workflow::routing::ConfiguredRouting;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Leave Desk is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    // fail fast on a malformed chain before accepting traffic
    let routing = ConfiguredRouting::parse(
        &config.approval_chain_default,
        &config.approval_chains_by_type,
        &config.approval_chains_by_department,
    )
    .map_err(|e| anyhow::anyhow!("invalid approval chain configuration: {}", e))?;

    let pool = init_db(&config.database_url).await?;
    info!("Database ready, migrations applied");

    if let Some(admin) = BootstrapAdmin::from_config(&config) {
        bootstrap::ensure_admin(&pool, &admin).await?;
    }

    let pool_for_cache_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = policy_cache::warmup_policy_cache(&pool_for_cache_warmup).await {
            error!(error = %e, "Failed to warmup policy cache");
        }
    });

    let service: Data<LeaveService> =
        Data::new(LeaveService::new(MySqlWorkflowStore::new(pool.clone()), routing));
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(service.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
