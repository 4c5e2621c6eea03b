pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::sync::mpsc::UnboundedReceiver;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::analytics::{AnalyticsCache, AnalyticsService};
use application::export::ExportService;
use application::order_service::OrderService;
use application::outbound::{self, OutboundTask};
use application::refund_service::RefundService;
use config::Config;
use domain::errors::DomainError;
use infrastructure::cache::RedisCacheStore;
use infrastructure::order_repo::DieselOrderRepository;
use infrastructure::payment::HttpPaymentGateway;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

/// Every application service, constructed once at startup with its
/// collaborators injected, and shared with the handlers via `web::Data`.
pub struct AppServices {
    pub orders: OrderService<DieselOrderRepository>,
    pub refunds: RefundService<DieselOrderRepository, HttpPaymentGateway>,
    pub exports: ExportService<DieselOrderRepository>,
    pub analytics: AnalyticsService<DieselOrderRepository, RedisCacheStore>,
}

/// Wire adapters into services. Also returns the outbound task receiver for
/// the worker and the cache store handle it invalidates through.
///
/// A missing or unreachable cache store is not fatal: the analytics layer
/// degrades to computing every aggregate directly.
pub fn build_services(
    pool: DbPool,
    cfg: &Config,
) -> Result<
    (
        AppServices,
        UnboundedReceiver<OutboundTask>,
        Option<RedisCacheStore>,
    ),
    DomainError,
> {
    let repo = DieselOrderRepository::new(pool);
    let (queue, outbound_rx) = outbound::channel();

    let cache_store = match &cfg.redis_url {
        Some(url) => match RedisCacheStore::connect(url) {
            Ok(store) => Some(store),
            Err(e) => {
                log::warn!("cache store unavailable ({e}); analytics will compute directly");
                None
            }
        },
        None => None,
    };

    let gateway = HttpPaymentGateway::new(
        &cfg.payment_api_url,
        &cfg.payment_api_key,
        cfg.payment_timeout,
    )?;

    let services = AppServices {
        orders: OrderService::new(repo.clone(), queue.clone()),
        refunds: RefundService::new(repo.clone(), gateway, queue),
        exports: ExportService::new(repo.clone()),
        analytics: AnalyticsService::new(repo, AnalyticsCache::new(cache_store.clone())),
    };

    Ok((services, outbound_rx, cache_store))
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    services: web::Data<AppServices>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(services.clone())
            .wrap(Logger::default())
            .service(
                web::scope("/orders")
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/export", web::get().to(handlers::orders::export_orders))
                    .route("/bulk/status", web::post().to(handlers::orders::bulk_update_status))
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route("/{id}/status", web::post().to(handlers::orders::update_status))
                    .route(
                        "/{id}/fulfillment",
                        web::post().to(handlers::orders::set_fulfillment),
                    )
                    .route("/{id}/refund", web::post().to(handlers::orders::process_refund)),
            )
            .service(
                web::scope("/analytics")
                    .route("/summary", web::get().to(handlers::analytics::sales_summary))
                    .route(
                        "/status-breakdown",
                        web::get().to(handlers::analytics::status_breakdown),
                    ),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", handlers::ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
