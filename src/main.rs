use std::sync::Arc;

use actix_web::web;
use dotenvy::dotenv;
use order_backoffice::application::outbound;
use order_backoffice::config::Config;
use order_backoffice::infrastructure::notifier::LogNotifier;
use order_backoffice::{build_server, build_services, create_pool, run_migrations};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cfg = Config::from_env();
    let pool = create_pool(&cfg.database_url, cfg.db_pool_size);
    run_migrations(&pool);

    let (services, outbound_rx, cache_store) =
        build_services(pool, &cfg).expect("Failed to construct application services");

    tokio::spawn(outbound::run_worker(
        outbound_rx,
        Arc::new(LogNotifier),
        cache_store,
    ));

    log::info!("Starting server at http://{}:{}", cfg.host, cfg.port);

    build_server(web::Data::new(services), &cfg.host, cfg.port)?.await
}
