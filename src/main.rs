use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use snaplink::analytics::{
    AggregationEngine, ClickPipeline, ClickTracker, DeviceGeoEnricher, ExternalApiProvider,
    GeoLookup, RetryPolicy,
};
use snaplink::cache::{MokaResolutionCache, ResolutionCache};
use snaplink::config::Config;
use snaplink::services::{api_routes, redirect_routes, LinkService, Resolver};
use snaplink::storages::StorageFactory;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let store = StorageFactory::create().unwrap_or_else(|e| {
        eprintln!("Failed to create storage: {}", e);
        std::process::exit(1);
    });
    info!("Using storage backend: {}", store.backend_name());

    let cache: Arc<dyn ResolutionCache> = Arc::new(MokaResolutionCache::new(&config.cache));
    let resolver = Arc::new(Resolver::new(Arc::clone(&cache), Arc::clone(&store)));
    let links = Arc::new(LinkService::new(
        Arc::clone(&store),
        Arc::clone(&resolver),
        config.links.clone(),
    ));
    let stats = Arc::new(AggregationEngine::new(Arc::clone(&store)));

    let geoip: Arc<dyn GeoLookup> =
        Arc::new(ExternalApiProvider::new(&config.analytics.geoip_api_url));
    info!("GeoIP: Initialized with {} provider", geoip.name());

    let tracker = ClickTracker::new(
        Arc::clone(&store),
        Arc::new(DeviceGeoEnricher::new(geoip)),
        RetryPolicy {
            max_attempts: config.analytics.retry_max_attempts,
            base_delay: Duration::from_millis(config.analytics.retry_base_ms),
        },
        Duration::from_millis(config.analytics.persist_timeout_ms),
    );
    let workers = config.pipeline_workers();
    let pipeline = ClickPipeline::spawn(tracker, config.analytics.queue_capacity, workers);
    info!(
        "Click pipeline started: {} workers, queue capacity {}",
        workers, config.analytics.queue_capacity
    );

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting server at http://{}", bind_address);

    let link_config = config.links.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&resolver)))
            .app_data(web::Data::new(Arc::clone(&links)))
            .app_data(web::Data::new(Arc::clone(&stats)))
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(link_config.clone()))
            .configure(api_routes)
            .configure(redirect_routes)
    })
    .bind(bind_address)?
    .run()
    .await
}
