use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use departures_server::cache::RawDepartureCache;
use departures_server::config::AppConfig;
use departures_server::fetcher::Fetcher;
use departures_server::grouping::GroupingService;
use departures_server::poller::{Broadcaster, Poller};
use departures_server::provider::{
    CompositeDepartureRepository, DepartureRepository, MockDepartureRepository,
    RateLimitedRepository, RepositoryKey,
};
use departures_server::rate_limit::RateLimiterRegistry;
use departures_server::web::{AppState, RouteHandle, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let mock = match MockDepartureRepository::from_dir(&config.mock_dir) {
        Ok(mock) => Arc::new(mock),
        Err(e) => {
            error!(dir = ?config.mock_dir, error = %e, "failed to load mock departures");
            std::process::exit(1);
        }
    };
    info!(stations = mock.available_stations().len(), "loaded mock departures");

    // Every provider name in the configuration is served by the mock data,
    // each behind its own rate limiter.
    let registry = RateLimiterRegistry::global();
    let fallback: Arc<dyn DepartureRepository> = Arc::new(
        RateLimitedRepository::new(mock.clone(), registry, "mock", config.rate_limit.min_delay)
            .await,
    );
    let mut builder = CompositeDepartureRepository::builder(fallback);
    let mut keys: Vec<RepositoryKey> = config.all_stops().map(RepositoryKey::for_stop).collect();
    keys.sort_by_key(|k| k.to_string());
    keys.dedup();
    for key in keys {
        let limited = RateLimitedRepository::new(
            mock.clone(),
            registry,
            &key.api_provider,
            config.rate_limit.min_delay,
        )
        .await;
        builder = builder.register(key, Arc::new(limited));
    }
    let repository: Arc<dyn DepartureRepository> = Arc::new(builder.build(config.all_stops()));

    let raw_cache = RawDepartureCache::default();
    let fetcher = Arc::new(Fetcher::for_stops(
        repository.clone(),
        raw_cache.clone(),
        config.all_stops(),
        config.fetcher.clone(),
    ));
    info!(stations = fetcher.station_ids().len(), "starting fetcher");
    let mut tasks = vec![fetcher.start()];

    let broadcaster = Arc::new(Broadcaster::new());
    let mut handles = Vec::new();
    for route in &config.routes {
        let poller = Poller::new(
            route.stops.clone(),
            config.poller_config(route),
            GroupingService::new(repository.clone()),
            broadcaster.clone(),
        )
        .with_raw_cache(raw_cache.clone());
        handles.push((route.topic.clone(), RouteHandle::new(route, poller.snapshot())));
        tasks.push(Arc::new(poller).start());
    }

    let app = create_router(AppState::new(handles));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, routes = config.routes.len(), "departures server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await;
    if let Err(e) = served {
        error!(error = %e, "server error");
    }

    info!("shutting down");
    for task in tasks {
        task.stop().await;
    }
}
