use std::{future::IntoFuture, process, sync::Arc};

use bannerd::{
    application::{
        banners::{BannerService, CachePolicy},
        error::AppError,
        repos::{BannerCache, BannerStore},
    },
    config::{self, CacheBackend},
    infra::{
        cache::{MemoryBannerCache, RedisBannerCache},
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use sqlx::PgPool;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = init_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let store: Arc<dyn BannerStore> = Arc::new(PostgresRepositories::new(pool));
    let cache = init_cache(&settings.cache).await?;

    let banners = BannerService::new(store, cache).with_policy(CachePolicy {
        strict_writes: settings.cache.strict_writes,
    });
    let state = ApiState::new(Arc::new(banners), settings.auth.clone());

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = init_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!(target: "bannerd::migrate", "database migrations applied");
    Ok(())
}

async fn init_pool(settings: &config::Settings) -> Result<PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn init_cache(settings: &config::CacheSettings) -> Result<Arc<dyn BannerCache>, AppError> {
    match settings.backend {
        CacheBackend::Redis => {
            let cache = RedisBannerCache::connect(&settings.redis_url, settings.ttl)
                .await
                .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
            cache
                .ping()
                .await
                .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
            info!(
                target: "bannerd::cache",
                ttl_seconds = settings.ttl.as_secs(),
                "using redis banner cache"
            );
            Ok(Arc::new(cache))
        }
        CacheBackend::Memory => {
            info!(
                target: "bannerd::cache",
                ttl_seconds = settings.ttl.as_secs(),
                "using in-process banner cache"
            );
            Ok(Arc::new(MemoryBannerCache::new(settings.ttl)))
        }
    }
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.notified().await }
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server => return flatten_server_result(result),
        () = shutdown_signal() => {
            info!("shutdown signal received, draining connections");
            shutdown.notify_one();
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => flatten_server_result(result),
        Err(_) => {
            warn!(
                timeout_seconds = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

fn flatten_server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
