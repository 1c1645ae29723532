use std::{process, sync::Arc, time::Duration};

use rasoio::{
    application::error::AppError,
    application::notify::DispatchService,
    config,
    edge::{EdgeConfig, EdgeRouter, LifecycleController, StoreSet},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, PublicState},
        origin::OriginFetcher,
        push::HttpPushProvider,
        telemetry,
    },
};
use tokio::try_join;
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

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
    if settings.push.admin_token.is_empty() {
        return Err(AppError::from(InfraError::configuration(
            "push.admin_token must be set (RASOIO__PUSH__ADMIN_TOKEN) to start the admin API",
        )));
    }

    let db = Arc::new(connect_database(&settings).await?);

    PostgresRepositories::run_migrations(db.pool())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    // Edge subsystem: versioned stores, router, and the install/activate
    // lifecycle run to completion before the listeners come up.
    let edge_config = EdgeConfig::from(&settings.edge);
    let stores = Arc::new(StoreSet::new(
        edge_config.document_entry_limit_non_zero(),
        edge_config.media_entry_limit_non_zero(),
    ));
    let edge_router = Arc::new(EdgeRouter::new(stores.clone(), edge_config.clone()));
    let lifecycle = Arc::new(LifecycleController::new(stores, edge_config.clone()));
    let fetcher = Arc::new(OriginFetcher::new(settings.edge.origin_url.clone()));

    let precached = lifecycle.install(fetcher.as_ref()).await;
    let evicted = lifecycle.activate();
    info!(
        version = settings.edge.cache_version,
        precached, evicted, "edge stores active"
    );

    let provider = Arc::new(HttpPushProvider::new(
        settings.push.endpoint.clone(),
        settings.push.api_key.clone(),
    ));
    let dispatch = Arc::new(DispatchService::new(db.clone(), db.clone(), provider));

    let public_state = PublicState {
        router: edge_router,
        fetcher: fetcher.clone(),
        proxy: fetcher,
        lifecycle,
        config: edge_config,
    };
    let api_state = ApiState {
        dispatch,
        notifications: db.clone(),
        db: db.clone(),
        admin_token: Arc::new(settings.push.admin_token.clone()),
    };

    serve_http(&settings, public_state, api_state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let db = connect_database(&settings).await?;
    PostgresRepositories::run_migrations(db.pool())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    info!("migrations applied");
    Ok(())
}

async fn connect_database(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "database.url must be set (RASOIO__DATABASE__URL or --database-url)",
        ))
    })?;

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    Ok(PostgresRepositories::new(pool))
}

async fn serve_http(
    settings: &config::Settings,
    public_state: PublicState,
    api_state: ApiState,
) -> Result<(), AppError> {
    let public_router = http::build_public_router(public_state);
    let api_router = http::build_api_router(api_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin_listener, api_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    let drain_limit = settings.server.graceful_shutdown;
    let servers = async { try_join!(public_server, admin_server) };
    tokio::select! {
        result = servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline(drain_limit) => {
            warn!(
                limit_secs = drain_limit.as_secs(),
                "graceful shutdown deadline reached, closing remaining connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received, draining connections"),
        Err(err) => {
            error!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves once the configured drain window has elapsed after the shutdown
/// signal. Pending ctrl-c listeners all resolve on the same signal.
async fn drain_deadline(limit: Duration) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tokio::time::sleep(limit).await;
    } else {
        std::future::pending::<()>().await;
    }
}
