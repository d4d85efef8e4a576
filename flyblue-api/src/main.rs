use anyhow::Context;
use flyblue_api::{app, AppState, JwtCredentials};
use flyblue_core::catalog::SeatGrid;
use flyblue_core::identity::BcryptHasher;
use flyblue_core::BookingService;
use flyblue_store::app_config::Config;
use flyblue_store::{DbClient, PgDatabase};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SEAT_EVENT_CAPACITY: usize = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flyblue_api=debug,flyblue_core=info,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting FlyBlue API on port {}", config.server.port);

    // Database Connection
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let seat_grid = SeatGrid::new(config.seat_grid.rows, &config.seat_grid.columns)
        .context("Invalid seat grid configuration")?;

    let credentials = JwtCredentials::new(&config.auth.jwt_secret, config.auth.jwt_expiration_seconds)
        .context("Invalid auth configuration")?;

    let service = BookingService::new(
        Arc::new(PgDatabase::new(db.clone())),
        Arc::new(BcryptHasher::new(config.auth.bcrypt_cost)),
        Arc::new(credentials),
        seat_grid,
    );

    if let Some(admin) = &config.admin {
        let admin = service
            .ensure_admin(&admin.name, &admin.email, &admin.password)
            .await
            .context("Failed to bootstrap administrator")?;
        tracing::info!(user_id = admin.id, "Administrator ready");
    }

    let app = app(AppState::new(service, SEAT_EVENT_CAPACITY));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
