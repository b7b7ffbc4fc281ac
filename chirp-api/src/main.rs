use chirp_common::{
    snowflake::{ProcessId, SnowflakePartOutOfRangeError, WorkerId},
    util::{NonPositiveDurationError, PositiveDuration},
};
use chirp_db::{
    client::DbClient,
    memory::MemoryStore,
    store::{DbError, RecordStore},
};
use serde::Deserialize;
use server::{AccountSettings, ServerState};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;
mod service;
mod session;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid snowflake configuration: {0}")]
    Snowflake(#[from] SnowflakePartOutOfRangeError),
    #[error("Invalid auth token lifetime: {0}")]
    TokenLifetime(#[from] NonPositiveDurationError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: Option<String>,
    #[serde(default)]
    worker_id: u8,
    #[serde(default)]
    process_id: u8,
    auth_token_lifetime_seconds: Option<i64>,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chirp_api=debug,chirp_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn open_store(env: &Env) -> Result<Arc<dyn RecordStore>, InitError> {
    let worker_id = WorkerId::new(env.worker_id)?;
    let process_id = ProcessId::new(env.process_id)?;

    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, keeping all data in memory");
        return Ok(Arc::new(MemoryStore::new(worker_id, process_id)));
    };

    let client = DbClient::connect(database_url, worker_id, process_id).await?;
    client.migrate().await?;
    info!("Connected to database");

    Ok(Arc::new(client))
}

/// Cancels `shutdown` on ctrl-c.
async fn watch_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutting down");
            shutdown.cancel();
        }
        Err(err) => error!(%err, "Could not listen for ctrl-c, running until killed"),
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let accounts = AccountSettings {
        token_lifetime: env
            .auth_token_lifetime_seconds
            .map(PositiveDuration::from_seconds)
            .transpose()?,
    };
    let state = ServerState {
        store: open_store(&env).await?,
        accounts,
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().with_state(state).layer(tracing_layer);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_ctrl_c(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
