//! Match-suggestion workflow service
//!
//! (c) Matchflow contributors 2025

use matchflow::NOTIFICATION_SENDER;
use matchflow::api;
use matchflow::config::Settings;
use matchflow::core::notifications::{self, ChannelNotificationDispatcher};
use matchflow::core::services::{WorkflowMeetingService, WorkflowSuggestionService};
use matchflow::infrastructure::database::DatabaseConnection;
use matchflow::infrastructure::repositories::DbSuggestionRepository;

use anyhow::{Context, anyhow};
use axum::Router;
use axum::http::{HeaderValue, Method};
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use log::info;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load()?;

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let pool = DatabaseConnection::connect(&settings.database_url, 5)
            .await
            .context("cannot open database")?;
        DatabaseConnection::migrate(&pool).await?;
        DatabaseConnection::install(pool);

        // background task for transition notifications
        let (sender, receiver) = mpsc::channel(settings.notification_queue_capacity);
        NOTIFICATION_SENDER
            .set(sender)
            .map_err(|_| anyhow!("notification sender already set"))?;
        let notifier_handle = tokio::spawn(notifications::background_task(receiver));

        web_server_task(&settings).await?;

        notifier_handle.abort();
        Ok(())
    })
}

async fn web_server_task(settings: &Settings) -> anyhow::Result<()> {
    let provider = ServiceCollection::new()
        .add(DatabaseConnection::singleton())
        .add(DbSuggestionRepository::scoped())
        .add(ChannelNotificationDispatcher::singleton())
        .add(WorkflowSuggestionService::scoped())
        .add(WorkflowMeetingService::scoped())
        .build_provider()
        .map_err(|e| anyhow!("invalid service registrations: {e:?}"))?;

    let origins = settings
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .context("invalid ALLOWED_ORIGINS entry")?;

    let app = Router::new()
        .nest("/suggestions", api::suggestions::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_headers(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PUT])
                        .allow_origin(origins),
                ),
        )
        .with_provider(provider);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    info!("Shutting down...");

    Ok(())
}
