//! # Twivility
//!
//! Tracks a Twitter account's home timeline and serves it as JSON, while
//! capturing live mentions of the followed accounts to an append-only log.
//!
//! ## Usage
//!
//! ```bash
//! twivility [service|update|dump|json|stream]
//! ```
//!
//! - `service` (default): refresh every few minutes, stream mentions and serve HTTP
//! - `update`: pull new timeline tweets into the store once and exit
//! - `dump` / `json`: print the stored tweets as a JSON document
//! - `stream`: stream mentions of the stored accounts until Ctrl+C
//!
//! `update` should not run while a `service` instance owns the same store.
//!
//! ## Environment Variables
//!
//! - `TWITTER_ACCESS_TOKEN`: bearer token (required)
//! - `TWIVILITY_DATA_FILE`, `TWIVILITY_MENTIONS_FILE`, `TWIVILITY_HASHTAG_FILE`
//! - `TWIVILITY_HOST`: listen address (defaults to `127.0.0.1:8484`)
//! - `TWIVILITY_REFRESH_SCHEDULE`: cron expression (defaults to every 5 minutes)
//! - `RUST_LOG`: log level, e.g. `RUST_LOG=info`

use std::env;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use twivility::{
    read_hashtags, router, run_refresh_cycle, start_refresh_cronjob, to_json, AppState,
    MentionStreamer, ServiceConfig, StreamSupervisor, TweetCache, TwitterClient, TwitterConfig,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Initialize the logging system
    env_logger::init();
    info!("STARTING twivility {}", env!("CARGO_PKG_VERSION"));

    let command = env::args().nth(1).unwrap_or_else(|| "service".to_string());
    let service_config = ServiceConfig::from_env();
    let client = Arc::new(TwitterClient::new(TwitterConfig::from_env()?));
    let cache = Arc::new(TweetCache::new(client.clone(), &service_config.data_file));

    match command.as_str() {
        "dump" | "json" => {
            let records = cache.reload_from_disk().await?;
            println!("{}", String::from_utf8_lossy(&to_json(&records)?));
            Ok(())
        }
        "update" => {
            client.verify_credentials().await?;
            let added = cache.refresh().await?;
            info!("Update complete: {} new tweets", added);
            Ok(())
        }
        "stream" => {
            client.verify_credentials().await?;
            run_stream(&service_config, client, cache).await
        }
        "service" => {
            client.verify_credentials().await?;
            run_service(&service_config, client, cache).await
        }
        other => {
            error!(
                "Unknown command '{}'. Options are service, update, stream, or dump",
                other
            );
            Err(format!("unknown command '{}'", other).into())
        }
    }
}

async fn build_streamer(
    service_config: &ServiceConfig,
    client: Arc<TwitterClient>,
) -> Result<Arc<MentionStreamer>, BoxError> {
    let hashtags = read_hashtags(service_config.hashtag_file.as_deref()).await?;
    let streamer = MentionStreamer::new(client, &service_config.mentions_file, hashtags)
        .with_mention_callback(|record| {
            info!(
                "Mention {} from @{}",
                record.id,
                record.author_handle.trim_start_matches('@')
            );
        });
    Ok(Arc::new(streamer))
}

/// Streams mentions of the stored accounts in the foreground until Ctrl+C.
async fn run_stream(
    service_config: &ServiceConfig,
    client: Arc<TwitterClient>,
    cache: Arc<TweetCache>,
) -> Result<(), BoxError> {
    cache.reload_from_disk().await?;
    let accounts = cache.accounts().await;
    let streamer = build_streamer(service_config, client).await?;

    let mut task = {
        let streamer = streamer.clone();
        tokio::spawn(async move { streamer.stream(&accounts).await })
    };

    tokio::select! {
        result = &mut task => {
            result??;
            info!("Mention stream ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping mention stream");
            streamer.stop().await?;
            task.await??;
        }
    }
    Ok(())
}

/// Runs the HTTP service with periodic refresh and mention streaming.
async fn run_service(
    service_config: &ServiceConfig,
    client: Arc<TwitterClient>,
    cache: Arc<TweetCache>,
) -> Result<(), BoxError> {
    let streamer = build_streamer(service_config, client).await?;
    let supervisor = Arc::new(Mutex::new(StreamSupervisor::new(streamer)));

    // Initial update before we start serving
    run_refresh_cycle(&cache, Some(supervisor.as_ref())).await?;

    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
    let mut scheduler = start_refresh_cronjob(
        cache.clone(),
        Some(supervisor.clone()),
        &service_config.refresh_schedule,
        fatal_tx,
    )
    .await?;
    scheduler.start().await?;

    let app = router(AppState { cache })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = tokio::net::TcpListener::bind(&service_config.listen_addr).await?;
    info!("Starting listen on {}", service_config.listen_addr);

    let outcome: Result<(), BoxError> = tokio::select! {
        result = axum::serve(listener, app) => {
            result.map_err(|e| {
                error!("HTTP server error: {}", e);
                e.into()
            })
        }
        Some(e) = fatal_rx.recv() => {
            error!("Shutting down after fatal error: {}", e);
            Err(e.into())
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    if let Err(e) = scheduler.shutdown().await {
        warn!("Failed to stop cronjob scheduler cleanly: {}", e);
    }
    if let Err(e) = supervisor.lock().await.shutdown().await {
        warn!("Mention stream did not shut down cleanly: {}", e);
    }
    info!("Exiting");
    outcome
}
