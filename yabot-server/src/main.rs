//! YABOT Server
//!
//! Headless backend for a gamified Telegram community: besitos wallet,
//! missions, achievements, auctions, trivia, store and subscriptions,
//! coordinated through a typed event bus.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use yabot_core::achievements::AchievementSystem;
use yabot_core::auctions::AuctionSystem;
use yabot_core::config::ConfigStore;
use yabot_core::cross_module::CrossModuleService;
use yabot_core::events::{EventBus, InProcessBroker};
use yabot_core::missions::MissionManager;
use yabot_core::processors::{
    DeadlineKind, DeadlineScheduler, DefaultHandlers, EventProcessor, ExpirySweeper, Notifier,
};
use yabot_core::store::StoreService;
use yabot_core::subscriptions::SubscriptionManager;
use yabot_core::trivia::TriviaEngine;
use yabot_core::wallet::BesitosWallet;

/// YABOT - Gamified community-bot backend
#[derive(Parser, Debug)]
#[command(name = "yabot-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./yabot-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting yabot-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Shutdown signal shared by every background processor
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Runtime-reloadable config stores
    let economy_store = ConfigStore::new(loaded_config.economy);
    let sweeper_store = ConfigStore::new(loaded_config.sweeper);
    let notifier_gateway = loaded_config.notifier_gateway.clone();

    // Event bus over the in-process broker relay
    let bus = EventBus::new(Arc::new(InProcessBroker::new()));

    // Wallet and gamification managers
    let wallet = Arc::new(BesitosWallet::new(db_pool.clone(), bus.clone()));
    let missions = Arc::new(MissionManager::new(
        db_pool.clone(),
        bus.clone(),
        economy_store.clone(),
    ));
    let achievements = Arc::new(AchievementSystem::new(db_pool.clone(), bus.clone()));
    let store = Arc::new(StoreService::new(db_pool.clone(), bus.clone()));
    let subscriptions = Arc::new(SubscriptionManager::new(db_pool.clone(), bus.clone()));

    // Deadline scheduler and the systems that use it
    let (deadline_handle, mut elapsed_rx) = DeadlineScheduler::spawn(shutdown_rx.clone());
    let auctions = Arc::new(AuctionSystem::new(
        db_pool.clone(),
        bus.clone(),
        deadline_handle.clone(),
    ));
    let trivia = Arc::new(TriviaEngine::new(
        db_pool.clone(),
        bus.clone(),
        deadline_handle,
    ));

    // Dispatch elapsed deadlines to the owning system
    {
        let auctions = Arc::clone(&auctions);
        let trivia = Arc::clone(&trivia);
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    Some(elapsed) = elapsed_rx.recv() => {
                        let result = match elapsed.kind {
                            DeadlineKind::Auction => auctions
                                .close_auction(elapsed.id)
                                .await
                                .map(|_| ())
                                .map_err(|e| e.to_string()),
                            DeadlineKind::Trivia => trivia
                                .close_session(elapsed.id)
                                .await
                                .map(|_| ())
                                .map_err(|e| e.to_string()),
                        };
                        if let Err(error) = result {
                            tracing::error!(id = %elapsed.id, %error, "Deadline close failed");
                        }
                    }
                    else => break,
                }
            }
        });
    }

    // Restore persisted deadlines after restart
    auctions.restore_deadlines().await?;
    trivia.restore_deadlines().await?;

    // Event processor with the default handler set
    let processor = Arc::new(EventProcessor::new(bus.clone()));
    processor
        .start_processing(DefaultHandlers {
            missions: Arc::clone(&missions),
            achievements: Arc::clone(&achievements),
        })
        .await;
    let processor_rx = bus.subscribe_all().await;
    tokio::spawn(Arc::clone(&processor).run(processor_rx, shutdown_rx.clone()));

    // Expiry sweeper
    let sweeper = ExpirySweeper::new(
        Arc::clone(&missions),
        Arc::clone(&subscriptions),
        sweeper_store.clone(),
    );
    tokio::spawn(sweeper.run(shutdown_rx.clone(), sweeper_store.subscribe()));

    // Notifier, when a gateway is configured
    if let Some(gateway_url) = notifier_gateway {
        let notifier_rx = bus.subscribe_all().await;
        tokio::spawn(Notifier::new(gateway_url, notifier_rx, shutdown_rx.clone()).run());
    }

    // Cross-module façade
    let cross = Arc::new(CrossModuleService::new(
        db_pool.clone(),
        bus.clone(),
        Arc::clone(&wallet),
        Arc::clone(&missions),
        economy_store.clone(),
    ));

    // Application state
    let state = AppState {
        db: db_pool.clone(),
        config: loaded_config.into_shared(),
        processor: Arc::clone(&processor),
        wallet,
        cross,
        store,
        auctions,
        trivia,
        subscriptions,
        achievements,
    };

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(
        state.clone(),
        config_loader,
        economy_store,
        sweeper_store,
    );

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop background processors and wait for in-flight handlers
    let _ = shutdown_tx.send(true);
    processor.stop_processing().await;
    shutdown_notify.notify_one();

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
