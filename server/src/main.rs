use clap::Parser;
use log::{error, info, warn};
use server::clock::MonotonicClock;
use server::config::EngineConfig;
use server::factory::{DefaultOperationFactory, OperationFactory};
use server::game::Game;
use server::network::{Server, ServerMessage};
use server::scheduler::Scheduler;
use std::sync::Arc;
use tokio::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, then starts the network server and the dispatch loop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Maximum number of connected players
        #[clap(short, long, default_value = "16")]
        max_clients: usize,
        /// Seconds of silence before a client is logged out
        #[clap(long, default_value = "5")]
        client_timeout: u64,
        /// Milliseconds between swings of an auto-attack
        #[clap(long, default_value = "2000")]
        attack_interval_ms: u64,
        /// Seed for combat rolls and monster placement
        #[clap(long)]
        seed: Option<u64>,
        /// Start without monster spawns
        #[clap(long)]
        no_spawns: bool,
    }

    env_logger::init();

    // Parse command line arguments
    let args = Args::parse();

    let config = EngineConfig {
        attack_interval: Duration::from_millis(args.attack_interval_ms),
        client_timeout: Duration::from_secs(args.client_timeout),
        ..EngineConfig::default()
    };

    let scheduler = Scheduler::new(Arc::new(MonotonicClock::new()));
    let factory: Arc<dyn OperationFactory> =
        Arc::new(DefaultOperationFactory::new(config.clone()));

    // Create network server
    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        args.max_clients,
        config.client_timeout,
        scheduler.clone(),
        Arc::clone(&factory),
    )
    .await?;
    let control = server.control();

    let mut game = Game::new(config, scheduler.clone(), server.outbound()).with_factory(factory);
    if let Some(seed) = args.seed {
        game = game.with_seed(seed);
    }
    if !args.no_spawns {
        let spawns = game.schedule_spawns()?;
        info!("Scheduled {} spawn point(s)", spawns);
    }

    // Spawn dispatch loop
    let game_handle = tokio::spawn(async move {
        game.run().await;
    });

    // Spawn network task
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Network server failed: {}", e);
        }
    });

    // Handle shutdown gracefully
    tokio::select! {
        result = server_handle => {
            if let Err(e) = result {
                error!("Network task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            if control.send(ServerMessage::Shutdown).is_err() {
                warn!("Network server already stopped");
            }
        }
    }

    scheduler.shutdown();
    if let Err(e) = game_handle.await {
        error!("Dispatch loop panicked: {}", e);
    }

    Ok(())
}
