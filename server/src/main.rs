use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, env = "PORT", default_value = "3000")]
    port: u16,
    /// Maximum concurrent players in the room
    #[clap(short, long, default_value_t = shared::MAX_PLAYERS)]
    capacity: usize,
    /// Delay before a defeated player respawns, in milliseconds
    #[clap(long, default_value_t = shared::RESPAWN_DELAY_MS)]
    respawn_ms: u64,
    /// Inactivity before a player is kicked, in milliseconds
    #[clap(long, default_value_t = shared::IDLE_TIMEOUT_MS)]
    idle_timeout_ms: u64,
    /// Interval between idle sweeps, in milliseconds
    #[clap(long, default_value_t = shared::IDLE_CHECK_INTERVAL_MS)]
    idle_check_ms: u64,
    /// Minimum movement before an update is relayed
    #[clap(long, default_value_t = shared::MOVE_EPSILON)]
    move_epsilon: f32,
}

/// Main-method of the server binary.
/// Parses command-line arguments, builds the configuration and runs the room loop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        capacity: args.capacity.max(1),
        respawn_delay: Duration::from_millis(args.respawn_ms),
        idle_timeout: Duration::from_millis(args.idle_timeout_ms),
        idle_check_interval: Duration::from_millis(args.idle_check_ms.max(1)),
        move_epsilon: args.move_epsilon.max(0.0),
        ..ServerConfig::default()
    };

    let server = Server::bind(config).await?;
    let shutdown = server.sender();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(server::network::ServerMessage::Shutdown);
        }
    });

    server.run().await
}
