use clap::Parser;
use client::config::ClientConfig;
use client::game::ClientGame;
use client::input::InputManager;
use client::network::WsTransport;
use client::rendering::Renderer;
use log::{debug, error, info};
use macroquad::prelude::*;
use shared::Character;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short = 'u', long, env = "SERVER_URL", default_value = "ws://127.0.0.1:3000")]
    url: String,

    /// Name pre-filled in the join form
    #[arg(short = 'n', long, default_value = "Ali Baba")]
    name: String,

    /// Character skin: aliBaba or sinbad
    #[arg(short = 'c', long, default_value = "aliBaba")]
    character: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "1280")]
    width: u32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "720")]
    height: u32,

    /// Delay between reconnect attempts, in milliseconds
    #[arg(long, default_value = "1000")]
    reconnect_ms: u64,
}

fn client_config() -> ClientConfig {
    let args = Args::parse();
    ClientConfig {
        server_url: args.url,
        name: args.name,
        character: Character::normalize(Some(args.character.as_str())),
        window_width: args.width.max(320),
        window_height: args.height.max(240),
        reconnect_delay: Duration::from_millis(args.reconnect_ms.max(50)),
        ..ClientConfig::default()
    }
}

fn window_conf() -> Conf {
    let config = client_config();
    Conf {
        window_title: "Caravan Brawl".to_owned(),
        window_width: config.window_width as i32,
        window_height: config.window_height as i32,
        window_resizable: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = client_config();

    // The socket lives on tokio; the frame loop stays on macroquad's thread
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start network runtime: {}", e);
            return;
        }
    };

    info!("Starting client...");
    info!("Server: {}", config.server_url);
    info!("Controls: A/D to move, W/Space to jump, double tap to dash, click or M to fire");

    let transport = WsTransport::new(
        runtime.handle().clone(),
        config.server_url.clone(),
        config.reconnect_delay,
    );
    let mut game = ClientGame::new(config, transport);
    let mut input = InputManager::new();
    let mut renderer = Renderer::new();

    loop {
        input.update(&mut game, &renderer.camera);
        game.frame(get_frame_time());

        for cue in game.take_cues() {
            debug!("Sound cue: {:?}", cue);
        }

        renderer.render(&game);
        next_frame().await;
    }
}
