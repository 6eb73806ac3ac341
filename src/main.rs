use anyhow::{Context, Result};
use clap::Parser;
use loqa_room::loopback::{LogPlayer, LoopbackClient, LoopbackRecorderFactory, VirtualDevices};
use loqa_room::{create_router, AppState, Config, NatsInference, NotificationCenter};
use loqa_room::{RoomComponents, RoomController};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "loqa-room", version, about = "Video verification room")]
struct Args {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/loqa-room")]
    config: String,

    /// Room token, overrides `room.token`
    #[arg(long)]
    room_token: Option<String>,

    /// HTTP bind address, overrides `service.http.bind`
    #[arg(long)]
    bind: Option<String>,

    /// HTTP port, overrides `service.http.port`
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    let token = args
        .room_token
        .or_else(|| cfg.room.token.clone())
        .context("No room token; pass --room-token or set room.token")?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let session_id = uuid::Uuid::new_v4().to_string();
    let inference = NatsInference::connect(
        &cfg.inference.nats_url,
        session_id,
        cfg.inference.nats_settings(),
    )
    .await?;

    let components = RoomComponents {
        client: Arc::new(LoopbackClient::new()),
        capture: Arc::new(VirtualDevices::new()),
        inference: Arc::new(inference.clone()),
        recorders: Arc::new(LoopbackRecorderFactory::new()),
        player: Arc::new(LogPlayer::new()),
    };

    let notifier = NotificationCenter::new();
    let room = Arc::new(RoomController::new(
        components,
        cfg.room_settings()?,
        notifier,
    )?);

    if let Err(e) = room.start(&token).await {
        error!("Failed to join room: {}", e);
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API listening on {}", addr);

    let app = create_router(AppState::new(Arc::clone(&room)));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    room.shutdown().await;
    inference.close().await?;

    Ok(())
}
