use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tokio::net::TcpListener;

use jirai_server::{AnonymousOnly, BotSupervisor, ServerState, gateway};

#[derive(Parser)]
#[command(name = "jirai-server", about = "Multiplayer minesweeper server")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:7264")]
    listen: String,

    /// URL bots use to connect back; defaults to ws://<listen>.
    #[arg(long)]
    public_url: Option<String>,

    /// Idle games older than this are swept away.
    #[arg(long, default_value_t = 600)]
    game_ttl_secs: u64,

    #[arg(long, default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Bot executable spawned for summon_bot requests.
    #[arg(long, default_value = "jirai-bot")]
    bot_program: PathBuf,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();

    let public_url = args
        .public_url
        .unwrap_or_else(|| format!("ws://{}", args.listen));
    let state = Arc::new(ServerState::new(
        Box::new(AnonymousOnly),
        BotSupervisor::new(args.bot_program, public_url),
        Duration::from_secs(args.game_ttl_secs),
    ));

    let sweep_state = state.clone();
    let sweep_interval = Duration::from_secs(args.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sweep_state
                .registry
                .lock()
                .await
                .sweep_stale(sweep_state.game_ttl);
            if !removed.is_empty() {
                log::info!("swept {} stale game(s)", removed.len());
            }
            for game in removed {
                gateway::teardown_game(&sweep_state, game, "game expired").await;
            }
        }
    });

    let listener = TcpListener::bind(&args.listen).await?;
    log::info!("listening on {}", args.listen);
    loop {
        // Transient accept failures (fd exhaustion, aborted handshakes) must
        // not take the server down.
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(gateway::handle_connection(state.clone(), stream, peer));
            }
            Err(err) => log::warn!("accept failed: {err}"),
        }
    }
}
