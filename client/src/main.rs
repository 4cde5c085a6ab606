use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use jirai_client::{ClientError, Event, GameClient, board_from_view};
use jirai_core::{BotAction, Difficulty, GameMode, GameView, Strategy, random_hidden};
use jirai_protocol::{ClientMessage, FirstMove};

#[derive(Parser)]
#[command(name = "jirai-bot", about = "Autonomous minesweeper player")]
struct Args {
    #[arg(long, default_value = "ws://127.0.0.1:7264")]
    server: String,

    /// Game to join; a fresh game is created when absent.
    #[arg(long)]
    game_id: Option<String>,

    /// Board preset for a fresh game.
    #[arg(long, default_value = "easy")]
    difficulty: Difficulty,

    /// Rule set for a fresh game.
    #[arg(long, default_value = "classic")]
    mode: GameMode,

    /// Defaults to hunter in flags games, classic otherwise.
    #[arg(long)]
    strategy: Option<Strategy>,

    #[arg(long, default_value = "Bot 1")]
    name: String,

    /// Give up after this many sent moves.
    #[arg(long, default_value_t = 500)]
    max_moves: u32,

    /// Pause before each move.
    #[arg(long, default_value_t = 250)]
    think_ms: u64,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

fn my_turn(view: &GameView, my_id: Option<&str>) -> bool {
    match view.mode {
        GameMode::Classic => true,
        GameMode::Flags => match (my_id, view.current_turn.as_deref()) {
            (Some(me), Some(turn)) => me == turn,
            _ => false,
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();

    let mut client = GameClient::connect(&args.server, &args.name, None).await?;
    match &args.game_id {
        Some(game_id) => {
            client
                .send(&ClientMessage::JoinGame {
                    game_id: game_id.clone(),
                })
                .await?;
        }
        None => {
            client
                .send(&ClientMessage::NewGame {
                    difficulty: args.difficulty,
                    mode: args.mode,
                    invite_ids: Vec::new(),
                    first_move: Some(FirstMove { x: 0, y: 0 }),
                })
                .await?;
        }
    }

    let mut rng = SmallRng::from_os_rng();
    let mut my_id: Option<String> = None;
    let mut moves_sent = 0u32;

    loop {
        let event = match client.next_event().await {
            Ok(event) => event,
            Err(ClientError::Closed) => {
                log::info!("server closed the connection");
                break;
            }
            Err(err) => return Err(err.into()),
        };

        match event {
            Event::Started | Event::Updated => {}
            Event::BotSummoned(_) => continue,
            Event::Rejected(message) => {
                // Turn and opponent rejections resolve themselves with the
                // next broadcast, so just keep listening.
                log::warn!("move rejected: {message}");
                continue;
            }
            Event::Terminated(reason) => {
                log::info!("game over: {reason}");
                break;
            }
        }

        let Some(view) = client.view() else { continue };
        if my_id.is_none() {
            my_id = view
                .players
                .iter()
                .find(|player| player.name == args.name)
                .map(|player| player.id.clone());
        }
        if view.state.is_terminal() {
            log::info!("board finished: {:?}", view.state);
            break;
        }
        if !my_turn(view, my_id.as_deref()) {
            continue;
        }

        let strategy = args.strategy.unwrap_or(match view.mode {
            GameMode::Flags => Strategy::Hunter,
            GameMode::Classic => Strategy::Classic,
        });
        let board = board_from_view(view);
        let Some(mut chosen) = strategy.choose(&board, &mut rng) else {
            continue;
        };
        // A flag would bounce off the limit; spend the move on a guess.
        if chosen.action == BotAction::Flag && view.mines_left == 0 {
            let Some(coords) = random_hidden(&board, &mut rng) else {
                continue;
            };
            chosen.coords = coords;
            chosen.action = BotAction::Reveal;
        }

        if args.think_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.think_ms)).await;
        }
        let (x, y) = chosen.coords;
        let msg = match chosen.action {
            BotAction::Reveal => ClientMessage::Reveal { x, y },
            BotAction::Flag => ClientMessage::Flag { x, y },
        };
        log::debug!("{strategy:?} plays {:?} at ({x}, {y})", chosen.action);
        client.send(&msg).await?;

        moves_sent += 1;
        if moves_sent >= args.max_moves {
            log::info!("move budget exhausted after {moves_sent} moves");
            break;
        }
    }

    Ok(())
}
