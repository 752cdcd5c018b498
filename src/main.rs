use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swiss_pairing::api::state::AppState;
use swiss_pairing::config::AppConfig;
use swiss_pairing::models::{
    GameId, GameResult, PlayerId, RatingBand, TournamentFormat, TournamentId,
};
use swiss_pairing::rounds::RoundController;
use swiss_pairing::storage::{JsonlStore, MemoryStore, StorageConfig, Store};

#[derive(Parser)]
#[command(name = "swiss-pairing")]
#[command(about = "Swiss tournament pairing and standings engine")]
#[command(version)]
struct Cli {
    /// Path to configuration file (read when present)
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,

        /// Keep the ledger in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Create a tournament
    CreateTournament {
        /// Display name
        name: String,

        /// Number of rounds
        #[arg(long)]
        rounds: u32,

        /// Pairing format (swiss, round-robin, single-elimination, double-elimination)
        #[arg(long, default_value = "swiss")]
        format: String,

        /// Lowest rating allowed to enroll
        #[arg(long, requires = "max_rating")]
        min_rating: Option<u32>,

        /// Highest rating allowed to enroll
        #[arg(long, requires = "min_rating")]
        max_rating: Option<u32>,
    },

    /// List tournaments
    Tournaments,

    /// Register a player
    AddPlayer {
        /// Display name
        name: String,

        /// Rating
        #[arg(long)]
        rating: u32,

        /// Explicit player id (random when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Mark a player active or inactive
    SetActive {
        player: String,

        /// Exclude the player from future pairings
        #[arg(long)]
        inactive: bool,
    },

    /// Enroll a player in a tournament
    Enroll {
        tournament: String,
        player: String,

        /// Seed number for round one ordering
        #[arg(long)]
        seed: Option<u32>,
    },

    /// List the players enrolled in a tournament
    Players { tournament: String },

    /// Withdraw a player before round one
    Withdraw { tournament: String, player: String },

    /// Pair and commit the next round
    NextRound { tournament: String },

    /// Record a game result (white, black, draw, 1-0, 0-1, 1/2-1/2)
    Result { game: String, result: String },

    /// Print standings
    Standings {
        tournament: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the games of a round
    Games {
        tournament: String,

        /// Round number (defaults to the current round)
        #[arg(long)]
        round: Option<u32>,
    },

    /// Complete a tournament whose last round is finished
    Complete { tournament: String },

    /// Cancel a tournament
    Cancel { tournament: String },
}

fn init_tracing(level: &str, json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn open_store(config: &AppConfig, ephemeral: bool) -> Result<Arc<dyn Store>> {
    if ephemeral {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let storage = StorageConfig::new(config.data_dir.clone());
    let store = JsonlStore::open(storage)
        .with_context(|| format!("Failed to open ledger in {:?}", config.data_dir))?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.exists().then_some(cli.config.as_path());
    let mut config = AppConfig::load(config_path).context("Failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_tracing(&config.log_level, cli.json_logs);
    tracing::debug!("Starting swiss-pairing v{}", env!("CARGO_PKG_VERSION"));

    let ephemeral = matches!(cli.command, Commands::Serve { ephemeral: true, .. });
    let store = open_store(&config, ephemeral)?;
    let controller = Arc::new(RoundController::new(store, config.pairing.clone()));

    match cli.command {
        Commands::Serve { host, port, .. } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let cors = swiss_pairing::api::cors_layer(&config.server.cors_origin)
                .map_err(|e| anyhow!("Invalid cors_origin {:?}: {}", config.server.cors_origin, e))?;

            let app = swiss_pairing::api::build_router(AppState::new(controller)).layer(cors);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::CreateTournament {
            name,
            rounds,
            format,
            min_rating,
            max_rating,
        } => {
            let format: TournamentFormat = format.parse().map_err(|e: String| anyhow!(e))?;
            let band = min_rating
                .zip(max_rating)
                .map(|(min, max)| RatingBand::new(min, max));
            let tournament = controller.create_tournament(&name, format, rounds, band)?;
            println!("{}", tournament.id);
        }
        Commands::Tournaments => {
            for t in controller.list_tournaments()? {
                println!(
                    "{}  {:<30} {:<20} round {}/{}  {}",
                    t.id, t.name, t.format, t.current_round, t.rounds, t.status
                );
            }
        }
        Commands::AddPlayer { name, rating, id } => {
            let player = controller.register_player(id.map(PlayerId::from), &name, rating)?;
            println!("{}", player.id);
        }
        Commands::SetActive { player, inactive } => {
            let player = controller.set_player_active(&PlayerId::from(player), !inactive)?;
            println!("{} active={}", player.id, player.active);
        }
        Commands::Enroll {
            tournament,
            player,
            seed,
        } => {
            controller.enroll(&TournamentId::from(tournament), &PlayerId::from(player), seed)?;
        }
        Commands::Players { tournament } => {
            for enrolled in controller.players(&TournamentId::from(tournament))? {
                let p = &enrolled.player;
                let seed = enrolled.seed.map_or_else(|| "-".to_string(), |s| s.to_string());
                println!(
                    "{}  {:<24} {:>6}  seed {:>3}  {}",
                    p.id,
                    p.name,
                    p.rating,
                    seed,
                    if p.active { "active" } else { "inactive" }
                );
            }
        }
        Commands::Withdraw { tournament, player } => {
            controller.withdraw(&TournamentId::from(tournament), &PlayerId::from(player))?;
        }
        Commands::NextRound { tournament } => {
            let id = TournamentId::from(tournament);
            let round = controller.advance_round(&id).await?;
            println!("Round {}", round);
            print_games(&controller, &id, round)?;
        }
        Commands::Result { game, result } => {
            let result: GameResult = result.parse().map_err(|e: String| anyhow!(e))?;
            let game = controller.set_result(&GameId::from(game), result).await?;
            println!("Board {} of round {}: {}", game.board, game.round, game.result);
        }
        Commands::Standings { tournament, json } => {
            let rows = controller.standings(&TournamentId::from(tournament))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!(
                    "{:>4}  {:<24} {:>6} {:>6} {:>9}  {:>3} {:>3} {:>3} {:>3}",
                    "Rank", "Player", "Rating", "Points", "Buchholz", "W", "D", "L", "Bye"
                );
                for row in rows {
                    println!(
                        "{:>4}  {:<24} {:>6} {:>6.1} {:>9.1}  {:>3} {:>3} {:>3} {:>3}",
                        row.rank,
                        row.player_name,
                        row.rating,
                        row.points,
                        row.buchholz,
                        row.wins,
                        row.draws,
                        row.losses,
                        row.byes
                    );
                }
            }
        }
        Commands::Games { tournament, round } => {
            let id = TournamentId::from(tournament);
            let round = match round {
                Some(round) => round,
                None => controller.tournament(&id)?.current_round,
            };
            print_games(&controller, &id, round)?;
        }
        Commands::Complete { tournament } => {
            let t = controller
                .complete_tournament(&TournamentId::from(tournament))
                .await?;
            println!("{} {}", t.id, t.status);
        }
        Commands::Cancel { tournament } => {
            let t = controller
                .cancel_tournament(&TournamentId::from(tournament))
                .await?;
            println!("{} {}", t.id, t.status);
        }
    }

    Ok(())
}

fn print_games(controller: &RoundController, id: &TournamentId, round: u32) -> Result<()> {
    for game in controller.games(id, round)? {
        match &game.black {
            Some(black) => println!(
                "{:>3}  {} - {}  {}  [{}]",
                game.board, game.white, black, game.result, game.id
            ),
            None => println!("{:>3}  {} (bye)", game.board, game.white),
        }
    }
    Ok(())
}
