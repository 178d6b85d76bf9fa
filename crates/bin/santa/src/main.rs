//! secret santa CLI
//!
//! offline tooling around the assignment protocol, plus a full game against
//! the in-memory ledger.
//!
//! ## Usage
//!
//! ```bash
//! # assignment for a combined seed
//! santa derange --seed 42 --players 5
//!
//! # combine per-player entropy the way the ledger does, then check the result
//! santa audit --contributions 1000,5,7 --players 3 --combiner add
//!
//! # 32-bit value committed for a password
//! santa hash-password hunter2
//!
//! # create, join, finalize, reveal with 6 simulated players
//! santa simulate --players 6 --password hunter2
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use santa_client::{ClientConfig, PollCancel, SantaClient, SimLedger};
use santa_core::{derange, givers, hash_password, verify_assignment, Address, JoinPhase, SeedCombiner};

const NAMES: [&str; 12] = [
    "Alice", "Bob", "Carol", "Dave", "Erin", "Frank", "Grace", "Heidi", "Ivan", "Judy", "Mallory",
    "Niaj",
];

#[derive(Parser)]
#[command(name = "santa")]
#[command(about = "fhe secret santa tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Client config (toml)
    #[arg(short, long, env = "SANTA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the assignment for a seed
    Derange {
        /// Combined assignment seed
        #[arg(short, long)]
        seed: u32,

        /// Number of participants (>= 3)
        #[arg(short, long)]
        players: usize,
    },

    /// Combine entropy contributions and validate the resulting assignment
    Audit {
        /// Entropy per participant in join order, creator first
        #[arg(long, value_delimiter = ',', required = true, num_args = 1..)]
        contributions: Vec<u32>,

        /// add, xor or blake3 (defaults to the configured combiner)
        #[arg(long)]
        combiner: Option<SeedCombiner>,

        /// Number of participants (defaults to the number of contributions)
        #[arg(short, long)]
        players: Option<usize>,
    },

    /// Print the 32-bit value committed for a password
    HashPassword {
        password: String,
    },

    /// Run a complete game on the in-memory ledger
    Simulate {
        /// Number of participants (>= 3)
        #[arg(short, long, default_value = "5")]
        players: usize,

        /// Game password
        #[arg(long)]
        password: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Print the effective client config
    Config,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("santa={level},santa_client={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    match path {
        Some(path) => {
            let config = ClientConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            debug!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => Ok(ClientConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Derange { seed, players } => run_derange(seed, players),
        Commands::Audit {
            contributions,
            combiner,
            players,
        } => run_audit(
            &contributions,
            combiner.unwrap_or(config.seed_combiner),
            players,
        ),
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password));
            Ok(())
        }
        Commands::Simulate {
            players,
            password,
            output,
        } => run_simulate(config, players, password, output).await,
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn run_derange(seed: u32, players: usize) -> Result<()> {
    let perm = derange(seed, players)?;
    for (giver, target) in perm.iter().enumerate() {
        println!("{} -> {}", giver, target);
    }
    Ok(())
}

fn run_audit(
    contributions: &[u32],
    combiner: SeedCombiner,
    players: Option<usize>,
) -> Result<()> {
    let Some((first, rest)) = contributions.split_first() else {
        bail!("no contributions given");
    };
    let players = players.unwrap_or(contributions.len());
    let seed = combiner.combine_all(*first, rest);
    info!(%combiner, contributions = contributions.len(), seed, "seed combined");

    let perm = derange(seed, players)?;
    if !verify_assignment(seed, &perm)? {
        bail!("assignment for seed {} failed verification", seed);
    }

    println!("combiner: {}", combiner);
    println!("seed:     {}", seed);
    let from = givers(&perm);
    for (giver, target) in perm.iter().enumerate() {
        println!("  {} -> {}   (receives from {})", giver, target, from[giver]);
    }
    println!("valid derangement of {} players", players);
    Ok(())
}

fn player_name(i: usize) -> String {
    NAMES
        .get(i)
        .map(|n| n.to_string())
        .unwrap_or_else(|| format!("player-{}", i))
}

fn player_address(i: usize) -> Address {
    let mut raw = [0u8; 20];
    raw[12..].copy_from_slice(&(i as u64 + 1).to_be_bytes());
    Address::from_raw(raw)
}

async fn run_simulate(
    config: ClientConfig,
    players: usize,
    password: Option<String>,
    output: String,
) -> Result<()> {
    if players < santa_core::MIN_PLAYERS {
        bail!("need at least {} players, got {}", santa_core::MIN_PLAYERS, players);
    }

    let ledger = SimLedger::new(config.seed_combiner);
    let mut clients = Vec::with_capacity(players);
    for i in 0..players {
        let client = SantaClient::new(config.clone(), ledger.clone(), ledger.fhe());
        client.init(player_address(i)).await?;
        clients.push(client);
    }

    let password = password.as_deref();
    let creator = &clients[0];
    let game_id = creator
        .create_game("Simulated Party", &player_name(0), password)
        .await?;
    info!(%game_id, players, protected = password.is_some(), "simulation started");

    let cancel = PollCancel::new();
    for (i, client) in clients.iter().enumerate().skip(1) {
        let phase = client
            .join_game(game_id, &player_name(i), password, &cancel)
            .await?;
        if phase != JoinPhase::Registered {
            bail!("{} stuck in {:?}", player_name(i), phase);
        }
    }

    creator.finalize_game(game_id).await?;

    let mut pairs = Vec::with_capacity(players);
    for (i, client) in clients.iter().enumerate() {
        client.create_permit().await?;
        let target = client.my_assignment(game_id).await?;
        pairs.push((player_name(i), target.name));
    }

    creator.reveal_game(game_id).await?;

    let seed = ledger.seed(game_id).context("seed missing")?;
    let perm = ledger.assignment(game_id).context("assignment missing")?;
    let valid = verify_assignment(seed, &perm)?;

    if output == "json" {
        let assignments: Vec<_> = pairs
            .iter()
            .map(|(giver, receiver)| serde_json::json!({ "giver": giver, "receiver": receiver }))
            .collect();
        let report = serde_json::json!({
            "game_id": game_id.0,
            "combiner": config.seed_combiner.to_string(),
            "seed": seed,
            "valid": valid,
            "assignments": assignments,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("game {} ({} players, seed {})", game_id, players, seed);
        for (giver, receiver) in &pairs {
            println!("  {} -> {}", giver, receiver);
        }
        println!("valid: {}", valid);
    }

    if !valid {
        std::process::exit(1);
    }
    Ok(())
}
