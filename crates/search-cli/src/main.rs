//! search-cli - runs the move generator and the search from the command line.
//!
//! Results go to stdout, logs to stderr (`RUST_LOG` sets the level).

mod config;
mod output;

use anyhow::{bail, Context};
use chess_core::Fen;
use chess_engine::{find_move, perft, perft_divide, AttackTables, Position};
use chess_search::{Engine, EngineConfig, SearchLimits};
use clap::{Parser, Subcommand};
use output::{format_iteration, format_score, uci_line, SearchJson};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Positions searched by `bench`.
const BENCH_POSITIONS: [&str; 6] = [
    Fen::STARTPOS,
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
];

#[derive(Parser)]
#[command(name = "search-cli")]
#[command(about = "Perft, divide, search and bench for the chess engine")]
struct Cli {
    /// Engine configuration file (defaults to engine.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Count leaf nodes of the legal move tree
    Perft {
        depth: u32,
        /// Start position in FEN (defaults to the standard start)
        #[arg(long)]
        fen: Option<String>,
    },
    /// Perft split by root move
    Divide {
        depth: u32,
        #[arg(long)]
        fen: Option<String>,
    },
    /// Search a position for the best move
    Search {
        #[arg(long)]
        fen: Option<String>,
        /// Moves in UCI notation played from the start position
        #[arg(long, num_args = 1..)]
        moves: Vec<String>,
        /// Time budget in milliseconds
        #[arg(long)]
        movetime: Option<u64>,
        /// Maximum iterative-deepening depth
        #[arg(long)]
        depth: Option<u32>,
        #[arg(long)]
        threads: Option<usize>,
        /// Transposition table size in MB
        #[arg(long)]
        hash: Option<usize>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fixed-depth search over a suite of positions
    Bench {
        #[arg(long, default_value = "8")]
        depth: u32,
        #[arg(long)]
        threads: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::Perft { depth, fen } => run_perft(depth, fen.as_deref()),
        Command::Divide { depth, fen } => run_divide(depth, fen.as_deref()),
        Command::Search {
            fen,
            moves,
            movetime,
            depth,
            threads,
            hash,
            json,
        } => {
            let mut config = config::load(cli.config.as_deref())?;
            if let Some(threads) = threads {
                config.threads = threads;
            }
            if let Some(hash) = hash {
                config.hash_mb = hash;
            }
            let limits = limits(movetime, depth);
            run_search(config, fen.as_deref(), &moves, limits, json)
        }
        Command::Bench { depth, threads } => {
            let mut config = config::load(cli.config.as_deref())?;
            if let Some(threads) = threads {
                config.threads = threads;
            }
            run_bench(config, depth)
        }
    }
}

/// Without `--movetime` or `--depth` the search gets five seconds.
fn limits(movetime: Option<u64>, depth: Option<u32>) -> SearchLimits {
    let movetime = movetime.map(Duration::from_millis);
    match (movetime, depth) {
        (None, None) => SearchLimits::movetime(Duration::from_secs(5)),
        (movetime, depth) => SearchLimits {
            movetime,
            depth,
            ..SearchLimits::default()
        },
    }
}

/// The position from `fen` (or the start) after playing `moves`.
fn build_position(tables: &AttackTables, fen: Option<&str>, moves: &[String]) -> anyhow::Result<Position> {
    let fen = fen.unwrap_or(Fen::STARTPOS);
    let mut position = Position::from_fen(fen).with_context(|| format!("invalid FEN '{fen}'"))?;
    for uci in moves {
        let Some(mv) = find_move(tables, &position, uci) else {
            bail!("illegal move '{uci}' in position {}", position.to_fen());
        };
        position.make_move(mv);
    }
    Ok(position)
}

fn run_perft(depth: u32, fen: Option<&str>) -> anyhow::Result<()> {
    let tables = AttackTables::new();
    let mut position = build_position(&tables, fen, &[])?;
    let start = Instant::now();
    let nodes = perft(&tables, &mut position, depth);
    let elapsed = start.elapsed();
    println!("nodes {nodes}");
    println!("time {} ms", elapsed.as_millis());
    println!("nps {}", (nodes as f64 / elapsed.as_secs_f64().max(1e-6)) as u64);
    Ok(())
}

fn run_divide(depth: u32, fen: Option<&str>) -> anyhow::Result<()> {
    let tables = AttackTables::new();
    let mut position = build_position(&tables, fen, &[])?;
    let split = perft_divide(&tables, &mut position, depth);
    let mut total = 0u64;
    for (mv, count) in &split {
        println!("{mv}: {count}");
        total += count;
    }
    println!();
    println!("moves {}", split.len());
    println!("nodes {total}");
    Ok(())
}

fn run_search(
    config: EngineConfig,
    fen: Option<&str>,
    moves: &[String],
    limits: SearchLimits,
    json: bool,
) -> anyhow::Result<()> {
    let mut engine = Engine::new(config).context("invalid engine configuration")?;
    let position = build_position(engine.tables(), fen, moves)?;
    if !json {
        engine.set_reporter(|info| println!("{}", format_iteration(info)));
    }
    tracing::info!(fen = %position.to_fen(), ?limits, "searching");
    let result = engine.search(&position, limits);

    if json {
        println!("{}", serde_json::to_string_pretty(&SearchJson::from(&result))?);
        return Ok(());
    }
    match result.best_move {
        Some(mv) => {
            println!(
                "bestmove {mv} score {} depth {} nodes {} time {} ms",
                format_score(result.score),
                result.depth,
                result.nodes,
                result.elapsed.as_millis()
            );
            println!("pv {}", uci_line(&result.pv).join(" "));
        }
        None => println!("no legal moves, score {}", format_score(result.score)),
    }
    Ok(())
}

fn run_bench(config: EngineConfig, depth: u32) -> anyhow::Result<()> {
    let mut engine = Engine::new(config).context("invalid engine configuration")?;
    let mut nodes = 0;
    let mut elapsed = Duration::ZERO;
    for fen in BENCH_POSITIONS {
        let position = Position::from_fen(fen).with_context(|| format!("invalid bench FEN '{fen}'"))?;
        engine.new_game();
        let result = engine.search(&position, SearchLimits::depth(depth));
        println!(
            "{:>10} nodes {:>6} ms  {fen}",
            result.nodes,
            result.elapsed.as_millis()
        );
        nodes += result.nodes;
        elapsed += result.elapsed;
    }
    let nps = (nodes as f64 / elapsed.as_secs_f64().max(1e-6)) as u64;
    println!();
    println!("nodes {nodes}");
    println!("time {} ms", elapsed.as_millis());
    println!("nps {nps}");
    Ok(())
}
