//! Load simulator for the rocket crash engine.
//!
//! Spawns simulated players against one session registry, each cashing out at
//! its own target, and prints per-player statistics and the realised RTP.

mod config;
mod player;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use anyhow::Error;
use ctrlc::set_handler;
use log::info;
use pico_args::Arguments;
use rand::Rng;
use rocket_crash::{
    FanoutSink, InMemoryLedger, LogSink, ProgressSink, SessionRegistry, StatsBook,
    SubscriberSink, game::simulate_fixed_cashout,
};
use tokio::task::JoinSet;

use config::{SimConfig, SimOverrides};
use player::{PlayerReport, SimPlayer};

const HELP: &str = "\
Simulate players against the rocket crash engine

USAGE:
  rc_sim [OPTIONS]

OPTIONS:
  --players    N           Concurrent simulated players  [default: env SIM_PLAYERS or 10]
  --rounds     N           Rounds per player             [default: env SIM_ROUNDS or 20]
  --stake      N           Stake per round               [default: env SIM_STAKE or 100]
  --target     X           Base cash-out multiplier      [default: env SIM_TARGET or 2.0]
  --rtp-check  N           Only run an offline RTP estimate over N rounds

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  ROCKET_RTP               Target return-to-player (default 0.75)
  ROCKET_CAP               Maximum multiplier (default 10000)
  ROCKET_TICK_INTERVAL_MS  Tick interval in milliseconds (default 100)
  ROCKET_MULTIPLIER_STEP   Multiplier increment per tick (default 0.01)
  ROCKET_MIN_STAKE         Smallest stake (default 1)
  ROCKET_MAX_STAKE         Largest stake (default 100000)
  DEFAULT_BALANCE          Opening balance per player (default 1000)
  SIM_TARGET_JITTER        Per-player spread around the target (default 0.25)
  SIM_TOP_UP               Top-up when a player is broke (default 1000)
  RUST_LOG                 Log filter (e.g., info, rocket_crash=debug)
";

/// Subscriber channel capacity per simulated player
const EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = SimOverrides {
        players: pargs.opt_value_from_str("--players")?,
        rounds: pargs.opt_value_from_str("--rounds")?,
        stake: pargs.opt_value_from_str("--stake")?,
        target: pargs.opt_value_from_str("--target")?,
        rtp_check: pargs.opt_value_from_str("--rtp-check")?,
    };

    env_logger::builder().format_target(false).init();

    let config = SimConfig::from_env(overrides)?;
    config.validate()?;

    if let Some(rounds) = config.rtp_check {
        rtp_check(&config, rounds);
        return Ok(());
    }

    // Catching signals for a graceful stop.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        set_handler(move || shutdown.store(true, Ordering::SeqCst))?;
    }

    let ledger = Arc::new(InMemoryLedger::new(config.default_balance));
    let stats = Arc::new(StatsBook::new());
    let subscribers = Arc::new(SubscriberSink::new());
    let sinks: Vec<Arc<dyn ProgressSink>> =
        vec![stats.clone(), subscribers.clone(), Arc::new(LogSink)];
    let registry = Arc::new(SessionRegistry::new(
        config.game.clone(),
        ledger.clone(),
        Arc::new(FanoutSink::new(sinks)),
    )?);

    info!(
        "Starting {} players x {} rounds, stake {}, target {:.2}x (rtp {}, tick {} ms)",
        config.players,
        config.rounds,
        config.stake,
        config.target,
        config.game.rtp,
        config.game.tick_interval_ms
    );

    let mut players = JoinSet::new();
    let mut rng = rand::rng();
    for index in 0..config.players {
        let id = index as i64 + 1;
        let player = SimPlayer {
            id,
            target: config.target_for(rng.random_range(-1.0..=1.0)),
            stake: config.stake,
            rounds: config.rounds,
            top_up: config.top_up,
        };
        let events = subscribers.subscribe(id, EVENT_BUFFER).await;
        players.spawn(player.run(
            registry.clone(),
            ledger.clone(),
            events,
            shutdown.clone(),
        ));
    }

    let watcher = {
        let registry = registry.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            while !shutdown.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            info!("Interrupted, stopping all sessions");
            registry.stop_all().await;
        })
    };

    let mut reports = Vec::with_capacity(config.players);
    while let Some(result) = players.join_next().await {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => log::error!("Player task failed: {e}"),
        }
    }
    watcher.abort();

    reports.sort_by_key(|report| report.player_id);
    print_summary(&config, &reports, &stats, &ledger).await;

    Ok(())
}

fn rtp_check(config: &SimConfig, rounds: u64) {
    let sampler = config.game.sampler();
    let target = config.target_for(0.0);
    let report = simulate_fixed_cashout(&sampler, target, config.stake, rounds, &mut rand::rng());

    println!("Offline RTP check: {rounds} rounds, cash-out at {target}");
    println!("  counted rounds   {}", report.rounds);
    println!("  capped (skipped) {}", report.capped);
    println!(
        "  wins             {} ({:.2}%)",
        report.wins,
        report.wins as f64 / report.rounds.max(1) as f64 * 100.0
    );
    println!("  staked           {}", report.total_staked);
    println!("  paid             {}", report.total_paid);
    println!(
        "  realised RTP     {:.4} (configured {})",
        report.ratio(),
        config.game.rtp
    );
}

async fn print_summary(
    config: &SimConfig,
    reports: &[PlayerReport],
    stats: &StatsBook,
    ledger: &InMemoryLedger,
) {
    println!(
        "{:>6} {:>8} {:>6} {:>5} {:>8} {:>10} {:>10} {:>9} {:>9} {:>10}",
        "player", "target", "games", "wins", "win %", "wagered", "won", "net", "top-ups", "balance"
    );

    for report in reports {
        let player = stats.stats(report.player_id).await;
        println!(
            "{:>6} {:>8} {:>6} {:>5} {:>7.1}% {:>10} {:>10} {:>9} {:>9} {:>10}",
            report.player_id,
            report.target.to_string(),
            player.total_games,
            player.games_won,
            player.win_rate(),
            player.total_wagered,
            player.total_won,
            player.net(),
            report.top_ups,
            ledger.balance(report.player_id).await
        );
    }

    let totals = stats.totals().await;
    println!();
    println!(
        "Total: {} games, {} won ({:.1}%), wagered {}, paid {}",
        totals.total_games,
        totals.games_won,
        totals.win_rate(),
        totals.total_wagered,
        totals.total_won
    );
    if let Some(best) = totals.best_multiplier {
        println!("Best cash-out: {best}");
    }
    println!(
        "Realised RTP: {:.4} (configured {}, one-step reaction lag pays slightly above it)",
        totals.payout_ratio(),
        config.game.rtp
    );
}
