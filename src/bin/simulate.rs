use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tower_clash_server::constants::{
    ARENA_HEIGHT, ARENA_WIDTH, BRIDGE_Y, ELIXIR_CAP, STARTING_BUILDINGS, SUDDEN_DEATH_AT_SECS,
    TICK_DT, TICK_RATE,
};
use tower_clash_server::engine::{BattleEngine, EngineOptions};
use tower_clash_server::rng::Rng;
use tower_clash_server::types::{Phase, Team};
use tower_clash_server::units::{is_tower, UnitCatalog};

/// Hard stop well past the point where sudden death must have ended a match.
const TICK_SAFETY_LIMIT: u64 = (SUDDEN_DEATH_AT_SECS as u64 + 180) * TICK_RATE as u64;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs headless bot matches and prints one JSON line each")]
struct Cli {
    #[arg(long, default_value_t = 5)]
    matches: u32,
    #[arg(long, default_value_t = 1)]
    seed: u32,
    #[arg(long, default_value = "data/units.json")]
    units: PathBuf,
    /// Ticks a bot waits between spawn attempts
    #[arg(long, default_value_t = 45)]
    think_ticks: u64,
}

#[derive(Clone, Debug, Serialize)]
struct MatchResultLine {
    seed: u32,
    winner: i32,
    #[serde(rename = "durationSecs")]
    duration_secs: f64,
    phase: &'static str,
    spawns: BTreeMap<String, u32>,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    matches: usize,
    #[serde(rename = "winsBottom")]
    wins_bottom: usize,
    #[serde(rename = "winsTop")]
    wins_top: usize,
    unfinished: usize,
    #[serde(rename = "averageDurationSecs")]
    average_duration_secs: f64,
    #[serde(rename = "phaseCounts")]
    phase_counts: BTreeMap<&'static str, usize>,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
}

struct Bot {
    id: String,
    team: Team,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let catalog = UnitCatalog::load_or_towers_only(&cli.units);

    let mut results = Vec::new();
    for offset in 0..cli.matches {
        let seed = cli.seed.wrapping_add(offset);
        let result = run_match(catalog.clone(), seed, cli.think_ticks.max(1));
        for anomaly in &result.anomalies {
            tracing::warn!(seed, %anomaly, "anomaly detected");
        }
        println!("{}", serde_json::to_string(&result)?);
        results.push(result);
    }

    let summary = summarize(&results);
    println!("{}", serde_json::to_string(&summary)?);
    if summary.anomaly_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_match(catalog: UnitCatalog, seed: u32, think_ticks: u64) -> MatchResultLine {
    let mut engine = BattleEngine::new(catalog, EngineOptions::default(), seed);
    let mut rng = Rng::new(seed ^ 0x9e37_79b9);
    let bots = [
        Bot {
            id: "bot_bottom".to_string(),
            team: Team::Bottom,
        },
        Bot {
            id: "bot_top".to_string(),
            team: Team::Top,
        },
    ];
    for bot in &bots {
        engine.register_actor(&bot.id, bot.team);
    }

    let mut spawns = BTreeMap::new();
    let mut anomalies = Vec::new();
    let mut deepest_phase = Phase::Normal;
    let mut tick = 0u64;

    while !engine.is_finished() {
        if tick >= TICK_SAFETY_LIMIT {
            anomalies.push(format!("tick safety limit exceeded at {tick}"));
            break;
        }
        for (idx, bot) in bots.iter().enumerate() {
            if (tick + idx as u64 * think_ticks / 2) % think_ticks == 0 {
                if let Some(key) = bot_turn(&mut engine, &mut rng, bot) {
                    *spawns.entry(key).or_insert(0) += 1;
                }
            }
        }
        engine.step(TICK_DT);
        tick += 1;
        if engine.phase() != Phase::Finished {
            deepest_phase = deepest_phase.max(engine.phase());
        }
        anomalies.extend(collect_anomalies(&engine, &bots, tick));
    }

    let winner = engine
        .winner()
        .map_or(-1, |team| i32::from(team.index()));
    MatchResultLine {
        seed,
        winner,
        duration_secs: engine.elapsed_secs(),
        phase: phase_key(deepest_phase),
        spawns,
        anomalies,
    }
}

/// Plays a random affordable card from hand onto a random spot on the bot's
/// own half.
fn bot_turn(engine: &mut BattleEngine, rng: &mut Rng, bot: &Bot) -> Option<String> {
    let economy = engine.economy(&bot.id)?;
    let elixir = economy.elixir();
    let affordable: Vec<String> = economy
        .hand()
        .iter()
        .filter(|key| {
            engine
                .catalog()
                .get(key.as_str())
                .is_some_and(|stats| f64::from(stats.cost) <= elixir)
        })
        .cloned()
        .collect();
    if affordable.is_empty() {
        return None;
    }
    let key = affordable[rng.below(affordable.len())].clone();
    let x = rng.range_f64(1.0, ARENA_WIDTH - 1.0);
    let y = match bot.team {
        Team::Bottom => rng.range_f64(BRIDGE_Y + 1.0, ARENA_HEIGHT - 4.0),
        Team::Top => rng.range_f64(4.0, BRIDGE_Y - 1.0),
    };
    match engine.spawn(&bot.id, &key, x, y) {
        Ok(()) => Some(key),
        Err(reason) => {
            tracing::debug!(bot = %bot.id, %key, %reason, "bot spawn rejected");
            None
        }
    }
}

fn collect_anomalies(engine: &BattleEngine, bots: &[Bot], tick: u64) -> Vec<String> {
    let mut anomalies = Vec::new();
    for entity in engine.entities() {
        if entity.hp > entity.max_hp {
            anomalies.push(format!("tick {tick}: {} hp above max", entity.id));
        }
        if !(0.0..=ARENA_WIDTH).contains(&entity.x) || !(0.0..=ARENA_HEIGHT).contains(&entity.y) {
            anomalies.push(format!("tick {tick}: {} left the arena", entity.id));
        }
    }
    let buildings = engine
        .entities()
        .iter()
        .filter(|entity| is_tower(&entity.key))
        .count();
    if buildings > STARTING_BUILDINGS {
        anomalies.push(format!("tick {tick}: {buildings} buildings on the field"));
    }
    for bot in bots {
        if let Some(economy) = engine.economy(&bot.id) {
            if !(0.0..=ELIXIR_CAP).contains(&economy.elixir()) {
                anomalies.push(format!("tick {tick}: {} elixir out of range", bot.id));
            }
        }
    }
    anomalies
}

fn summarize(results: &[MatchResultLine]) -> RunSummary {
    let mut phase_counts = BTreeMap::new();
    for result in results {
        *phase_counts.entry(result.phase).or_insert(0) += 1;
    }
    let total_duration: f64 = results.iter().map(|result| result.duration_secs).sum();
    RunSummary {
        matches: results.len(),
        wins_bottom: results.iter().filter(|result| result.winner == 0).count(),
        wins_top: results.iter().filter(|result| result.winner == 1).count(),
        unfinished: results.iter().filter(|result| result.winner < 0).count(),
        average_duration_secs: if results.is_empty() {
            0.0
        } else {
            total_duration / results.len() as f64
        },
        phase_counts,
        anomaly_count: results.iter().map(|result| result.anomalies.len()).sum(),
    }
}

fn phase_key(phase: Phase) -> &'static str {
    match phase {
        Phase::Normal => "normal",
        Phase::Overtime => "overtime",
        Phase::SuddenDeath => "sudden_death",
        Phase::Finished => "finished",
    }
}
