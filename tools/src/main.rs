//! idle-runner: headless runner for the idlekeep engine.
//!
//! Usage:
//!   idle-runner --seconds 10 --clicks 5 --save-dir ./saves
//!   idle-runner --ipc-mode
//!   idle-runner --export save.json | --import save.json | --reset

use anyhow::{Context, Result};
use idlekeep_core::{
    clock::{SystemTime, TimeSource},
    command::PlayerCommand,
    config::SimConfig,
    engine::Engine,
    event::{EngineEvent, EventKind},
    persistence::SaveManager,
    production,
    scheduler::{lock_engine, TickScheduler},
    state::GameState,
    store::{FileDriver, SqliteDriver, StorageDriver},
    types::ContentId,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Command { command: PlayerCommand },
    Save,
    Quit,
}

#[derive(serde::Serialize)]
struct UiState {
    currency:             f64,
    premium_currency:     f64,
    progression_currency: f64,
    prestige_level:       f64,
    primary_rate:         f64,
    progression_rate:     f64,
    generators:           Vec<(ContentId, u64)>,
    active_events:        Vec<ContentId>,
    ticks:                u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seconds = parse_arg(&args, "--seconds", 10u64);
    let clicks = parse_arg(&args, "--clicks", 5u32);
    let ipc_mode = has_flag(&args, "--ipc-mode");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let save_dir = string_arg(&args, "--save-dir").unwrap_or("./saves");

    let mut config = SimConfig::load(data_dir)?;
    if let Some(seed) = string_arg(&args, "--seed") {
        config.engine.seed = Some(seed.parse().context("--seed must be an integer")?);
    }

    let time: Arc<dyn TimeSource> = Arc::new(SystemTime);
    let saves = Arc::new(open_saves(&config, save_dir, Arc::clone(&time))?);

    if has_flag(&args, "--reset") {
        saves.delete_save()?;
        println!("save '{}' deleted", saves.key());
        return Ok(());
    }

    let mut state = match saves.load() {
        Ok(Some(loaded)) => {
            if loaded.restored_from_backup {
                println!("primary save was unusable; restored from backup");
            }
            loaded.state
        }
        Ok(None) => GameState::new(&config.catalog, time.now_ms()),
        Err(e) => {
            log::warn!("no usable save ({e}), starting fresh");
            GameState::new(&config.catalog, time.now_ms())
        }
    };

    if let Some(path) = string_arg(&args, "--import") {
        let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))?;
        state = saves.import_save(&text)?.state;
        println!("imported save from {path}");
    }

    let mut engine = Engine::new(config, state);
    if !ipc_mode {
        for kind in EventKind::ALL {
            engine.on(kind, print_event);
        }
    }
    if let Some(report) = engine.apply_offline_progress(time.now_ms()) {
        if !ipc_mode {
            println!(
                "welcome back: {:.1}s away, earned {:.2}{}",
                report.time_away as f64 / 1000.0,
                report.gained,
                if report.was_capped { " (capped)" } else { "" }
            );
        }
        engine.acknowledge_offline();
    }

    if let Some(path) = string_arg(&args, "--export") {
        std::fs::write(path, saves.export_save(engine.state())?)
            .with_context(|| format!("cannot write {path}"))?;
        println!("exported save to {path}");
        return Ok(());
    }

    if !ipc_mode {
        println!("idlekeep idle-runner");
        println!("  seed:      {}", engine.seed());
        println!("  seconds:   {seconds}");
        println!("  clicks/s:  {clicks}");
        println!("  data_dir:  {data_dir}");
        println!("  save_dir:  {save_dir} ({})", saves.active_driver());
        println!();
    }

    let mut scheduler = TickScheduler::new(Arc::new(Mutex::new(engine)), saves, time);
    scheduler.start()?;

    if ipc_mode {
        run_ipc_loop(&scheduler)?;
    } else {
        run_scripted(&scheduler, seconds, clicks);
    }

    if let Some(Err(e)) = scheduler.stop() {
        eprintln!("final save failed: {e}");
    }
    if !ipc_mode {
        print_summary(&scheduler);
    }
    Ok(())
}

fn open_saves(config: &SimConfig, save_dir: &str, time: Arc<dyn TimeSource>) -> Result<SaveManager> {
    std::fs::create_dir_all(save_dir).with_context(|| format!("cannot create {save_dir}"))?;
    let db_path = Path::new(save_dir).join("saves.db");
    let primary: Option<Box<dyn StorageDriver>> = match SqliteDriver::open(&db_path.to_string_lossy()) {
        Ok(driver) => {
            log::info!("primary save database: {}", driver.path().unwrap_or(":memory:"));
            Some(Box::new(driver))
        }
        Err(e) => {
            log::warn!("cannot open {}: {e}", db_path.display());
            None
        }
    };
    let fallback: Option<Box<dyn StorageDriver>> = Some(Box::new(FileDriver::new(save_dir)));
    Ok(SaveManager::new(&config.engine, primary, fallback, time)?)
}

/// Click a few times a second and buy the cheapest affordable generator.
fn run_scripted(scheduler: &TickScheduler, seconds: u64, clicks: u32) {
    for _ in 0..seconds {
        std::thread::sleep(Duration::from_secs(1));
        for _ in 0..clicks {
            let _ = scheduler.execute(&PlayerCommand::Click);
        }
        let cheapest = {
            let engine = lock_engine(scheduler.engine());
            engine
                .state()
                .generators
                .iter()
                .min_by(|a, b| production::generator_cost(a).total_cmp(&production::generator_cost(b)))
                .map(|g| g.id.clone())
        };
        if let Some(id) = cheapest {
            let _ = scheduler.execute(&PlayerCommand::BuyGenerator { id, quantity: 1 });
        }
    }
}

fn run_ipc_loop(scheduler: &TickScheduler) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        if handle.read_line(&mut buffer)? == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => {}
            IpcCommand::Save => {
                if let Some(Err(e)) = scheduler.request_save() {
                    writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                }
            }
            IpcCommand::Command { command } => {
                if let Err(reason) = scheduler.execute(&command) {
                    writeln!(stdout, "{}", serde_json::json!({ "rejected": reason.to_string() }))?;
                }
            }
        }
        let state = build_ui_state(scheduler);
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn build_ui_state(scheduler: &TickScheduler) -> UiState {
    let engine = lock_engine(scheduler.engine());
    let state = engine.state();
    let rates = production::net_rates(state, engine.config(), state.last_tick_timestamp);
    UiState {
        currency: state.currency,
        premium_currency: state.premium_currency,
        progression_currency: state.progression_currency,
        prestige_level: state.prestige_level,
        primary_rate: rates.primary,
        progression_rate: rates.progression,
        generators: state.generators.iter().map(|g| (g.id.clone(), g.count)).collect(),
        active_events: state.active_events.iter().map(|e| e.id.clone()).collect(),
        ticks: engine.ticks(),
    }
}

fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::TimedEventStarted { id, refreshed, .. } => {
            println!("  event {id} {}", if *refreshed { "extended" } else { "started" });
        }
        EngineEvent::TimedEventExpired { id, .. } => println!("  event {id} ended"),
        EngineEvent::Prestiged { gain, prestige_level } => {
            println!("  prestige +{gain} (level {prestige_level})");
        }
        EngineEvent::SaveFailed { error } => println!("  save failed: {error}"),
        EngineEvent::SaveCompleted { used_fallback: true } => println!("  saved (fallback medium)"),
        EngineEvent::SaveCompleted { .. } | EngineEvent::OfflineProgress { .. } => {}
    }
}

fn print_summary(scheduler: &TickScheduler) {
    let engine = lock_engine(scheduler.engine());
    let state = engine.state();
    let rates = production::net_rates(state, engine.config(), state.last_tick_timestamp);

    println!();
    println!("=== Summary ({} ticks) ===", engine.ticks());
    println!("  currency:        {:.2} (+{:.2}/s)", state.currency, rates.primary);
    println!("  progression:     {:.2} (+{:.2}/s)", state.progression_currency, rates.progression);
    println!("  premium:         {:.0}", state.premium_currency);
    println!("  total clicks:    {}", state.stats.total_clicks);
    println!("  total earned:    {:.2}", state.stats.total_earned);
    println!("  generators:");
    for g in state.generators.iter().filter(|g| g.count > 0) {
        println!("    {:<12} {}", g.id, g.count);
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
