//! sys404 native entry point
//!
//! Headless run of the whole site: boots against a JSON file store, plays
//! every mini-game with an autopilot, and logs the terminal feed.
//!
//! Usage: `sys404 [seed] [progress.json] [tuning.json]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use sys404::consts::TICK_MS;
    use sys404::persistence::FileStorage;
    use sys404::platform::now_ms;
    use sys404::sim::{ArcadePhase, TickInput};
    use sys404::{LogObserver, SeededRandom, Site, Tuning, UtilityKey};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let seed = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| now_ms() as u64);
    let progress_path = args.next().unwrap_or_else(|| "sys404_progress.json".to_string());
    let tuning = match args.next() {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(json) => Tuning::from_json_or_default(&json),
            Err(e) => {
                log::warn!("Cannot read tuning {}: {}", path, e);
                Tuning::default()
            }
        },
        None => Tuning::default(),
    };

    log::info!("sys404 (native) starting, seed {}", seed);
    let mut site = Site::boot(FileStorage::new(&progress_path), tuning, SeededRandom::new(seed));
    site.add_observer(Box::new(LogObserver));
    site.render_all();

    let mut clock = 0.0;
    let idle = TickInput::default();
    site.frame(clock, &idle);

    // Circuit: press every cell of the recorded solution
    let presses = site.circuit().solution();
    log::info!("Circuit: {} presses to solve", presses.len());
    for (row, col) in presses {
        site.circuit_toggle(row, col);
    }

    // Routing: knock the start tile out of line and walk it back round
    let start = site.routing().start();
    for _ in 0..4 {
        site.route_rotate(start.row, start.col);
    }
    log::info!(
        "Routing: {} of {} cells powered",
        site.routing().powered_cells().len(),
        site.routing().size() * site.routing().size()
    );

    // Memory: peek at the deck and flip the pairs
    let cards = site.memory().cards().to_vec();
    for (i, card) in cards.iter().enumerate() {
        let Some(offset) = cards[i + 1..].iter().position(|c| c.symbol == card.symbol) else {
            continue;
        };
        site.memory_flip(i);
        site.memory_flip(i + 1 + offset);
        clock += site.tuning().memory.match_delay_ms as f64;
        site.frame(clock, &idle);
    }

    // Arcade: autopilot for up to two simulated minutes
    let autopilot = TickInput {
        idle_mode: true,
        ..Default::default()
    };
    site.arcade_start();
    let end = clock + 120_000.0;
    while clock < end && site.arcade().phase == ArcadePhase::Active {
        clock += TICK_MS;
        site.frame(clock, &autopilot);
    }
    let summary = site.arcade().summary();
    log::info!(
        "Arcade: score {}, max combo {}x, wave {}, health {}",
        summary.score,
        summary.max_combo,
        summary.wave,
        summary.health
    );

    // Utility key, if the circuit did not already cover it
    if matches!(site.utility_key(), UtilityKey::Scheduled { .. }) {
        let deadline = clock + site.tuning().utility_key.delay_ms as f64;
        while clock <= deadline && site.utility_key() != UtilityKey::Dropped {
            clock += TICK_MS;
            site.frame(clock, &idle);
        }
    }
    site.claim_utility_key();

    let progress = site.ledger().progress();
    for (item, unlocked) in progress.roadmap() {
        log::info!("Roadmap {:<10} {}", item.key(), if unlocked { "UNLOCKED" } else { "locked" });
    }
    log::info!("Progress saved to {}", progress_path);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is web::wasm_main, this is just to satisfy the compiler
}
