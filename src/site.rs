//! Page coordinator
//!
//! `Site` owns the ledger, every engine and the random source. Page input
//! goes in through its methods; after each one it drains the engine events,
//! routes unlock requests into the ledger, and tells the observers what
//! changed. `frame` is the only place time advances.

use crate::consts::*;
use crate::observer::{EngineEvent, SiteObserver, View};
use crate::persistence::Storage;
use crate::progress::{ProgressLedger, SectionKey, UnlockOutcome};
use crate::puzzles::{CircuitPuzzle, MemoryPuzzle, RoutePuzzle};
use crate::rng::RandomSource;
use crate::sim::{ArcadeState, TickInput, tick};
use crate::tuning::Tuning;

/// Terminal line for the claimable utility key
pub const UTILITY_KEY_LINE: &str = "> [KEY-UTIL] click to claim";

/// One-shot terminal key for the `utility` section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilityKey {
    /// Not offered (disabled, or utility already unlocked at boot)
    Off,
    /// Waiting to drop; the deadline is set by the first frame
    Scheduled { due_ms: Option<u64> },
    /// In the terminal, claimable
    Dropped,
    /// Claimed or made redundant
    Spent,
}

pub struct Site<S: Storage, R: RandomSource> {
    ledger: ProgressLedger<S>,
    tuning: Tuning,
    rng: R,
    circuit: CircuitPuzzle,
    routing: RoutePuzzle,
    memory: MemoryPuzzle,
    arcade: ArcadeState,
    utility_key: UtilityKey,
    observers: Vec<Box<dyn SiteObserver>>,
    /// Milliseconds of the latest frame
    clock_ms: u64,
    last_frame_ms: Option<f64>,
    accumulator: f64,
}

impl<S: Storage, R: RandomSource> Site<S, R> {
    /// Load progress, deal every puzzle, arm the utility key
    pub fn boot(storage: S, tuning: Tuning, mut rng: R) -> Self {
        let ledger = ProgressLedger::load(storage);

        let mut circuit = CircuitPuzzle::new(tuning.circuit.size, tuning.circuit.unlock);
        circuit.generate(tuning.circuit.size, &mut rng);
        let mut routing = RoutePuzzle::new(tuning.routing.size, tuning.routing.unlock);
        routing.generate(tuning.routing.size, &mut rng);
        let mut memory = MemoryPuzzle::new(&tuning.memory);
        memory.new_game(tuning.memory.pairs, &mut rng);
        let arcade = ArcadeState::new(tuning.arcade.clone());

        let utility_key = if tuning.utility_key.enabled && !ledger.is_unlocked(SectionKey::Utility) {
            UtilityKey::Scheduled { due_ms: None }
        } else {
            UtilityKey::Off
        };

        log::info!(
            "Site booted: {}/3 sections unlocked",
            ledger.progress().unlocked_count()
        );

        Self {
            ledger,
            tuning,
            rng,
            circuit,
            routing,
            memory,
            arcade,
            utility_key,
            observers: Vec::new(),
            clock_ms: 0,
            last_frame_ms: None,
            accumulator: 0.0,
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn SiteObserver>) {
        self.observers.push(observer);
    }

    pub fn ledger(&self) -> &ProgressLedger<S> {
        &self.ledger
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn circuit(&self) -> &CircuitPuzzle {
        &self.circuit
    }

    pub fn routing(&self) -> &RoutePuzzle {
        &self.routing
    }

    pub fn memory(&self) -> &MemoryPuzzle {
        &self.memory
    }

    pub fn arcade(&self) -> &ArcadeState {
        &self.arcade
    }

    pub fn utility_key(&self) -> UtilityKey {
        self.utility_key
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Push the current state of every engine to the observers
    pub fn render_all(&mut self) {
        render(&mut self.observers, View::Circuit(&self.circuit));
        render(&mut self.observers, View::Routing(&self.routing));
        render(&mut self.observers, View::Memory(&self.memory));
        render(&mut self.observers, View::Arcade(&self.arcade));
        // Queued generation messages from boot
        self.sync_circuit();
        self.sync_routing();
        self.sync_memory();
    }

    // --- Circuit ---

    pub fn circuit_toggle(&mut self, row: usize, col: usize) -> bool {
        let toggled = self.circuit.toggle(row, col);
        if toggled {
            self.sync_circuit();
            render(&mut self.observers, View::Circuit(&self.circuit));
        }
        toggled
    }

    pub fn circuit_new(&mut self) {
        self.circuit.generate(self.tuning.circuit.size, &mut self.rng);
        self.sync_circuit();
        render(&mut self.observers, View::Circuit(&self.circuit));
    }

    pub fn circuit_reset(&mut self) {
        self.circuit.reset();
        self.sync_circuit();
        render(&mut self.observers, View::Circuit(&self.circuit));
    }

    // --- Routing ---

    pub fn route_rotate(&mut self, row: usize, col: usize) -> bool {
        let rotated = self.routing.rotate(row, col);
        if rotated {
            self.sync_routing();
            render(&mut self.observers, View::Routing(&self.routing));
        }
        rotated
    }

    pub fn route_new(&mut self) {
        self.routing.generate(self.tuning.routing.size, &mut self.rng);
        self.sync_routing();
        render(&mut self.observers, View::Routing(&self.routing));
    }

    // --- Memory ---

    /// Reveal a card at the current frame time
    pub fn memory_flip(&mut self, index: usize) -> bool {
        let flipped = self.memory.flip(index, self.clock_ms);
        if flipped {
            render(&mut self.observers, View::Memory(&self.memory));
        }
        flipped
    }

    pub fn memory_new(&mut self) {
        self.memory.new_game(self.tuning.memory.pairs, &mut self.rng);
        self.sync_memory();
        render(&mut self.observers, View::Memory(&self.memory));
    }

    pub fn memory_reset(&mut self) {
        self.memory.reset_game();
        self.sync_memory();
        render(&mut self.observers, View::Memory(&self.memory));
    }

    // --- Arcade ---

    pub fn arcade_start(&mut self) -> bool {
        let started = self.arcade.start();
        if started {
            self.accumulator = 0.0;
            self.sync_arcade();
            render(&mut self.observers, View::Arcade(&self.arcade));
        }
        started
    }

    pub fn arcade_reset(&mut self) {
        self.arcade.reset();
        self.accumulator = 0.0;
        self.sync_arcade();
        render(&mut self.observers, View::Arcade(&self.arcade));
    }

    // --- Utility key ---

    /// Claim the dropped terminal key. Ignored unless it is on screen.
    pub fn claim_utility_key(&mut self) -> bool {
        if self.utility_key != UtilityKey::Dropped {
            return false;
        }
        self.utility_key = UtilityKey::Spent;
        log::info!("Utility key claimed");
        self.apply_unlock(SectionKey::Utility);
        true
    }

    /// Advance time: arcade ticks at a fixed 60 Hz, memory settle deadlines,
    /// the utility key timer
    pub fn frame(&mut self, now_ms: f64, input: &TickInput) {
        let dt = match self.last_frame_ms {
            Some(last) => (now_ms - last).clamp(0.0, MAX_FRAME_MS),
            None => 0.0,
        };
        self.last_frame_ms = Some(now_ms);
        self.clock_ms = now_ms.max(0.0) as u64;

        if self.arcade.is_running() {
            self.accumulator += dt;
            let mut substeps = 0;
            while self.accumulator >= TICK_MS && substeps < MAX_SUBSTEPS {
                tick(&mut self.arcade, input, &mut self.rng);
                self.accumulator -= TICK_MS;
                substeps += 1;
            }
            if substeps > 0 {
                self.sync_arcade();
                render(&mut self.observers, View::Arcade(&self.arcade));
            }
        } else {
            self.accumulator = 0.0;
        }

        if self.memory.update(self.clock_ms) {
            self.sync_memory();
            render(&mut self.observers, View::Memory(&self.memory));
        }

        self.update_utility_key();
    }

    fn update_utility_key(&mut self) {
        let UtilityKey::Scheduled { due_ms } = self.utility_key else {
            return;
        };
        if self.ledger.is_unlocked(SectionKey::Utility) {
            self.utility_key = UtilityKey::Spent;
            return;
        }
        match due_ms {
            None => {
                self.utility_key = UtilityKey::Scheduled {
                    due_ms: Some(self.clock_ms + self.tuning.utility_key.delay_ms),
                };
            }
            Some(due) if self.clock_ms >= due => {
                self.utility_key = UtilityKey::Dropped;
                log::info!("Utility key dropped");
                for observer in &mut self.observers {
                    observer.terminal(UTILITY_KEY_LINE, false);
                    observer.utility_key_dropped();
                }
            }
            Some(_) => {}
        }
    }

    // --- Event routing ---

    fn sync_circuit(&mut self) {
        let events = self.circuit.drain_events();
        self.dispatch(events);
    }

    fn sync_routing(&mut self) {
        let events = self.routing.drain_events();
        self.dispatch(events);
    }

    fn sync_memory(&mut self) {
        let events = self.memory.drain_events();
        self.dispatch(events);
    }

    fn sync_arcade(&mut self) {
        let events: Vec<_> = self
            .arcade
            .drain_events()
            .into_iter()
            .filter(|e| e.announced())
            .collect();
        self.dispatch(events);
    }

    fn dispatch<E: EngineEvent>(&mut self, events: Vec<E>) {
        for event in events {
            let line = event.to_string();
            for observer in &mut self.observers {
                observer.terminal(&line, event.is_error());
            }
            if let Some(key) = event.unlock_request() {
                self.apply_unlock(key);
            }
        }
    }

    fn apply_unlock(&mut self, key: SectionKey) {
        let UnlockOutcome::Changed { reward } = self.ledger.unlock(key) else {
            return;
        };
        if key == SectionKey::Utility && self.utility_key != UtilityKey::Off {
            self.utility_key = UtilityKey::Spent;
        }

        let line = format!("> SECTION UNLOCKED: {}", key.as_str().to_uppercase());
        let progress = self.ledger.progress();
        for observer in &mut self.observers {
            observer.terminal(&line, false);
            observer.section_unlocked(key, progress);
            if reward {
                observer.reward();
            }
        }
    }
}

fn render(observers: &mut [Box<dyn SiteObserver>], view: View<'_>) {
    for observer in observers {
        observer.render(view);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;

    use super::*;
    use crate::persistence::MemoryStorage;
    use crate::progress::{PROGRESS_STORAGE_KEY, Progress};
    use crate::rng::SeededRandom;
    use crate::sim::{ErrorKind, FallingError, Threat};

    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
        unlocked: Vec<SectionKey>,
        rewards: u32,
        renders: u32,
        keys_dropped: u32,
    }

    impl SiteObserver for Recorder {
        fn render(&mut self, _view: View<'_>) {
            self.renders += 1;
        }

        fn terminal(&mut self, line: &str, _is_error: bool) {
            self.lines.push(line.to_string());
        }

        fn section_unlocked(&mut self, key: SectionKey, _progress: &Progress) {
            self.unlocked.push(key);
        }

        fn reward(&mut self) {
            self.rewards += 1;
        }

        fn utility_key_dropped(&mut self) {
            self.keys_dropped += 1;
        }
    }

    fn boot(storage: MemoryStorage) -> (Site<MemoryStorage, SeededRandom>, Rc<RefCell<Recorder>>) {
        let mut site = Site::boot(storage, Tuning::default(), SeededRandom::new(404));
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        site.add_observer(Box::new(recorder.clone()));
        (site, recorder)
    }

    fn solve_circuit(site: &mut Site<MemoryStorage, SeededRandom>) {
        for (row, col) in site.circuit().solution() {
            site.circuit_toggle(row, col);
        }
        assert!(site.circuit().is_solved());
    }

    fn solve_memory(site: &mut Site<MemoryStorage, SeededRandom>, mut now: f64) -> f64 {
        let cards = site.memory().cards().to_vec();
        for (i, card) in cards.iter().enumerate() {
            let Some(j) = cards.iter().skip(i + 1).position(|c| c.symbol == card.symbol) else {
                continue;
            };
            assert!(site.memory_flip(i));
            assert!(site.memory_flip(i + 1 + j));
            now += 300.0;
            site.frame(now, &TickInput::default());
        }
        assert!(site.memory().is_complete());
        now
    }

    /// Feed the arcade until its score passes 300
    fn score_arcade(site: &mut Site<MemoryStorage, SeededRandom>, mut now: f64) -> f64 {
        assert!(site.arcade_start());
        site.arcade.score = 295;
        let id = site.arcade.next_entity_id();
        let x = site.arcade.player_x;
        site.arcade.errors.push(FallingError {
            id,
            threat: Threat::Error(ErrorKind::NotFound),
            pos: Vec2::new(x - 6.0, PLAYER_TOP - ERROR_HEIGHT - 0.5),
            size: Vec2::new(12.0, ERROR_HEIGHT),
            speed: 1.0,
        });
        now += TICK_MS + 1.0;
        site.frame(now, &TickInput::default());
        assert!(site.arcade().score >= 300);
        now
    }

    #[test]
    fn test_boot_deals_every_puzzle() {
        let (site, _) = boot(MemoryStorage::new());
        assert!(!site.circuit().is_solved());
        assert!(site.routing().is_powered());
        assert_eq!(site.memory().cards().len(), 20);
        assert!(!site.arcade().is_running());
        assert_eq!(site.utility_key(), UtilityKey::Scheduled { due_ms: None });
    }

    #[test]
    fn test_circuit_solve_unlocks_utility() {
        let (mut site, recorder) = boot(MemoryStorage::new());
        solve_circuit(&mut site);
        assert!(site.ledger().is_unlocked(SectionKey::Utility));
        let recorder = recorder.borrow();
        assert_eq!(recorder.unlocked, [SectionKey::Utility]);
        assert!(recorder.lines.contains(&"> SECTION UNLOCKED: UTILITY".to_string()));
        assert!(recorder.renders > 0);
    }

    #[test]
    fn test_utility_key_drop_and_claim() {
        let (mut site, recorder) = boot(MemoryStorage::new());
        assert!(!site.claim_utility_key());

        site.frame(1000.0, &TickInput::default());
        assert_eq!(site.utility_key(), UtilityKey::Scheduled { due_ms: Some(3200) });
        site.frame(3199.0, &TickInput::default());
        assert_eq!(site.utility_key(), UtilityKey::Scheduled { due_ms: Some(3200) });
        site.frame(3200.0, &TickInput::default());
        assert_eq!(site.utility_key(), UtilityKey::Dropped);
        assert_eq!(recorder.borrow().keys_dropped, 1);

        assert!(site.claim_utility_key());
        assert!(!site.claim_utility_key());
        assert!(site.ledger().is_unlocked(SectionKey::Utility));
        assert_eq!(site.utility_key(), UtilityKey::Spent);
    }

    #[test]
    fn test_utility_key_not_offered_when_unlocked() {
        let mut storage = MemoryStorage::new();
        storage
            .set_item(PROGRESS_STORAGE_KEY, r#"{"utility":true}"#)
            .unwrap();
        let (mut site, recorder) = boot(storage);
        assert_eq!(site.utility_key(), UtilityKey::Off);
        site.frame(0.0, &TickInput::default());
        site.frame(10_000.0, &TickInput::default());
        assert_eq!(recorder.borrow().keys_dropped, 0);
    }

    #[test]
    fn test_solving_before_drop_cancels_key() {
        let (mut site, recorder) = boot(MemoryStorage::new());
        site.frame(0.0, &TickInput::default());
        solve_circuit(&mut site);
        site.frame(5000.0, &TickInput::default());
        assert_eq!(site.utility_key(), UtilityKey::Spent);
        assert_eq!(recorder.borrow().keys_dropped, 0);
    }

    #[test]
    fn test_memory_settles_on_frames() {
        let (mut site, _) = boot(MemoryStorage::new());
        site.frame(0.0, &TickInput::default());
        let cards = site.memory().cards().to_vec();
        let other = (1..cards.len())
            .find(|&j| cards[j].symbol != cards[0].symbol)
            .unwrap();
        assert!(site.memory_flip(0));
        assert!(site.memory_flip(other));
        assert!(!site.memory_flip(2));

        site.frame(599.0, &TickInput::default());
        assert!(site.memory().is_locked());
        site.frame(600.0, &TickInput::default());
        assert!(!site.memory().is_locked());
        assert!(!site.memory().cards()[0].face_up);
    }

    #[test]
    fn test_arcade_runs_fixed_ticks() {
        let (mut site, _) = boot(MemoryStorage::new());
        site.frame(0.0, &TickInput::default());
        site.frame(50.0, &TickInput::default());
        assert_eq!(site.arcade().time_ticks, 0);

        assert!(site.arcade_start());
        assert!(!site.arcade_start());
        site.frame(110.0, &TickInput::default());
        assert_eq!(site.arcade().time_ticks, 3);
        // Long stalls are capped
        site.frame(10_000.0, &TickInput::default());
        assert_eq!(site.arcade().time_ticks, 9);

        site.arcade_reset();
        assert!(!site.arcade().is_running());
    }

    #[test]
    fn test_full_unlock_fires_reward_once() {
        let (mut site, recorder) = boot(MemoryStorage::new());
        let mut now = 0.0;
        site.frame(now, &TickInput::default());

        now = score_arcade(&mut site, now);
        assert!(site.ledger().is_unlocked(SectionKey::Team));
        solve_circuit(&mut site);
        now = solve_memory(&mut site, now);
        assert!(site.ledger().is_fully_unlocked());
        assert_eq!(recorder.borrow().rewards, 1);

        // Re-solving and re-scoring changes nothing
        site.circuit_reset();
        solve_circuit(&mut site);
        site.arcade_reset();
        score_arcade(&mut site, now);
        assert_eq!(recorder.borrow().rewards, 1);
        assert_eq!(
            recorder.borrow().unlocked,
            [SectionKey::Team, SectionKey::Utility, SectionKey::Tokenomics]
        );

        // Survives a restart
        let json = site
            .ledger()
            .storage()
            .get_item(PROGRESS_STORAGE_KEY)
            .unwrap()
            .unwrap();
        let mut restored = MemoryStorage::new();
        restored.set_item(PROGRESS_STORAGE_KEY, &json).unwrap();
        let (site, _) = boot(restored);
        assert!(site.ledger().is_fully_unlocked());
        assert_eq!(site.utility_key(), UtilityKey::Off);
    }
}
