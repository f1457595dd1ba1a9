//! Fixed-cadence System Collapse tick
//!
//! One call advances the game by one 60 Hz step, in a fixed order:
//! spawn, player movement, entity fall and collision, wave and difficulty
//! ramp, threshold unlock, HUD refresh, game-over check.

use glam::Vec2;

use super::state::{
    ArcadeEvent, ArcadePhase, ArcadeState, BossKind, ErrorKind, FallingError, FallingPowerUp, PowerUpKind,
    Threat,
};
use crate::consts::*;
use crate::rng::RandomSource;

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Held left key (A / ArrowLeft)
    pub left: bool,
    /// Held right key (D / ArrowRight)
    pub right: bool,
    /// Absolute player position from touch/pointer, 0..=100
    pub pointer_x: Option<f32>,
    /// Autoplay: steer toward the lowest falling error
    pub idle_mode: bool,
}

/// Distance an entity of `height` falls per tick to cross the area in `secs`
fn fall_speed(height: f32, secs: f32) -> f32 {
    (AREA_HEIGHT + height) / (secs.max(MIN_FALL_SECS) * TICK_HZ)
}

/// Advance the game state by one tick
pub fn tick<R: RandomSource + ?Sized>(state: &mut ArcadeState, input: &TickInput, rng: &mut R) {
    if state.phase != ArcadePhase::Active {
        return;
    }
    state.time_ticks += 1;

    spawn(state, rng);
    update_player(state, input);
    update_errors(state);
    update_power_ups(state);

    let wave = (state.score / state.tuning.wave_score_width.max(1)) as u32 + 1;
    if wave > state.wave {
        state.wave = wave;
        state.events.push(ArcadeEvent::WaveReached(wave));
        log::info!("Wave {}", wave);
    }

    state.game_speed += state.tuning.game_speed_step;
    state.spawn_rate = (state.spawn_rate + state.tuning.spawn_rate_step).min(state.tuning.max_spawn_rate);

    if !state.score_unlock_sent && state.score >= state.tuning.unlock_score {
        state.score_unlock_sent = true;
        if let Some(key) = state.tuning.unlock {
            state.events.push(ArcadeEvent::Unlock(key));
        }
    }

    refresh_hud(state);

    if state.health == 0 {
        state.phase = ArcadePhase::GameOver;
        let summary = state.summary();
        log::info!("System collapsed: score {} wave {}", summary.score, summary.wave);
        state.events.push(ArcadeEvent::GameOver(summary));
    }
}

/// HUD refresh: runs once per UI update and owns the double-points countdown
fn refresh_hud(state: &mut ArcadeState) {
    state.double_points_ticks = state.double_points_ticks.saturating_sub(1);
}

fn spawn<R: RandomSource + ?Sized>(state: &mut ArcadeState, rng: &mut R) {
    if rng.chance(state.spawn_rate) {
        spawn_error(state, rng);
    }

    if rng.chance(state.tuning.powerup_roll) && rng.chance(state.tuning.powerup_accept) {
        spawn_power_up(state, rng);
    }

    if state.score >= state.next_boss_score {
        // A threshold crossed while a boss is still falling is skipped
        if !state.boss_active {
            spawn_boss(state, rng);
        }
        let interval = state.tuning.boss_score_interval.max(1);
        state.next_boss_score = (state.score / interval + 1) * interval;
    }
}

pub fn spawn_error<R: RandomSource + ?Sized>(state: &mut ArcadeState, rng: &mut R) {
    let kind = ErrorKind::ALL[rng.index(ErrorKind::ALL.len())];
    let width = kind.size().width();
    let x = rng.next_unit() as f32 * (AREA_WIDTH - width);
    let secs = ERROR_FALL_SECS - state.game_speed * ERROR_FALL_SECS_PER_SPEED;
    let id = state.next_entity_id();
    state.errors.push(FallingError {
        id,
        threat: Threat::Error(kind),
        pos: Vec2::new(x, -ERROR_HEIGHT),
        size: Vec2::new(width, ERROR_HEIGHT),
        speed: fall_speed(ERROR_HEIGHT, secs),
    });
}

pub fn spawn_power_up<R: RandomSource + ?Sized>(state: &mut ArcadeState, rng: &mut R) {
    let kind = PowerUpKind::ALL[rng.index(PowerUpKind::ALL.len())];
    let x = rng.next_unit() as f32 * (AREA_WIDTH - POWERUP_WIDTH);
    let id = state.next_entity_id();
    state.power_ups.push(FallingPowerUp {
        id,
        kind,
        pos: Vec2::new(x, -POWERUP_HEIGHT),
        size: Vec2::new(POWERUP_WIDTH, POWERUP_HEIGHT),
        speed: fall_speed(POWERUP_HEIGHT, POWERUP_FALL_SECS),
    });
}

pub fn spawn_boss<R: RandomSource + ?Sized>(state: &mut ArcadeState, rng: &mut R) {
    if state.boss_active {
        return;
    }
    let kind = BossKind::ALL[rng.index(BossKind::ALL.len())];
    let id = state.next_entity_id();
    state.errors.push(FallingError {
        id,
        threat: Threat::Boss {
            kind,
            hits_left: kind.hits(),
            cooldown: 0,
        },
        pos: Vec2::new((AREA_WIDTH - BOSS_WIDTH) / 2.0, -BOSS_HEIGHT),
        size: Vec2::new(BOSS_WIDTH, BOSS_HEIGHT),
        speed: fall_speed(BOSS_HEIGHT, BOSS_FALL_SECS),
    });
    state.boss_active = true;
    state.events.push(ArcadeEvent::BossSpawned(kind));
    log::info!("Boss spawned: {}", kind.label());
}

fn update_player(state: &mut ArcadeState, input: &TickInput) {
    let step = state.tuning.player_step;

    if let Some(x) = input.pointer_x {
        state.player_x = x.clamp(0.0, AREA_WIDTH);
    }

    let mut left = input.left;
    let mut right = input.right;
    if input.idle_mode {
        let target = state
            .errors
            .iter()
            .filter(|e| e.rect().top() <= PLAYER_TOP + PLAYER_HEIGHT)
            .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y))
            .map(|e| e.rect().center_x());
        if let Some(target) = target {
            left = target < state.player_x - step / 2.0;
            right = target > state.player_x + step / 2.0;
        }
    }

    if left {
        state.player_x = (state.player_x - step).max(0.0);
    }
    if right {
        state.player_x = (state.player_x + step).min(AREA_WIDTH);
    }
}

fn update_errors(state: &mut ArcadeState) {
    let player = state.player_rect();
    let multiplier = if state.double_points_active() { 2 } else { 1 };
    let errors = std::mem::take(&mut state.errors);
    let mut kept = Vec::with_capacity(errors.len());

    for mut error in errors {
        error.pos.y += error.speed;

        if error.rect().overlaps(&player) {
            match &mut error.threat {
                Threat::Error(kind) => {
                    let points = kind.points() * multiplier;
                    state.score += points;
                    state.combo += 1;
                    state.max_combo = state.max_combo.max(state.combo);
                    state.events.push(ArcadeEvent::Caught { kind: *kind, points });
                    if state.combo >= COMBO_STREAK {
                        state.events.push(ArcadeEvent::ComboStreak(state.combo));
                    }
                    continue;
                }
                Threat::Boss {
                    kind,
                    hits_left,
                    cooldown,
                } => {
                    if *cooldown > 0 {
                        *cooldown -= 1;
                        kept.push(error);
                        continue;
                    }
                    *hits_left = hits_left.saturating_sub(1);
                    if *hits_left == 0 {
                        let points = kind.points() * multiplier;
                        state.score += points;
                        state.combo += state.tuning.boss_combo_bonus;
                        state.max_combo = state.max_combo.max(state.combo);
                        state.boss_active = false;
                        state.events.push(ArcadeEvent::BossDefeated { kind: *kind, points });
                        if let Some(key) = state.tuning.unlock {
                            state.events.push(ArcadeEvent::Unlock(key));
                        }
                        log::info!("Boss defeated: {}", kind.label());
                        continue;
                    }
                    *cooldown = state.tuning.boss_hit_cooldown_ticks;
                    state.events.push(ArcadeEvent::BossHit {
                        kind: *kind,
                        hits_left: *hits_left,
                    });
                    kept.push(error);
                    continue;
                }
            }
        }

        if let Threat::Boss { cooldown, .. } = &mut error.threat {
            *cooldown = cooldown.saturating_sub(1);
        }

        if error.rect().top() > AREA_HEIGHT {
            let boss = error.is_boss();
            let absorbed = state.shield_charges > 0;
            if absorbed {
                state.shield_charges -= 1;
            } else {
                let damage = if boss {
                    state.tuning.boss_miss_damage
                } else {
                    state.tuning.miss_damage
                };
                state.health = state.health.saturating_sub(damage);
            }
            state.combo = 0;
            if boss {
                state.boss_active = false;
            }
            state.events.push(ArcadeEvent::Missed { boss, absorbed });
            continue;
        }

        kept.push(error);
    }

    state.errors = kept;
}

fn update_power_ups(state: &mut ArcadeState) {
    let player = state.player_rect();
    let power_ups = std::mem::take(&mut state.power_ups);
    let mut kept = Vec::with_capacity(power_ups.len());

    for mut power_up in power_ups {
        power_up.pos.y += power_up.speed;
        if power_up.rect().overlaps(&player) {
            activate_power_up(state, power_up.kind);
        } else if power_up.rect().top() <= AREA_HEIGHT {
            kept.push(power_up);
        }
    }

    state.power_ups = kept;
}

pub fn activate_power_up(state: &mut ArcadeState, kind: PowerUpKind) {
    let tuning = &state.tuning;
    match kind {
        PowerUpKind::Shield => state.shield_charges += tuning.shield_charges,
        PowerUpKind::DoublePoints => state.double_points_ticks = tuning.double_points_ticks,
        PowerUpKind::Heal => state.health = (state.health + tuning.heal_amount).min(MAX_HEALTH),
        PowerUpKind::Slow => state.game_speed = (state.game_speed - tuning.slow_amount).max(tuning.min_game_speed),
    }
    state.events.push(ArcadeEvent::PowerUp(kind));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SectionKey;
    use crate::rng::{ScriptedRandom, SeededRandom};
    use crate::sim::state::RunSummary;
    use crate::tuning::ArcadeTuning;

    /// Never spawns anything on its own
    fn quiet() -> ScriptedRandom {
        ScriptedRandom::constant(0.999)
    }

    fn active() -> ArcadeState {
        let mut state = ArcadeState::new(ArcadeTuning::default());
        state.start();
        state.drain_events();
        state
    }

    /// A regular error sitting just above the player, falling into it next tick
    fn drop_on_player(state: &mut ArcadeState, kind: ErrorKind) {
        let id = state.next_entity_id();
        let width = kind.size().width();
        state.errors.push(FallingError {
            id,
            threat: Threat::Error(kind),
            pos: Vec2::new(state.player_x - width / 2.0, PLAYER_TOP - ERROR_HEIGHT - 0.5),
            size: Vec2::new(width, ERROR_HEIGHT),
            speed: 1.0,
        });
    }

    /// A regular error about to leave the bottom, away from the player
    fn drop_past_player(state: &mut ArcadeState, boss: bool) {
        let id = state.next_entity_id();
        let threat = if boss {
            state.boss_active = true;
            Threat::Boss {
                kind: BossKind::KernelPanic,
                hits_left: 3,
                cooldown: 0,
            }
        } else {
            Threat::Error(ErrorKind::NotFound)
        };
        state.errors.push(FallingError {
            id,
            threat,
            pos: Vec2::new(0.0, AREA_HEIGHT - 0.5),
            size: Vec2::new(5.0, ERROR_HEIGHT),
            speed: 1.0,
        });
        state.player_x = 90.0;
    }

    #[test]
    fn test_inactive_states_do_not_tick() {
        let mut state = ArcadeState::new(ArcadeTuning::default());
        tick(&mut state, &TickInput::default(), &mut SeededRandom::new(1));
        assert_eq!(state.time_ticks, 0);
        assert!(state.errors.is_empty());
    }

    #[test]
    fn test_catch_awards_points_and_combo() {
        let mut state = active();
        drop_on_player(&mut state, ErrorKind::Segv);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.score, 20);
        assert_eq!(state.combo, 1);
        assert_eq!(state.max_combo, 1);
        assert!(state.errors.is_empty());
    }

    #[test]
    fn test_double_points() {
        let mut state = active();
        state.double_points_ticks = 10;
        drop_on_player(&mut state, ErrorKind::Bug);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.score, 60);
        assert_eq!(state.double_points_ticks, 9);
    }

    #[test]
    fn test_miss_damages_and_breaks_combo() {
        let mut state = active();
        state.combo = 4;
        state.max_combo = 4;
        drop_past_player(&mut state, false);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.health, 90);
        assert_eq!(state.combo, 0);
        assert_eq!(state.max_combo, 4);
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_shield_absorbs_miss() {
        let mut state = active();
        state.shield_charges = 1;
        state.combo = 2;
        drop_past_player(&mut state, false);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.health, 100);
        assert_eq!(state.shield_charges, 0);
        assert_eq!(state.combo, 0);
    }

    #[test]
    fn test_missed_boss_hurts_more_and_clears_flag() {
        let mut state = active();
        drop_past_player(&mut state, true);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.health, 70);
        assert!(!state.boss_active);
    }

    #[test]
    fn test_boss_needs_several_hits() {
        let mut tuning = ArcadeTuning::default();
        tuning.boss_hit_cooldown_ticks = 0;
        let mut state = ArcadeState::new(tuning);
        state.start();
        state.boss_active = true;
        let id = state.next_entity_id();
        state.errors.push(FallingError {
            id,
            threat: Threat::Boss {
                kind: BossKind::KernelPanic,
                hits_left: 3,
                cooldown: 0,
            },
            pos: Vec2::new(35.0, PLAYER_TOP - 5.0),
            size: Vec2::new(BOSS_WIDTH, BOSS_HEIGHT),
            speed: 0.0,
        });
        state.drain_events();

        tick(&mut state, &TickInput::default(), &mut quiet());
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.score, 0);
        assert_eq!(state.errors.len(), 1);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.score, 100);
        assert_eq!(state.combo, 5);
        assert!(!state.boss_active);
        assert!(state.errors.is_empty());
        let events = state.drain_events();
        assert!(events.contains(&ArcadeEvent::BossDefeated {
            kind: BossKind::KernelPanic,
            points: 100
        }));
        assert!(events.contains(&ArcadeEvent::Unlock(SectionKey::Team)));
    }

    fn rest_boss_on_player(state: &mut ArcadeState) {
        state.boss_active = true;
        let id = state.next_entity_id();
        state.errors.push(FallingError {
            id,
            threat: Threat::Boss {
                kind: BossKind::StackOverflow,
                hits_left: 4,
                cooldown: 0,
            },
            pos: Vec2::new(35.0, PLAYER_TOP - 5.0),
            size: Vec2::new(BOSS_WIDTH, BOSS_HEIGHT),
            speed: 0.0,
        });
    }

    fn boss_hits_left(state: &ArcadeState) -> u32 {
        match state.errors[0].threat {
            Threat::Boss { hits_left, .. } => hits_left,
            _ => panic!("boss vanished"),
        }
    }

    #[test]
    fn test_boss_loses_a_hit_every_tick_of_overlap() {
        let mut state = active();
        rest_boss_on_player(&mut state);
        for _ in 0..3 {
            tick(&mut state, &TickInput::default(), &mut quiet());
        }
        assert_eq!(boss_hits_left(&state), 1);
    }

    #[test]
    fn test_boss_cooldown_spaces_hits() {
        let mut tuning = ArcadeTuning::default();
        tuning.boss_hit_cooldown_ticks = 10;
        let mut state = ArcadeState::new(tuning);
        state.start();
        rest_boss_on_player(&mut state);
        for _ in 0..5 {
            tick(&mut state, &TickInput::default(), &mut quiet());
        }
        assert_eq!(boss_hits_left(&state), 3);
    }

    #[test]
    fn test_score_threshold_unlocks_once() {
        let mut state = active();
        state.score = 290;
        drop_on_player(&mut state, ErrorKind::NotFound);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.score, 300);
        drop_on_player(&mut state, ErrorKind::NotFound);
        tick(&mut state, &TickInput::default(), &mut quiet());
        let unlocks: Vec<_> = state
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, ArcadeEvent::Unlock(_)))
            .collect();
        assert_eq!(unlocks, [ArcadeEvent::Unlock(SectionKey::Team)]);
    }

    #[test]
    fn test_boss_spawns_once_at_500() {
        let mut state = active();
        state.score = 490;
        drop_on_player(&mut state, ErrorKind::NotFound);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.score, 500);
        assert!(!state.boss_active);

        for _ in 0..5 {
            tick(&mut state, &TickInput::default(), &mut quiet());
        }
        let bosses = state.errors.iter().filter(|e| e.is_boss()).count();
        assert_eq!(bosses, 1);
        assert!(state.boss_active);
        assert_eq!(state.next_boss_score, 1000);
        let spawned = state
            .drain_events()
            .iter()
            .filter(|e| matches!(e, ArcadeEvent::BossSpawned(_)))
            .count();
        assert_eq!(spawned, 1);
    }

    #[test]
    fn test_wave_follows_score() {
        let mut state = active();
        state.score = 395;
        drop_on_player(&mut state, ErrorKind::NotFound);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.wave, 3);
        assert!(state.drain_events().contains(&ArcadeEvent::WaveReached(3)));
    }

    #[test]
    fn test_difficulty_ramps_and_caps() {
        let mut state = active();
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert!((state.game_speed - 1.001).abs() < 1e-6);
        assert!((state.spawn_rate - 0.0201).abs() < 1e-9);
        state.spawn_rate = 0.07995;
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.spawn_rate, 0.08);
    }

    #[test]
    fn test_player_movement_clamped() {
        let mut state = active();
        let left = TickInput {
            left: true,
            ..Default::default()
        };
        for _ in 0..40 {
            tick(&mut state, &left, &mut quiet());
        }
        assert_eq!(state.player_x, 0.0);

        let pointer = TickInput {
            pointer_x: Some(140.0),
            ..Default::default()
        };
        tick(&mut state, &pointer, &mut quiet());
        assert_eq!(state.player_x, 100.0);
    }

    #[test]
    fn test_power_up_effects() {
        let mut state = active();
        state.health = 80;
        activate_power_up(&mut state, PowerUpKind::Heal);
        assert_eq!(state.health, 100);
        activate_power_up(&mut state, PowerUpKind::Shield);
        activate_power_up(&mut state, PowerUpKind::Shield);
        assert_eq!(state.shield_charges, 6);
        activate_power_up(&mut state, PowerUpKind::Slow);
        activate_power_up(&mut state, PowerUpKind::Slow);
        assert_eq!(state.game_speed, 0.5);
        activate_power_up(&mut state, PowerUpKind::DoublePoints);
        assert_eq!(state.double_points_ticks, 300);
    }

    #[test]
    fn test_game_over_at_zero_health() {
        let mut state = active();
        state.health = 10;
        drop_past_player(&mut state, false);
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.phase, ArcadePhase::GameOver);
        let events = state.drain_events();
        assert!(events.contains(&ArcadeEvent::GameOver(RunSummary {
            score: 0,
            max_combo: 0,
            wave: 1,
            health: 0
        })));

        let before = state.time_ticks;
        tick(&mut state, &TickInput::default(), &mut quiet());
        assert_eq!(state.time_ticks, before);
        state.reset();
        assert_eq!(state.phase, ArcadePhase::Ready);
    }

    #[test]
    fn test_spawning_with_forced_rolls() {
        let mut state = active();
        // every roll 0.0: error spawns, power-up spawns
        tick(&mut state, &TickInput::default(), &mut ScriptedRandom::constant(0.0));
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.power_ups.len(), 1);
        assert_eq!(state.errors[0].label(), "404");
    }

    #[test]
    fn test_score_only_rises_on_catches() {
        let mut state = active();
        let mut rng = SeededRandom::new(2024);
        let mut last_score = 0;
        let mut last_health = state.health;
        for _ in 0..5000 {
            let shield_before = state.shield_charges;
            tick(&mut state, &TickInput::default(), &mut rng);
            let events = state.drain_events();
            let caught = events
                .iter()
                .any(|e| matches!(e, ArcadeEvent::Caught { .. } | ArcadeEvent::BossDefeated { .. }));
            let damaged = events.iter().any(|e| matches!(e, ArcadeEvent::Missed { absorbed: false, .. }));
            if state.score > last_score {
                assert!(caught);
            }
            if state.health < last_health {
                assert!(damaged);
                assert_eq!(shield_before, 0);
            }
            if !caught && events.iter().any(|e| matches!(e, ArcadeEvent::Missed { .. })) {
                assert_eq!(state.combo, 0);
            }
            last_score = state.score;
            last_health = state.health;
            if state.phase != ArcadePhase::Active {
                break;
            }
        }
    }

    #[test]
    fn test_idle_mode_reaches_falling_error() {
        let mut state = active();
        let id = state.next_entity_id();
        state.errors.push(FallingError {
            id,
            threat: Threat::Error(ErrorKind::Oom),
            pos: Vec2::new(5.0, 0.0),
            size: Vec2::new(12.0, ERROR_HEIGHT),
            speed: 1.0,
        });
        let idle = TickInput {
            idle_mode: true,
            ..Default::default()
        };
        for _ in 0..120 {
            tick(&mut state, &idle, &mut quiet());
        }
        assert_eq!(state.score, 25);
        assert_eq!(state.health, 100);
    }
}
