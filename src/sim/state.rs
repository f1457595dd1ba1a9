//! System Collapse game state and entity types
//!
//! Coordinates are percentages of the play area: x runs 0..100 left to right,
//! y runs 0..100 top to bottom. Entity positions are top-left corners.

use std::fmt;

use glam::Vec2;
use serde::Serialize;

use super::collision::Rect;
use crate::consts::*;
use crate::observer::EngineEvent;
use crate::progress::SectionKey;
use crate::tuning::ArcadeTuning;

/// Lifecycle of one arcade session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArcadePhase {
    /// Waiting for a start command
    Ready,
    /// Simulation ticking
    Active,
    /// Health ran out; waiting for reset
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntitySize {
    Small,
    Normal,
    Large,
}

impl EntitySize {
    pub fn width(&self) -> f32 {
        match self {
            EntitySize::Small => 9.0,
            EntitySize::Normal => 12.0,
            EntitySize::Large => 15.0,
        }
    }
}

/// Regular falling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    Null,
    Segv,
    Oom,
    Fail,
    Err,
    Bug,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::NotFound,
        ErrorKind::Null,
        ErrorKind::Segv,
        ErrorKind::Oom,
        ErrorKind::Fail,
        ErrorKind::Err,
        ErrorKind::Bug,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "404",
            ErrorKind::Null => "NULL",
            ErrorKind::Segv => "SEGV",
            ErrorKind::Oom => "OOM",
            ErrorKind::Fail => "FAIL",
            ErrorKind::Err => "ERR",
            ErrorKind::Bug => "BUG",
        }
    }

    pub fn points(&self) -> u64 {
        match self {
            ErrorKind::NotFound => 10,
            ErrorKind::Null => 15,
            ErrorKind::Segv => 20,
            ErrorKind::Oom => 25,
            ErrorKind::Fail => 12,
            ErrorKind::Err => 8,
            ErrorKind::Bug => 30,
        }
    }

    pub fn size(&self) -> EntitySize {
        match self {
            ErrorKind::Err => EntitySize::Small,
            ErrorKind::Bug => EntitySize::Large,
            _ => EntitySize::Normal,
        }
    }
}

/// Multi-hit bosses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BossKind {
    KernelPanic,
    StackOverflow,
    SystemCrash,
}

impl BossKind {
    pub const ALL: [BossKind; 3] = [BossKind::KernelPanic, BossKind::StackOverflow, BossKind::SystemCrash];

    pub fn label(&self) -> &'static str {
        match self {
            BossKind::KernelPanic => "KERNEL PANIC",
            BossKind::StackOverflow => "STACK OVERFLOW",
            BossKind::SystemCrash => "SYSTEM CRASH",
        }
    }

    /// Catches needed to defeat
    pub fn hits(&self) -> u32 {
        match self {
            BossKind::KernelPanic => 3,
            BossKind::StackOverflow => 4,
            BossKind::SystemCrash => 5,
        }
    }

    pub fn points(&self) -> u64 {
        match self {
            BossKind::KernelPanic => 100,
            BossKind::StackOverflow => 150,
            BossKind::SystemCrash => 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerUpKind {
    Shield,
    DoublePoints,
    Heal,
    Slow,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 4] = [
        PowerUpKind::Shield,
        PowerUpKind::DoublePoints,
        PowerUpKind::Heal,
        PowerUpKind::Slow,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PowerUpKind::Shield => "SHIELD",
            PowerUpKind::DoublePoints => "2X",
            PowerUpKind::Heal => "HEAL",
            PowerUpKind::Slow => "SLOW",
        }
    }
}

/// What a falling error is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Threat {
    Error(ErrorKind),
    Boss {
        kind: BossKind,
        hits_left: u32,
        /// Ticks until the next hit counts
        cooldown: u32,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FallingError {
    pub id: u32,
    pub threat: Threat,
    pub pos: Vec2,
    pub size: Vec2,
    /// Fall distance per tick, fixed at spawn
    pub speed: f32,
}

impl FallingError {
    pub fn is_boss(&self) -> bool {
        matches!(self.threat, Threat::Boss { .. })
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos, self.size)
    }

    pub fn label(&self) -> &'static str {
        match self.threat {
            Threat::Error(kind) => kind.label(),
            Threat::Boss { kind, .. } => kind.label(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FallingPowerUp {
    pub id: u32,
    pub kind: PowerUpKind,
    pub pos: Vec2,
    pub size: Vec2,
    pub speed: f32,
}

impl FallingPowerUp {
    pub fn rect(&self) -> Rect {
        Rect::new(self.pos, self.size)
    }
}

/// Game-over report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub score: u64,
    pub max_combo: u32,
    pub wave: u32,
    pub health: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArcadeEvent {
    Started,
    Reset,
    Caught { kind: ErrorKind, points: u64 },
    ComboStreak(u32),
    BossSpawned(BossKind),
    BossHit { kind: BossKind, hits_left: u32 },
    BossDefeated { kind: BossKind, points: u64 },
    PowerUp(PowerUpKind),
    Missed { boss: bool, absorbed: bool },
    WaveReached(u32),
    GameOver(RunSummary),
    Unlock(SectionKey),
}

impl ArcadeEvent {
    /// Whether the terminal should show this event (others are visual only)
    pub fn announced(&self) -> bool {
        !matches!(
            self,
            ArcadeEvent::Caught { .. }
                | ArcadeEvent::ComboStreak(_)
                | ArcadeEvent::BossHit { .. }
                | ArcadeEvent::Missed { .. }
        )
    }
}

impl fmt::Display for ArcadeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArcadeEvent::Started => write!(f, "> Game started successfully"),
            ArcadeEvent::Reset => write!(f, "> System rebooted"),
            ArcadeEvent::Caught { kind, points } => write!(f, "> Caught {} +{}", kind.label(), points),
            ArcadeEvent::ComboStreak(combo) => write!(f, "{}x COMBO!", combo),
            ArcadeEvent::BossSpawned(kind) => write!(f, "> BOSS ERROR DETECTED: {}", kind.label()),
            ArcadeEvent::BossHit { kind, hits_left } => write!(f, "> {} hit, {} left", kind.label(), hits_left),
            ArcadeEvent::BossDefeated { points, .. } => write!(f, "> BOSS DEFEATED! +{} points", points),
            ArcadeEvent::PowerUp(PowerUpKind::Shield) => write!(f, "> SHIELD ACTIVATED - 3 hits protected"),
            ArcadeEvent::PowerUp(PowerUpKind::DoublePoints) => write!(f, "> DOUBLE POINTS ACTIVATED"),
            ArcadeEvent::PowerUp(PowerUpKind::Heal) => write!(f, "> SYSTEM REPAIRED +30 health"),
            ArcadeEvent::PowerUp(PowerUpKind::Slow) => write!(f, "> TIME DILATION ACTIVATED"),
            ArcadeEvent::Missed { absorbed: true, .. } => write!(f, "> Shield absorbed impact"),
            ArcadeEvent::Missed { .. } => write!(f, "> Error slipped through"),
            ArcadeEvent::WaveReached(wave) => write!(f, "> WAVE {} - Difficulty increased", wave),
            ArcadeEvent::GameOver(s) => write!(
                f,
                "> Game Over - Score: {}, Max Combo: {}x, Wave: {}",
                s.score, s.max_combo, s.wave
            ),
            ArcadeEvent::Unlock(key) => write!(f, "> Arcade key accepted: {}", key),
        }
    }
}

impl EngineEvent for ArcadeEvent {
    fn unlock_request(&self) -> Option<SectionKey> {
        match self {
            ArcadeEvent::Unlock(key) => Some(*key),
            _ => None,
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, ArcadeEvent::BossSpawned(_) | ArcadeEvent::GameOver(_))
    }
}

/// Complete arcade state. One instance per game widget.
#[derive(Debug, Clone, Serialize)]
pub struct ArcadeState {
    pub phase: ArcadePhase,
    pub score: u64,
    /// 0..=100
    pub health: u32,
    /// Player centre, 0..=100
    pub player_x: f32,
    pub errors: Vec<FallingError>,
    pub power_ups: Vec<FallingPowerUp>,
    pub game_speed: f32,
    pub spawn_rate: f64,
    pub combo: u32,
    pub max_combo: u32,
    pub shield_charges: u32,
    pub double_points_ticks: u32,
    pub wave: u32,
    pub boss_active: bool,
    pub time_ticks: u64,
    /// Score at which the next boss is due
    pub next_boss_score: u64,
    /// Score-threshold unlock already requested this game
    pub score_unlock_sent: bool,
    next_id: u32,
    #[serde(skip)]
    pub(crate) tuning: ArcadeTuning,
    #[serde(skip)]
    pub(crate) events: Vec<ArcadeEvent>,
}

impl ArcadeState {
    pub fn new(tuning: ArcadeTuning) -> Self {
        Self {
            phase: ArcadePhase::Ready,
            score: 0,
            health: MAX_HEALTH,
            player_x: PLAYER_START_X,
            errors: Vec::new(),
            power_ups: Vec::new(),
            game_speed: tuning.start_game_speed,
            spawn_rate: tuning.start_spawn_rate,
            combo: 0,
            max_combo: 0,
            shield_charges: 0,
            double_points_ticks: 0,
            wave: 1,
            boss_active: false,
            time_ticks: 0,
            next_boss_score: tuning.boss_score_interval.max(1),
            score_unlock_sent: false,
            next_id: 1,
            tuning,
            events: Vec::new(),
        }
    }

    pub fn tuning(&self) -> &ArcadeTuning {
        &self.tuning
    }

    pub fn is_running(&self) -> bool {
        self.phase == ArcadePhase::Active
    }

    /// Begin a fresh game. Ignored while one is already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            log::debug!("start ignored: game already running");
            return false;
        }
        let events = std::mem::take(&mut self.events);
        *self = Self::new(self.tuning.clone());
        self.events = events;
        self.phase = ArcadePhase::Active;
        self.events.push(ArcadeEvent::Started);
        log::info!("System Collapse started");
        true
    }

    /// Drop every entity and return to Ready
    pub fn reset(&mut self) {
        let events = std::mem::take(&mut self.events);
        *self = Self::new(self.tuning.clone());
        self.events = events;
        self.events.push(ArcadeEvent::Reset);
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn player_rect(&self) -> Rect {
        Rect::new(
            Vec2::new(self.player_x - PLAYER_WIDTH / 2.0, PLAYER_TOP),
            Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT),
        )
    }

    pub fn double_points_active(&self) -> bool {
        self.double_points_ticks > 0
    }

    /// HUD status line
    pub fn status(&self) -> String {
        if self.shield_charges > 0 {
            return format!("SHIELD x{}", self.shield_charges);
        }
        if self.double_points_active() {
            return "2X POINTS".to_string();
        }
        match self.phase {
            ArcadePhase::Active => "ACTIVE".to_string(),
            ArcadePhase::Ready => "READY".to_string(),
            ArcadePhase::GameOver => "COLLAPSED".to_string(),
        }
    }

    /// Health has dropped into the danger band
    pub fn is_critical(&self) -> bool {
        self.health <= CRITICAL_HEALTH
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            score: self.score,
            max_combo: self.max_combo,
            wave: self.wave,
            health: self.health,
        }
    }

    pub fn drain_events(&mut self) -> Vec<ArcadeEvent> {
        std::mem::take(&mut self.events)
    }
}
