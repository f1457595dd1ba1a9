//! Meta-puzzle progress ledger
//!
//! Tracks which page sections the mini-games have unlocked. Persisted to a
//! single storage entry as an open JSON object: absent keys read as locked,
//! unknown keys survive the next write untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::persistence::{Storage, StorageError};

/// Storage key holding the serialized progress object
pub const PROGRESS_STORAGE_KEY: &str = "meta_progress";

/// A lockable page section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    Utility,
    Tokenomics,
    Team,
}

impl SectionKey {
    pub const ALL: [SectionKey; 3] = [SectionKey::Utility, SectionKey::Tokenomics, SectionKey::Team];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Utility => "utility",
            SectionKey::Tokenomics => "tokenomics",
            SectionKey::Team => "team",
        }
    }

}

impl FromStr for SectionKey {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "utility" => Ok(SectionKey::Utility),
            "tokenomics" => Ok(SectionKey::Tokenomics),
            "team" => Ok(SectionKey::Team),
            _ => Err(UnknownSection(s.to_string())),
        }
    }
}

/// Name that is not one of the tracked sections
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown section: {0}")]
pub struct UnknownSection(pub String);

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entries shown on the roadmap, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadmapItem {
    Section(SectionKey),
    Reward,
}

impl RoadmapItem {
    pub fn key(&self) -> &'static str {
        match self {
            RoadmapItem::Section(key) => key.as_str(),
            RoadmapItem::Reward => "reward",
        }
    }
}

/// Unlock flags plus whatever else was found in the stored object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    pub utility: bool,
    pub tokenomics: bool,
    pub team: bool,
    /// Unrecognised keys from storage, written back verbatim
    extra: Map<String, Value>,
}

impl Progress {
    pub fn get(&self, key: SectionKey) -> bool {
        match key {
            SectionKey::Utility => self.utility,
            SectionKey::Tokenomics => self.tokenomics,
            SectionKey::Team => self.team,
        }
    }

    fn set(&mut self, key: SectionKey) {
        match key {
            SectionKey::Utility => self.utility = true,
            SectionKey::Tokenomics => self.tokenomics = true,
            SectionKey::Team => self.team = true,
        }
    }

    /// All three sections unlocked
    pub fn reward(&self) -> bool {
        self.utility && self.tokenomics && self.team
    }

    pub fn unlocked_count(&self) -> usize {
        SectionKey::ALL.iter().filter(|k| self.get(**k)).count()
    }

    /// Roadmap lines with their checked state
    pub fn roadmap(&self) -> Vec<(RoadmapItem, bool)> {
        let mut items: Vec<_> = SectionKey::ALL
            .iter()
            .map(|k| (RoadmapItem::Section(*k), self.get(*k)))
            .collect();
        items.push((RoadmapItem::Reward, self.reward()));
        items
    }

    /// Merge a stored object over the defaults.
    ///
    /// Truthy values unlock; anything else (including a malformed value) leaves
    /// the default `false`. A non-object document is treated as empty.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(mut map) = value else {
            return Ok(Self::default());
        };

        let mut progress = Self::default();
        for key in SectionKey::ALL {
            if let Some(v) = map.remove(key.as_str()) {
                if is_truthy(&v) {
                    progress.set(key);
                }
            }
        }
        progress.extra = map;
        Ok(progress)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut map = self.extra.clone();
        for key in SectionKey::ALL {
            map.insert(key.as_str().to_string(), Value::Bool(self.get(key)));
        }
        serde_json::to_string(&Value::Object(map))
    }
}

impl Serialize for Progress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(4))?;
        for key in SectionKey::ALL {
            map.serialize_entry(key.as_str(), &self.get(key))?;
        }
        map.serialize_entry("reward", &self.reward())?;
        map.end()
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    }
}

/// Result of an unlock request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Section was already unlocked; nothing written
    Unchanged,
    /// Section flipped to unlocked. `reward` is set the first time the
    /// ledger becomes fully unlocked in this session.
    Changed { reward: bool },
}

impl UnlockOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, UnlockOutcome::Changed { .. })
    }
}

/// The single process-wide owner of unlock state
#[derive(Debug)]
pub struct ProgressLedger<S: Storage> {
    storage: S,
    progress: Progress,
    reward_shown: bool,
}

impl<S: Storage> ProgressLedger<S> {
    /// Load persisted progress. Storage or parse failures mean "no prior progress".
    pub fn load(storage: S) -> Self {
        let progress = match storage.get_item(PROGRESS_STORAGE_KEY) {
            Ok(Some(json)) => match Progress::from_json(&json) {
                Ok(progress) => {
                    log::info!("Loaded progress ({}/3 sections unlocked)", progress.unlocked_count());
                    progress
                }
                Err(e) => {
                    log::warn!("Discarding corrupt progress: {}", e);
                    Progress::default()
                }
            },
            Ok(None) => {
                log::info!("No saved progress, starting fresh");
                Progress::default()
            }
            Err(e) => {
                log::warn!("Progress storage unreadable ({}), starting fresh", e);
                Progress::default()
            }
        };

        Self {
            storage,
            progress,
            reward_shown: false,
        }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn is_unlocked(&self, key: SectionKey) -> bool {
        self.progress.get(key)
    }

    pub fn is_fully_unlocked(&self) -> bool {
        self.progress.reward()
    }

    /// Whether the reward has already been signalled this session
    pub fn reward_shown(&self) -> bool {
        self.reward_shown
    }

    /// Unlock a section: set, persist, report. Idempotent.
    ///
    /// A failed write keeps the in-memory unlock; it is retried on the next
    /// successful save.
    pub fn unlock(&mut self, key: SectionKey) -> UnlockOutcome {
        if self.progress.get(key) {
            return UnlockOutcome::Unchanged;
        }

        self.progress.set(key);
        if let Err(e) = self.save() {
            log::warn!("Progress not persisted: {}", e);
        }
        log::info!("Section unlocked: {}", key);

        let reward = self.progress.reward() && !self.reward_shown;
        if reward {
            self.reward_shown = true;
            log::info!("All sections unlocked");
        }
        UnlockOutcome::Changed { reward }
    }

    /// Write the full mapping to storage
    pub fn save(&mut self) -> Result<(), StorageError> {
        let json = self.progress.to_json()?;
        self.storage.set_item(PROGRESS_STORAGE_KEY, &json)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

/// Downloadable badge for a fully unlocked ledger
pub fn reward_badge_svg() -> &'static str {
    concat!(
        r##"<?xml version="1.0" encoding="UTF-8"?>"##,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="800" height="450" viewBox="0 0 800 450" style="background:#000">"##,
        r##"<defs><linearGradient id="g" x1="0" y1="0" x2="1" y2="1">"##,
        r##"<stop offset="0%" stop-color="#00ff88"/><stop offset="100%" stop-color="#8800ff"/>"##,
        r##"</linearGradient></defs>"##,
        r##"<rect x="0" y="0" width="800" height="450" fill="#000"/>"##,
        r##"<text x="50%" y="45%" fill="url(#g)" font-family="IBM Plex Mono, monospace" font-size="56" text-anchor="middle" style="letter-spacing:2px;">$404 OPERATIVE</text>"##,
        r##"<text x="50%" y="60%" fill="#fff" font-family="Space Mono, monospace" font-size="22" opacity="0.8" text-anchor="middle">All Sections Unlocked</text>"##,
        r##"<rect x="150" y="330" width="500" height="3" fill="#00ff88" opacity="0.6"/>"##,
        r##"</svg>"##,
    )
}

/// File name offered for the badge download
pub const REWARD_BADGE_FILENAME: &str = "404-operative-badge.svg";
