//! Memory match with hacking symbols
//!
//! Two cards per symbol, shuffled face down. Revealing a second card locks
//! input until the pair settles: after a short delay it either stays matched
//! or flips back. The delay is an explicit deadline advanced by `update`, not
//! a timer callback.

use std::fmt;

use serde::Serialize;

use crate::observer::EngineEvent;
use crate::progress::SectionKey;
use crate::rng::RandomSource;
use crate::tuning::MemoryTuning;

/// Card faces, in deal order
pub const SYMBOLS: [&str; 12] = ["<>", "{}", "[]", "()", "//", "::", "==", "||", "&&", "$$", "##", "++"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryCard {
    pub id: usize,
    /// Index into `SYMBOLS`
    pub symbol: u8,
    pub face_up: bool,
    pub matched: bool,
}

impl MemoryCard {
    pub fn glyph(&self) -> &'static str {
        SYMBOLS[self.symbol as usize % SYMBOLS.len()]
    }
}

/// Two revealed cards waiting out the settle delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingPair {
    pub first: usize,
    pub second: usize,
    pub is_match: bool,
    pub deadline_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEvent {
    Generated { pairs: usize },
    Reset,
    Matched { symbol: &'static str },
    Mismatched,
    Completed { moves: u32 },
    Unlock(SectionKey),
}

impl fmt::Display for MemoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryEvent::Generated { .. } => write!(f, "> New memory puzzle generated"),
            MemoryEvent::Reset => write!(f, "> Memory puzzle reset"),
            MemoryEvent::Matched { symbol } => write!(f, "> Pair matched: {}", symbol),
            MemoryEvent::Mismatched => write!(f, "> Access denied: pair mismatch"),
            MemoryEvent::Completed { .. } => write!(f, "> MEMORY MATCH SOLVED: Access granted"),
            MemoryEvent::Unlock(key) => write!(f, "> Memory key accepted: {}", key),
        }
    }
}

impl EngineEvent for MemoryEvent {
    fn unlock_request(&self) -> Option<SectionKey> {
        match self {
            MemoryEvent::Unlock(key) => Some(*key),
            _ => None,
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, MemoryEvent::Mismatched)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryPuzzle {
    cards: Vec<MemoryCard>,
    /// Face-up, unmatched cards picked this turn (at most two)
    flipped: Vec<usize>,
    pending: Option<PendingPair>,
    moves: u32,
    complete: bool,
    #[serde(skip)]
    match_delay_ms: u64,
    #[serde(skip)]
    mismatch_delay_ms: u64,
    #[serde(skip)]
    unlock: Option<SectionKey>,
    #[serde(skip)]
    events: Vec<MemoryEvent>,
}

impl MemoryPuzzle {
    /// Empty table; call `new_game` to deal
    pub fn new(tuning: &MemoryTuning) -> Self {
        Self {
            cards: Vec::new(),
            flipped: Vec::new(),
            pending: None,
            moves: 0,
            complete: false,
            match_delay_ms: tuning.match_delay_ms,
            mismatch_delay_ms: tuning.mismatch_delay_ms,
            unlock: tuning.unlock,
            events: Vec::new(),
        }
    }

    pub fn cards(&self) -> &[MemoryCard] {
        &self.cards
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn flipped(&self) -> &[usize] {
        &self.flipped
    }

    pub fn pending(&self) -> Option<PendingPair> {
        self.pending
    }

    /// Input is ignored while a pair is settling
    pub fn is_locked(&self) -> bool {
        self.pending.is_some()
    }

    /// When `update` next has work to do
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.map(|p| p.deadline_ms)
    }

    pub fn is_complete(&self) -> bool {
        !self.cards.is_empty() && self.cards.iter().all(|c| c.matched)
    }

    /// Deal `pair_count` pairs (clamped to the symbol alphabet) and shuffle
    pub fn new_game<R: RandomSource + ?Sized>(&mut self, pair_count: usize, rng: &mut R) {
        let pairs = pair_count.clamp(1, SYMBOLS.len());
        let mut cards: Vec<MemoryCard> = (0..pairs * 2)
            .map(|id| MemoryCard {
                id,
                symbol: (id / 2) as u8,
                face_up: false,
                matched: false,
            })
            .collect();

        // Fisher-Yates
        for i in (1..cards.len()).rev() {
            let j = rng.index(i + 1);
            cards.swap(i, j);
        }

        self.cards = cards;
        self.clear_turn();
        self.events.push(MemoryEvent::Generated { pairs });
        log::info!("Memory deck dealt: {} pairs", pairs);
    }

    /// Same arrangement, everything face down again
    pub fn reset_game(&mut self) {
        for (i, card) in self.cards.iter_mut().enumerate() {
            card.id = i;
            card.face_up = false;
            card.matched = false;
        }
        self.clear_turn();
        self.events.push(MemoryEvent::Reset);
    }

    fn clear_turn(&mut self) {
        self.flipped.clear();
        self.pending = None;
        self.moves = 0;
        self.complete = false;
    }

    /// Reveal a card. Ignored while locked, or for matched or already
    /// revealed cards. Returns whether the card turned over.
    pub fn flip(&mut self, index: usize, now_ms: u64) -> bool {
        if self.is_locked() || self.flipped.contains(&index) {
            return false;
        }
        let Some(card) = self.cards.get_mut(index) else {
            return false;
        };
        if card.matched {
            return false;
        }
        card.face_up = true;
        self.flipped.push(index);

        if let [first, second] = self.flipped[..] {
            self.moves += 1;
            let is_match = self.cards[first].symbol == self.cards[second].symbol;
            let delay = if is_match {
                self.match_delay_ms
            } else {
                self.mismatch_delay_ms
            };
            self.pending = Some(PendingPair {
                first,
                second,
                is_match,
                deadline_ms: now_ms + delay,
            });
        }
        true
    }

    /// Settle a pending pair whose deadline has passed. Returns whether it did.
    pub fn update(&mut self, now_ms: u64) -> bool {
        let Some(pair) = self.pending else {
            return false;
        };
        if now_ms < pair.deadline_ms {
            return false;
        }

        if pair.is_match {
            self.cards[pair.first].matched = true;
            self.cards[pair.second].matched = true;
            let symbol = self.cards[pair.first].glyph();
            self.events.push(MemoryEvent::Matched { symbol });
        } else {
            self.cards[pair.first].face_up = false;
            self.cards[pair.second].face_up = false;
            self.events.push(MemoryEvent::Mismatched);
        }
        self.flipped.clear();
        self.pending = None;

        if self.is_complete() && !self.complete {
            self.complete = true;
            log::info!("Memory match complete in {} moves", self.moves);
            self.events.push(MemoryEvent::Completed { moves: self.moves });
            if let Some(key) = self.unlock {
                self.events.push(MemoryEvent::Unlock(key));
            }
        }
        true
    }

    pub fn drain_events(&mut self) -> Vec<MemoryEvent> {
        std::mem::take(&mut self.events)
    }
}
