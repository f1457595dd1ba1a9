//! Circuit unlock: a Lights-Out variant
//!
//! Pressing a cell flips it and its four orthogonal neighbours. The goal is an
//! all-lit board. Puzzles are produced by pressing random cells on a solved
//! board, so every generated puzzle is solvable: presses commute and each is
//! its own inverse.

use std::fmt;

use serde::Serialize;

use crate::observer::EngineEvent;
use crate::progress::SectionKey;
use crate::rng::RandomSource;

/// Generation retries when a scramble cancels itself out
const MAX_SCRAMBLE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitEvent {
    Generated { size: usize },
    Reset,
    Solved { moves: u32 },
    Unlock(SectionKey),
}

impl fmt::Display for CircuitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitEvent::Generated { .. } => write!(f, "> New puzzle generated"),
            CircuitEvent::Reset => write!(f, "> Puzzle reset"),
            CircuitEvent::Solved { .. } => write!(f, "> PUZZLE SOLVED: Circuit unlocked"),
            CircuitEvent::Unlock(key) => write!(f, "> Circuit key accepted: {}", key),
        }
    }
}

impl EngineEvent for CircuitEvent {
    fn unlock_request(&self) -> Option<SectionKey> {
        match self {
            CircuitEvent::Unlock(key) => Some(*key),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitPuzzle {
    size: usize,
    /// Row-major lit flags
    cells: Vec<bool>,
    /// Baseline restored by `reset`
    #[serde(skip)]
    initial: Vec<bool>,
    moves: u32,
    solved: bool,
    /// Presses applied by the last generation, in order
    #[serde(skip)]
    scramble: Vec<(usize, usize)>,
    #[serde(skip)]
    unlock: Option<SectionKey>,
    #[serde(skip)]
    events: Vec<CircuitEvent>,
}

impl CircuitPuzzle {
    /// A solved `size`×`size` board; call `generate` to scramble it
    pub fn new(size: usize, unlock: Option<SectionKey>) -> Self {
        let size = size.max(1);
        let cells = vec![true; size * size];
        Self {
            size,
            initial: cells.clone(),
            cells,
            moves: 0,
            solved: true,
            scramble: Vec::new(),
            unlock,
            events: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<bool> {
        self.index(row, col).map(|i| self.cells[i])
    }

    pub fn lit_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Rows of lit flags, top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.cells.chunks(self.size)
    }

    pub fn scramble(&self) -> &[(usize, usize)] {
        &self.scramble
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.size && col < self.size).then(|| row * self.size + col)
    }

    fn flip(&mut self, row: isize, col: isize) {
        if row < 0 || col < 0 {
            return;
        }
        if let Some(i) = self.index(row as usize, col as usize) {
            self.cells[i] = !self.cells[i];
        }
    }

    /// Press without bookkeeping
    fn press(&mut self, row: usize, col: usize) {
        let (r, c) = (row as isize, col as isize);
        self.flip(r, c);
        self.flip(r - 1, c);
        self.flip(r + 1, c);
        self.flip(r, c - 1);
        self.flip(r, c + 1);
    }

    /// Player press. Out-of-bounds presses are ignored; returns whether it applied.
    pub fn toggle(&mut self, row: usize, col: usize) -> bool {
        if self.index(row, col).is_none() {
            return false;
        }
        self.press(row, col);
        self.moves += 1;
        log::debug!("circuit press ({}, {}) move {}", row, col, self.moves);
        self.check_solved();
        true
    }

    /// Fresh puzzle: solved board plus `size * size` random presses
    pub fn generate<R: RandomSource + ?Sized>(&mut self, size: usize, rng: &mut R) {
        let size = size.max(1);
        self.size = size;

        for _ in 0..MAX_SCRAMBLE_ATTEMPTS {
            self.cells = vec![true; size * size];
            self.scramble.clear();
            for _ in 0..size * size {
                let row = rng.index(size);
                let col = rng.index(size);
                self.press(row, col);
                self.scramble.push((row, col));
            }
            if !self.is_solved() {
                break;
            }
        }

        self.initial = self.cells.clone();
        self.moves = 0;
        self.solved = self.is_solved();
        self.events.push(CircuitEvent::Generated { size });
    }

    /// Back to the last generated baseline
    pub fn reset(&mut self) {
        self.cells = self.initial.clone();
        self.moves = 0;
        self.solved = self.is_solved();
        self.events.push(CircuitEvent::Reset);
    }

    pub fn is_solved(&self) -> bool {
        self.cells.iter().all(|c| *c)
    }

    fn check_solved(&mut self) {
        let now = self.is_solved();
        if now && !self.solved {
            log::info!("Circuit solved in {} moves", self.moves);
            self.events.push(CircuitEvent::Solved { moves: self.moves });
            if let Some(key) = self.unlock {
                self.events.push(CircuitEvent::Unlock(key));
            }
        }
        self.solved = now;
    }

    /// Cells to press once each to solve from the baseline: those the
    /// scramble hit an odd number of times, in row-major order.
    pub fn solution(&self) -> Vec<(usize, usize)> {
        let mut parity = vec![false; self.size * self.size];
        for &(row, col) in &self.scramble {
            if let Some(i) = self.index(row, col) {
                parity[i] = !parity[i];
            }
        }
        parity
            .iter()
            .enumerate()
            .filter(|(_, odd)| **odd)
            .map(|(i, _)| (i / self.size, i % self.size))
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<CircuitEvent> {
        std::mem::take(&mut self.events)
    }
}
