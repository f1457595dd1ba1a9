//! Signal routing: rotate pipe tiles until power flows from start to goal
//!
//! Each tile exposes a set of edges derived from its kind and rotation. Two
//! orthogonal neighbours are linked when both expose the shared edge.
//! Generation carves a random start→goal path and lays tiles along it that
//! already link up, so a fresh layout is always powered.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::observer::EngineEvent;
use crate::progress::SectionKey;
use crate::rng::RandomSource;

/// Walk rolls allowed per grid cell before carving finishes straight
const CARVE_STEPS_PER_CELL: usize = 32;

/// Tile edge, clockwise from up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn opposite(self) -> Self {
        Self::ALL[(self as usize + 2) % 4]
    }

    /// Rotate clockwise by `steps` quarter turns
    pub fn rotated(self, steps: u8) -> Self {
        Self::ALL[(self as usize + steps as usize) % 4]
    }

    /// Step from `pos`, `None` when leaving a `size`×`size` grid
    fn step(self, pos: Pos, size: usize) -> Option<Pos> {
        let Pos { row, col } = pos;
        match self {
            Direction::Up => row.checked_sub(1).map(|row| Pos { row, col }),
            Direction::Down => (row + 1 < size).then(|| Pos { row: row + 1, col }),
            Direction::Left => col.checked_sub(1).map(|col| Pos { row, col }),
            Direction::Right => (col + 1 < size).then(|| Pos { row, col: col + 1 }),
        }
    }

    /// Direction from `from` to an orthogonally adjacent `to`
    fn between(from: Pos, to: Pos) -> Option<Self> {
        match (to.row as isize - from.row as isize, to.col as isize - from.col as isize) {
            (-1, 0) => Some(Direction::Up),
            (1, 0) => Some(Direction::Down),
            (0, -1) => Some(Direction::Left),
            (0, 1) => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Set of exposed edges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Connections(u8);

impl Connections {
    pub const NONE: Connections = Connections(0);

    pub fn of(dirs: &[Direction]) -> Self {
        dirs.iter().fold(Self::NONE, |acc, d| acc.with(*d))
    }

    pub fn with(self, dir: Direction) -> Self {
        Connections(self.0 | dir.bit())
    }

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & dir.bit() != 0
    }

    pub fn contains_all(self, other: Connections) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn rotated(self, steps: u8) -> Self {
        Direction::ALL
            .iter()
            .filter(|d| self.contains(**d))
            .fold(Self::NONE, |acc, d| acc.with(d.rotated(steps)))
    }

    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl Serialize for Connections {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    Straight,
    Elbow,
    Tee,
    Cross,
}

impl TileKind {
    /// Random fill weights: straights and elbows twice as common
    const WEIGHTED: [TileKind; 6] = [
        TileKind::Straight,
        TileKind::Straight,
        TileKind::Elbow,
        TileKind::Elbow,
        TileKind::Tee,
        TileKind::Cross,
    ];

    /// Priority when several shapes fit a path cell equally well
    const PATH_PRIORITY: [TileKind; 4] = [TileKind::Cross, TileKind::Tee, TileKind::Elbow, TileKind::Straight];

    /// Edges at rotation 0
    pub fn base(self) -> Connections {
        use Direction::*;
        match self {
            TileKind::Straight => Connections::of(&[Up, Down]),
            TileKind::Elbow => Connections::of(&[Up, Right]),
            TileKind::Tee => Connections::of(&[Up, Left, Right]),
            TileKind::Cross => Connections::of(&[Up, Right, Down, Left]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteTile {
    pub kind: TileKind,
    /// Quarter turns clockwise, 0..4
    pub rotation: u8,
}

impl RouteTile {
    pub fn new(kind: TileKind, rotation: u8) -> Self {
        Self {
            kind,
            rotation: rotation % 4,
        }
    }

    /// Always recomputed from kind and rotation
    pub fn connections(&self) -> Connections {
        self.kind.base().rotated(self.rotation)
    }

    pub fn rotate(&mut self) {
        self.rotation = (self.rotation + 1) % 4;
    }

    fn random<R: RandomSource + ?Sized>(rng: &mut R) -> Self {
        let kind = TileKind::WEIGHTED[rng.index(TileKind::WEIGHTED.len())];
        Self::new(kind, rng.index(4) as u8)
    }

    /// Smallest tile exposing every edge in `need`.
    ///
    /// Ties on edge count go to `PATH_PRIORITY` order, then lowest rotation.
    /// A cross covers any need, so it is also the fallback. This is not a
    /// first-fit scan: taking the first fitting kind in `PATH_PRIORITY` would
    /// make every path cell a cross, so the fewest-edges tile wins instead.
    pub fn covering(need: Connections) -> Self {
        let mut best: Option<RouteTile> = None;
        for kind in TileKind::PATH_PRIORITY {
            for rotation in 0..4 {
                let tile = RouteTile::new(kind, rotation);
                let conns = tile.connections();
                if !conns.contains_all(need) {
                    continue;
                }
                if best.is_none_or(|b| conns.len() < b.connections().len()) {
                    best = Some(tile);
                }
                break;
            }
        }
        best.unwrap_or(RouteTile::new(TileKind::Cross, 0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEvent {
    Generated { size: usize, path_len: usize },
    Solved { moves: u32 },
    Broken,
    Unlock(SectionKey),
}

impl fmt::Display for RouteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteEvent::Generated { size, .. } => write!(f, "> New {size}x{size} routing layout"),
            RouteEvent::Solved { .. } => write!(f, "> SIGNAL ROUTING SOLVED: Network online"),
            RouteEvent::Broken => write!(f, "> Signal lost"),
            RouteEvent::Unlock(key) => write!(f, "> Routing key accepted: {}", key),
        }
    }
}

impl EngineEvent for RouteEvent {
    fn unlock_request(&self) -> Option<SectionKey> {
        match self {
            RouteEvent::Unlock(key) => Some(*key),
            _ => None,
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, RouteEvent::Broken)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutePuzzle {
    size: usize,
    /// Row-major
    tiles: Vec<RouteTile>,
    start: Pos,
    goal: Pos,
    moves: u32,
    powered: bool,
    #[serde(skip)]
    path: Vec<Pos>,
    #[serde(skip)]
    unlock: Option<SectionKey>,
    #[serde(skip)]
    events: Vec<RouteEvent>,
}

impl RoutePuzzle {
    /// An unpowered grid of straights; call `generate` for a real layout
    pub fn new(size: usize, unlock: Option<SectionKey>) -> Self {
        let size = size.max(1);
        let mid = size / 2;
        Self {
            size,
            tiles: vec![RouteTile::new(TileKind::Straight, 0); size * size],
            start: Pos::new(mid, 0),
            goal: Pos::new(mid, size - 1),
            moves: 0,
            powered: false,
            path: Vec::new(),
            unlock,
            events: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn start(&self) -> Pos {
        self.start
    }

    pub fn goal(&self) -> Pos {
        self.goal
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// The carved path of the last generation, start to goal
    pub fn carved_path(&self) -> &[Pos] {
        &self.path
    }

    pub fn tile(&self, row: usize, col: usize) -> Option<&RouteTile> {
        self.index(Pos::new(row, col)).map(|i| &self.tiles[i])
    }

    fn index(&self, pos: Pos) -> Option<usize> {
        (pos.row < self.size && pos.col < self.size).then(|| pos.row * self.size + pos.col)
    }

    fn tile_at(&self, pos: Pos) -> RouteTile {
        self.tiles[pos.row * self.size + pos.col]
    }

    /// Player rotation. Returns whether the tile existed.
    pub fn rotate(&mut self, row: usize, col: usize) -> bool {
        let Some(i) = self.index(Pos::new(row, col)) else {
            return false;
        };
        self.tiles[i].rotate();
        self.moves += 1;
        log::debug!("route rotate ({}, {}) -> {}", row, col, self.tiles[i].rotation);

        let was = self.powered;
        self.powered = self.check_connectivity();
        if self.powered && !was {
            log::info!("Routing powered in {} moves", self.moves);
            self.events.push(RouteEvent::Solved { moves: self.moves });
            if let Some(key) = self.unlock {
                self.events.push(RouteEvent::Unlock(key));
            }
        } else if was && !self.powered {
            self.events.push(RouteEvent::Broken);
        }
        true
    }

    /// New layout: random tiles, then a pre-linked path from start to goal
    pub fn generate<R: RandomSource + ?Sized>(&mut self, size: usize, rng: &mut R) {
        let size = size.max(1);
        let mid = size / 2;
        self.size = size;
        self.start = Pos::new(mid, 0);
        self.goal = Pos::new(mid, size - 1);
        self.moves = 0;
        self.tiles = (0..size * size).map(|_| RouteTile::random(rng)).collect();

        self.path = carve_path(size, self.start, self.goal, rng);
        let len = self.path.len();
        for i in 0..len {
            let mut need = Connections::NONE;
            if i > 0 {
                if let Some(d) = Direction::between(self.path[i], self.path[i - 1]) {
                    need = need.with(d);
                }
            }
            if i + 1 < len {
                if let Some(d) = Direction::between(self.path[i], self.path[i + 1]) {
                    need = need.with(d);
                }
            }
            let pos = self.path[i];
            self.tiles[pos.row * size + pos.col] = RouteTile::covering(need);
        }

        self.powered = self.check_connectivity();
        if !self.powered {
            log::warn!("Generated routing layout is not powered");
        }
        self.events.push(RouteEvent::Generated { size, path_len: len });
    }

    /// Breadth-first search over mutually linked neighbours from `start`
    pub fn check_connectivity(&self) -> bool {
        self.powered_cells().contains(&self.goal)
    }

    /// Every cell power reaches from `start`
    pub fn powered_cells(&self) -> Vec<Pos> {
        let mut seen = vec![false; self.size * self.size];
        let mut reached = Vec::new();
        let mut queue = VecDeque::new();

        seen[self.start.row * self.size + self.start.col] = true;
        queue.push_back(self.start);

        while let Some(cur) = queue.pop_front() {
            reached.push(cur);
            let conns = self.tile_at(cur).connections();
            for dir in conns.iter() {
                let Some(next) = dir.step(cur, self.size) else {
                    continue;
                };
                let i = next.row * self.size + next.col;
                if seen[i] || !self.tile_at(next).connections().contains(dir.opposite()) {
                    continue;
                }
                seen[i] = true;
                queue.push_back(next);
            }
        }
        reached
    }

    pub fn drain_events(&mut self) -> Vec<RouteEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Random walk from `start` to `goal`, biased toward the goal column.
///
/// Steps that would leave the grid are rejected. Revisiting a cell erases the
/// loop back to it, so consecutive path cells are always adjacent and no cell
/// appears twice. After `size * size * CARVE_STEPS_PER_CELL` rolls the walk
/// finishes straight: vertically to the goal row, then right.
fn carve_path<R: RandomSource + ?Sized>(size: usize, start: Pos, goal: Pos, rng: &mut R) -> Vec<Pos> {
    let mut path = vec![start];
    let mut cur = start;
    let mut choices = Vec::with_capacity(6);
    let mut budget = size * size * CARVE_STEPS_PER_CELL;

    while cur != goal && budget > 0 {
        budget -= 1;
        choices.clear();
        if cur.col < goal.col {
            choices.extend([Direction::Right, Direction::Right]);
        }
        if cur.row < goal.row {
            choices.push(Direction::Down);
        }
        if cur.row > goal.row {
            choices.push(Direction::Up);
        }
        choices.extend([Direction::Right, Direction::Up, Direction::Down]);

        let dir = choices[rng.index(choices.len())];
        let Some(next) = dir.step(cur, size) else {
            continue;
        };
        cur = next;
        visit(&mut path, cur);
    }

    if cur != goal {
        log::debug!("Carve budget spent at {:?}, finishing straight", cur);
    }
    while cur.row != goal.row {
        cur.row = if cur.row < goal.row { cur.row + 1 } else { cur.row - 1 };
        visit(&mut path, cur);
    }
    while cur.col < goal.col {
        cur.col += 1;
        visit(&mut path, cur);
    }
    path
}

/// Append `pos`, or cut the path back to it when it closes a loop
fn visit(path: &mut Vec<Pos>, pos: Pos) {
    match path.iter().position(|p| *p == pos) {
        Some(i) => path.truncate(i + 1),
        None => path.push(pos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{ScriptedRandom, SeededRandom};
    use proptest::prelude::*;
    use Direction::*;

    fn generated(size: usize, seed: u64) -> RoutePuzzle {
        let mut puzzle = RoutePuzzle::new(size, None);
        puzzle.generate(size, &mut SeededRandom::new(seed));
        puzzle.drain_events();
        puzzle
    }

    #[test]
    fn test_rotation_maps_edges_clockwise() {
        let elbow = RouteTile::new(TileKind::Elbow, 1).connections();
        assert_eq!(elbow, Connections::of(&[Right, Down]));
        let tee = RouteTile::new(TileKind::Tee, 2).connections();
        assert_eq!(tee, Connections::of(&[Down, Right, Left]));
        let straight = RouteTile::new(TileKind::Straight, 1).connections();
        assert_eq!(straight, Connections::of(&[Left, Right]));
    }

    #[test]
    fn test_four_rotations_restore_connections() {
        for kind in TileKind::PATH_PRIORITY {
            for rotation in 0..4 {
                let mut tile = RouteTile::new(kind, rotation);
                let before = tile.connections();
                for _ in 0..4 {
                    tile.rotate();
                }
                assert_eq!(tile.connections(), before);
                assert_eq!(tile.rotation, rotation);
            }
        }
    }

    #[test]
    fn test_covering_prefers_minimal_tile() {
        assert_eq!(RouteTile::covering(Connections::of(&[Left, Right])), RouteTile::new(TileKind::Straight, 1));
        assert_eq!(RouteTile::covering(Connections::of(&[Left, Down])), RouteTile::new(TileKind::Elbow, 2));
        assert_eq!(RouteTile::covering(Connections::of(&[Up, Left, Down])), RouteTile::new(TileKind::Tee, 3));
        assert_eq!(
            RouteTile::covering(Connections::of(&[Up, Right, Down, Left])),
            RouteTile::new(TileKind::Cross, 0)
        );
    }

    #[test]
    fn test_covering_tie_break_is_fixed() {
        // A single edge fits both an elbow and a straight; the elbow ranks first
        assert_eq!(RouteTile::covering(Connections::of(&[Up])), RouteTile::new(TileKind::Elbow, 0));
        assert_eq!(RouteTile::covering(Connections::of(&[Down])), RouteTile::new(TileKind::Elbow, 1));
        assert_eq!(RouteTile::covering(Connections::NONE), RouteTile::new(TileKind::Elbow, 0));
    }

    #[test]
    fn test_generated_six_by_six_is_powered() {
        for seed in 0..64 {
            let puzzle = generated(6, seed);
            assert_eq!(puzzle.start(), Pos::new(3, 0));
            assert_eq!(puzzle.goal(), Pos::new(3, 5));
            assert!(puzzle.check_connectivity(), "seed {}", seed);
            assert!(puzzle.is_powered());
            assert_eq!(puzzle.moves(), 0);
        }
    }

    #[test]
    fn test_carved_path_is_simple_and_adjacent() {
        let puzzle = generated(8, 12345);
        let path = puzzle.carved_path();
        assert_eq!(path.first(), Some(&puzzle.start()));
        assert_eq!(path.last(), Some(&puzzle.goal()));
        for pair in path.windows(2) {
            assert!(Direction::between(pair[0], pair[1]).is_some());
        }
        for (i, p) in path.iter().enumerate() {
            assert!(!path[i + 1..].contains(p));
        }
    }

    #[test]
    fn test_degenerate_rng_still_terminates() {
        // A constant high roll always picks Down, which the bottom row rejects
        let mut puzzle = RoutePuzzle::new(6, None);
        puzzle.generate(6, &mut ScriptedRandom::constant(0.99));
        let path = puzzle.carved_path();
        assert_eq!(path, (0..6).map(|col| Pos::new(3, col)).collect::<Vec<_>>());
        assert!(puzzle.check_connectivity());

        let mut puzzle = RoutePuzzle::new(6, None);
        puzzle.generate(6, &mut ScriptedRandom::constant(0.0));
        assert!(puzzle.check_connectivity());
    }

    #[test]
    fn test_rotation_out_of_bounds_is_noop() {
        let mut puzzle = generated(6, 5);
        assert!(!puzzle.rotate(6, 0));
        assert_eq!(puzzle.moves(), 0);
    }

    #[test]
    fn test_breaking_and_restoring_path() {
        let mut puzzle = RoutePuzzle::new(3, Some(SectionKey::Tokenomics));
        for col in 0..3 {
            puzzle.tiles[3 + col] = RouteTile::new(TileKind::Straight, 1);
        }
        puzzle.powered = puzzle.check_connectivity();
        assert!(puzzle.is_powered());

        puzzle.rotate(1, 1);
        assert!(!puzzle.is_powered());
        assert_eq!(puzzle.drain_events(), [RouteEvent::Broken]);

        // a straight is symmetric, so the next quarter turn already relinks it
        puzzle.rotate(1, 1);
        assert!(puzzle.is_powered());
        assert_eq!(puzzle.moves(), 2);
        assert_eq!(
            puzzle.drain_events(),
            [RouteEvent::Solved { moves: 2 }, RouteEvent::Unlock(SectionKey::Tokenomics)]
        );
    }

    #[test]
    fn test_one_sided_link_does_not_conduct() {
        let mut puzzle = RoutePuzzle::new(2, None);
        // start (1,0) faces right, goal (1,1) faces up/down only
        puzzle.tiles[2] = RouteTile::new(TileKind::Straight, 1);
        puzzle.tiles[3] = RouteTile::new(TileKind::Straight, 0);
        assert!(!puzzle.check_connectivity());
        assert_eq!(puzzle.powered_cells(), [Pos::new(1, 0)]);
    }

    #[test]
    fn test_single_cell_grid() {
        let mut puzzle = RoutePuzzle::new(1, None);
        puzzle.generate(1, &mut ScriptedRandom::constant(0.3));
        assert_eq!(puzzle.start(), puzzle.goal());
        assert!(puzzle.is_powered());
    }

    proptest! {
        #[test]
        fn prop_generated_layouts_are_powered(size in 1usize..10, seed in any::<u64>()) {
            let puzzle = generated(size, seed);
            prop_assert!(puzzle.check_connectivity());
        }

        #[test]
        fn prop_rotation_cycle(kind_idx in 0usize..4, rotation in 0u8..4) {
            let tile = RouteTile::new(TileKind::PATH_PRIORITY[kind_idx], rotation);
            prop_assert_eq!(tile.connections().rotated(4), tile.connections());
            prop_assert_eq!(tile.connections().len(), tile.kind.base().len());
        }
    }
}
