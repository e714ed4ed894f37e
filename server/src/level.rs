//! Procedural level generation.
//!
//! A level is carved out of a solid wall grid in four passes:
//! 1. Rooms: random non-overlapping rectangles (one tile of wall between any two).
//! 2. Corridors: greedy nearest-neighbour spanning connection of every room with
//!    L-shaped corridors, carved through wall only.
//! 3. Doors: a bounded number of single-tile chokepoints become electronic or
//!    physical doors.
//! 4. Entities: start, exit, loot, pads, panels, cameras, hazards and safes are
//!    drawn without replacement from the remaining floor tiles, then guards get
//!    patrol routes inside their home rooms.
//!
//! The random source is not seeded, so tests assert invariants rather than layouts.
//! Rooms only steer placement and are dropped once the layout is built.

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Direction, Grid, Position, Tile, GRID_HEIGHT, GRID_WIDTH, PRIMARY_LOOT_COUNT};

const ROOM_ATTEMPTS: u32 = 300;
const ROOM_MIN_W: i32 = 4;
const ROOM_MAX_W: i32 = 9;
const ROOM_MIN_H: i32 = 4;
const ROOM_MAX_H: i32 = 7;
const DOOR_PROBABILITY: f64 = 0.5;
const CHARGING_PADS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl RoomRect {
    pub fn center(&self) -> Position {
        Position::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.x && pos.x < self.x + self.w && pos.y >= self.y && pos.y < self.y + self.h
    }

    /// Inside the room and not on its outer ring.
    pub fn contains_interior(&self, pos: Position) -> bool {
        pos.x > self.x && pos.x < self.x + self.w - 1 && pos.y > self.y && pos.y < self.y + self.h - 1
    }

    pub fn overlaps(&self, other: &RoomRect, buffer: i32) -> bool {
        self.x - buffer < other.x + other.w
            && other.x < self.x + self.w + buffer
            && self.y - buffer < other.y + other.h
            && other.y < self.y + self.h + buffer
    }

    fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (self.y..self.y + self.h).flat_map(move |y| (self.x..self.x + self.w).map(move |x| Position::new(x, y)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardSpawn {
    pub route: Vec<Position>,
    pub facing: Direction,
    pub move_period_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaserSpawn {
    pub position: Position,
    pub horizontal: bool,
    pub period_ms: u64,
    pub phase_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSpawn {
    pub position: Position,
    pub facing: Direction,
}

/// Immutable output of the generator.
///
/// Doors, loot, charging pads, alarm panels, tripwires and safes are encoded in
/// `grid`. Cameras and lasers carry extra attributes and are listed separately
/// (their tiles are marked in the grid too).
#[derive(Debug, Clone)]
pub struct LevelLayout {
    pub level: u32,
    pub grid: Grid,
    pub start: Position,
    pub exit: Position,
    pub guards: Vec<GuardSpawn>,
    pub cameras: Vec<CameraSpawn>,
    pub lasers: Vec<LaserSpawn>,
}

/// Generates a level using the thread-local random source.
pub fn generate(level: u32) -> LevelLayout {
    generate_with_rng(level, &mut rand::thread_rng())
}

pub fn generate_with_rng<R: Rng + ?Sized>(level: u32, rng: &mut R) -> LevelLayout {
    let level = level.max(1);
    let mut grid = Grid::filled(GRID_WIDTH, GRID_HEIGHT, Tile::Wall);

    let rooms = place_rooms(&mut grid, level, rng);
    connect_rooms(&mut grid, &rooms);
    place_doors(&mut grid, level, rng);

    let mut pool = FloorPool::new(&grid, rng);
    let first_room = rooms[0];
    let last_room = rooms[rooms.len() - 1];

    let start = pool
        .take_where(|p| first_room.contains(p))
        .or_else(|| pool.take())
        .unwrap_or_else(|| first_room.center());

    let exit = pool
        .take_where(|p| last_room.contains(p) && p != start)
        .or_else(|| pool.take())
        .or_else(|| any_floor_except(&grid, start))
        .unwrap_or_else(|| last_room.center());
    grid.set(exit, Tile::Exit);

    for _ in 0..PRIMARY_LOOT_COUNT {
        let spot = pool
            .take_where(|p| !first_room.contains(p))
            .or_else(|| pool.take());
        if let Some(pos) = spot {
            grid.set(pos, Tile::LootPrimary);
        }
    }

    let bonus_count = rng.gen_range(1..=(1 + level).min(4));
    pool.scatter(&mut grid, Tile::LootBonus, bonus_count);
    pool.scatter(&mut grid, Tile::ChargingPad, CHARGING_PADS);
    pool.scatter(&mut grid, Tile::AlarmPanel, 1 + level / 2);

    let mut cameras = Vec::new();
    for _ in 0..level.min(5) {
        let Some(position) = pool.take() else { break };
        grid.set(position, Tile::Camera);
        cameras.push(CameraSpawn {
            position,
            facing: random_direction(rng),
        });
    }

    let mut lasers = Vec::new();
    if level >= 2 {
        let count = (level - 1).min(4);
        for _ in 0..count {
            let spot = pool
                .take_where(|p| corridor_axis(&grid, p).is_some())
                .or_else(|| pool.take());
            let Some(position) = spot else { break };
            let horizontal = match corridor_axis(&grid, position) {
                Some(axis) => axis,
                None => rng.gen_bool(0.5),
            };
            let period_ms = rng.gen_range(2_000..=3_000);
            grid.set(position, Tile::Laser);
            lasers.push(LaserSpawn {
                position,
                horizontal,
                period_ms,
                phase_ms: rng.gen_range(0..period_ms),
            });
        }
        pool.scatter(&mut grid, Tile::Tripwire, count);
    }

    if level >= 3 {
        let count = (1 + (level - 3) / 2).min(2);
        for _ in 0..count {
            let spot = pool.take_where(|p| rooms.iter().any(|r| r.contains_interior(p)));
            match spot {
                Some(pos) => grid.set(pos, Tile::Safe),
                None => break,
            }
        }
    }

    let guards = place_guards(&grid, &rooms, level, start, rng);

    debug!(
        "Generated level {}: {} rooms, {} guards, {} cameras, {} lasers",
        level,
        rooms.len(),
        guards.len(),
        cameras.len(),
        lasers.len()
    );

    LevelLayout {
        level,
        grid,
        start,
        exit,
        guards,
        cameras,
        lasers,
    }
}

/// Base guard step period for a level. Higher levels move faster.
pub fn guard_move_period_ms(level: u32) -> u64 {
    700u64.saturating_sub(60 * u64::from(level.max(1) - 1)).max(250)
}

fn place_rooms<R: Rng + ?Sized>(grid: &mut Grid, level: u32, rng: &mut R) -> Vec<RoomRect> {
    let target = (6 + level as usize).min(12);
    let mut rooms: Vec<RoomRect> = Vec::new();
    let mut attempts = 0;

    while rooms.len() < target && attempts < ROOM_ATTEMPTS {
        attempts += 1;
        let w = rng.gen_range(ROOM_MIN_W..=ROOM_MAX_W);
        let h = rng.gen_range(ROOM_MIN_H..=ROOM_MAX_H);
        let candidate = RoomRect {
            x: rng.gen_range(1..=grid.width() - w - 1),
            y: rng.gen_range(1..=grid.height() - h - 1),
            w,
            h,
        };
        if rooms.iter().any(|r| r.overlaps(&candidate, 1)) {
            continue;
        }
        rooms.push(candidate);
    }

    if rooms.is_empty() {
        rooms.push(RoomRect {
            x: 1,
            y: 1,
            w: ROOM_MIN_W + 2,
            h: ROOM_MIN_H + 1,
        });
    }

    for room in &rooms {
        for pos in room.positions() {
            grid.set(pos, Tile::Floor);
        }
    }
    rooms
}

/// Greedy spanning connection: always link the closest unconnected room
/// (Manhattan distance between centres) to any already connected room.
fn connect_rooms(grid: &mut Grid, rooms: &[RoomRect]) {
    let mut connected = vec![0usize];
    let mut remaining: Vec<usize> = (1..rooms.len()).collect();

    while !remaining.is_empty() {
        let mut best: Option<(i32, usize, usize)> = None;
        for &c in &connected {
            for (slot, &r) in remaining.iter().enumerate() {
                let distance = rooms[c].center().manhattan(rooms[r].center());
                if best.map_or(true, |(d, _, _)| distance < d) {
                    best = Some((distance, c, slot));
                }
            }
        }
        let Some((_, from, slot)) = best else { break };
        let to = remaining.swap_remove(slot);
        carve_corridor(grid, rooms[from].center(), rooms[to].center());
        connected.push(to);
    }
}

/// Horizontal run along `from.y`, then vertical run along `to.x`.
fn carve_corridor(grid: &mut Grid, from: Position, to: Position) {
    let (x0, x1) = (from.x.min(to.x), from.x.max(to.x));
    for x in x0..=x1 {
        carve(grid, Position::new(x, from.y));
    }
    let (y0, y1) = (from.y.min(to.y), from.y.max(to.y));
    for y in y0..=y1 {
        carve(grid, Position::new(to.x, y));
    }
}

fn carve(grid: &mut Grid, pos: Position) {
    if grid.get(pos) == Tile::Wall && grid.in_bounds(pos) {
        grid.set(pos, Tile::Floor);
    }
}

/// A floor tile open along exactly one axis and walled along the other.
pub fn is_chokepoint(grid: &Grid, pos: Position) -> bool {
    grid.get(pos) == Tile::Floor && corridor_axis(grid, pos).is_some()
}

/// `Some(true)` when walls sit left and right and both ends above and
/// below are open (a vertical passage, so a horizontal beam spans it),
/// `Some(false)` for the mirrored case. Dead ends are neither.
fn corridor_axis(grid: &Grid, pos: Position) -> Option<bool> {
    let wall = |dx: i32, dy: i32| grid.get(pos.offset(dx, dy)) == Tile::Wall;
    let vertical_passage = wall(-1, 0) && wall(1, 0) && !wall(0, -1) && !wall(0, 1);
    let horizontal_passage = wall(0, -1) && wall(0, 1) && !wall(-1, 0) && !wall(1, 0);
    match (vertical_passage, horizontal_passage) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

fn place_doors<R: Rng + ?Sized>(grid: &mut Grid, level: u32, rng: &mut R) {
    let cap = (1 + level / 2).min(4);
    let mut electronic = 0;
    let mut physical = 0;

    let mut candidates: Vec<Position> = grid.positions().filter(|p| is_chokepoint(grid, *p)).collect();
    candidates.shuffle(rng);

    for pos in candidates {
        if electronic >= cap && physical >= cap {
            break;
        }
        if !rng.gen_bool(DOOR_PROBABILITY) {
            continue;
        }
        if pos.neighbors().iter().any(|n| grid.get(*n).is_door()) {
            continue;
        }
        let want_electronic = rng.gen_bool(0.5);
        let tile = match (want_electronic, electronic < cap, physical < cap) {
            (true, true, _) | (false, true, false) => Tile::DoorElectronic,
            _ => Tile::DoorPhysical,
        };
        if tile == Tile::DoorElectronic {
            electronic += 1;
        } else {
            physical += 1;
        }
        grid.set(pos, tile);
    }
}

fn place_guards<R: Rng + ?Sized>(
    grid: &Grid,
    rooms: &[RoomRect],
    level: u32,
    start: Position,
    rng: &mut R,
) -> Vec<GuardSpawn> {
    let count = (1 + level as usize).min(8);
    let period = guard_move_period_ms(level);
    let mut guards = Vec::with_capacity(count);

    for i in 0..count {
        let home = rooms[(i + 1) % rooms.len()];
        let mut tiles: Vec<Position> = home
            .positions()
            .filter(|p| grid.get(*p) != Tile::Safe && !grid.get(*p).is_door())
            .collect();
        tiles.shuffle(rng);
        // Never spawn on top of the thief.
        if let Some(idx) = tiles.iter().position(|p| *p != start) {
            tiles.swap(0, idx);
        }
        let waypoints = rng.gen_range(3..=5).min(tiles.len());
        let route: Vec<Position> = tiles.into_iter().take(waypoints).collect();
        if route.is_empty() {
            continue;
        }
        guards.push(GuardSpawn {
            route,
            facing: random_direction(rng),
            move_period_ms: period,
        });
    }
    guards
}

fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Direction {
    Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
}

fn any_floor_except(grid: &Grid, except: Position) -> Option<Position> {
    grid.positions().find(|p| grid.get(*p) == Tile::Floor && *p != except)
}

/// Shuffled bag of untouched floor tiles; entities are drawn without replacement.
struct FloorPool {
    tiles: Vec<Position>,
}

impl FloorPool {
    fn new<R: Rng + ?Sized>(grid: &Grid, rng: &mut R) -> Self {
        let mut tiles: Vec<Position> = grid.positions().filter(|p| grid.get(*p) == Tile::Floor).collect();
        tiles.shuffle(rng);
        Self { tiles }
    }

    fn take(&mut self) -> Option<Position> {
        self.tiles.pop()
    }

    fn take_where<F: Fn(Position) -> bool>(&mut self, pred: F) -> Option<Position> {
        let idx = self.tiles.iter().rposition(|p| pred(*p))?;
        Some(self.tiles.swap_remove(idx))
    }

    fn scatter(&mut self, grid: &mut Grid, tile: Tile, count: u32) {
        for _ in 0..count {
            match self.take() {
                Some(pos) => grid.set(pos, tile),
                None => break,
            }
        }
    }
}
