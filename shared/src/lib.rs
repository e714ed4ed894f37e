use serde::{Deserialize, Serialize};

pub mod protocol;

pub use protocol::*;

pub const GRID_WIDTH: i32 = 40;
pub const GRID_HEIGHT: i32 = 30;

pub const THIEF_MAX_HP: u32 = 3;
pub const THIEF_VISION_RADIUS: u32 = 4;
pub const INVULNERABILITY_MS: u64 = 1_500;
pub const PICK_SPEED_MS: u64 = 3_000;
pub const MIN_PICK_SPEED_MS: u64 = 1_000;
pub const SPRINT_DURATION_MS: u64 = 2_000;
pub const SPRINT_COOLDOWN_MS: u64 = 5_000;
pub const NOISE_CHARGES: u32 = 2;
pub const SMOKE_CHARGES: u32 = 1;
pub const NOISE_THROW_RANGE: i32 = 5;
pub const NOISE_DURATION_MS: u64 = 4_000;
pub const SMOKE_DURATION_MS: u64 = 5_000;
pub const SMOKE_RADIUS: i32 = 1;

pub const DRONE_MAX_BATTERY: f32 = 100.0;
pub const HACK_COST: f32 = 20.0;
pub const MIN_HACK_COST: f32 = 5.0;
pub const BATTERY_DRAIN_PER_SEC: f32 = 0.5;
pub const BATTERY_CHARGE_PER_SEC: f32 = 15.0;
pub const EMP_CHARGES: u32 = 1;
pub const DECOY_CHARGES: u32 = 1;
pub const EMP_CAMERA_RADIUS: i32 = 4;
pub const EMP_GUARD_RADIUS: i32 = 3;
pub const EMP_DURATION_MS: u64 = 5_000;
pub const DECOY_DURATION_MS: u64 = 5_000;
pub const PING_DURATION_MS: u64 = 3_000;
pub const HACK_FREEZE_MS: u64 = 5_000;

pub const GUARD_ALERT_MS: u64 = 10_000;
pub const GUARD_VISION_RANGE: i32 = 4;
pub const GUARD_ALERT_VISION_RANGE: i32 = 6;
pub const NOISE_PERCEPTION_RADIUS: i32 = 8;
pub const SPRINT_PERCEPTION_RADIUS: i32 = 4;
pub const DECOY_PERCEPTION_RADIUS: i32 = 5;
pub const CAMERA_VISION_RANGE: i32 = 3;
pub const CAMERA_ROTATE_MS: u64 = 3_000;

pub const ALARM_DURATION_MS: u64 = 15_000;
pub const SIREN_PERIOD_MS: u64 = 1_000;

pub const PRIMARY_LOOT_COUNT: u32 = 3;
pub const PRIMARY_LOOT_POINTS: u64 = 1_000;
pub const BONUS_LOOT_POINTS: u64 = 500;
pub const TIME_BONUS_MAX: u64 = 3_000;
pub const TIME_BONUS_PER_SEC: u64 = 10;
pub const STEALTH_BONUS: u64 = 2_000;
pub const OBJECTIVE_BONUS: u64 = 1_000;
pub const SAFE_VALUE: u64 = 1_500;

pub const CHAT_MAX_LEN: usize = 200;
pub const ROOM_CODE_LEN: usize = 4;

/// Integer tile coordinate. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }

    pub fn step(&self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }

    pub fn manhattan(&self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn chebyshev(&self, other: Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// True when `other` is one of the four orthogonal neighbours.
    pub fn is_adjacent(&self, other: Position) -> bool {
        self.manhattan(other) == 1
    }

    pub fn neighbors(&self) -> [Position; 4] {
        Direction::ALL.map(|d| self.step(d))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    pub fn clockwise(&self) -> Direction {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    pub fn perpendicular(&self) -> [Direction; 2] {
        match self {
            Direction::Up | Direction::Down => [Direction::Left, Direction::Right],
            Direction::Left | Direction::Right => [Direction::Up, Direction::Down],
        }
    }

    /// Maps a unit step to a direction. Diagonal or zero deltas have none.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Some(Direction::Up),
            (1, 0) => Some(Direction::Right),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Thief,
    Drone,
}

impl Role {
    pub fn partner(&self) -> Role {
        match self {
            Role::Thief => Role::Drone,
            Role::Drone => Role::Thief,
        }
    }

    pub fn slot_index(&self) -> usize {
        match self {
            Role::Thief => 0,
            Role::Drone => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tile {
    Wall,
    Floor,
    Exit,
    DoorElectronic,
    DoorPhysical,
    LootPrimary,
    LootBonus,
    ChargingPad,
    AlarmPanel,
    Camera,
    Laser,
    Tripwire,
    Safe,
}

impl Tile {
    /// Single-character encoding used for the snapshot grid rows.
    pub fn glyph(&self) -> char {
        match self {
            Tile::Wall => '#',
            Tile::Floor => '.',
            Tile::Exit => 'X',
            Tile::DoorElectronic => 'E',
            Tile::DoorPhysical => 'P',
            Tile::LootPrimary => '$',
            Tile::LootBonus => '*',
            Tile::ChargingPad => 'C',
            Tile::AlarmPanel => 'A',
            Tile::Camera => 'V',
            Tile::Laser => 'L',
            Tile::Tripwire => 'T',
            Tile::Safe => 'S',
        }
    }

    pub fn from_glyph(glyph: char) -> Option<Tile> {
        let tile = match glyph {
            '#' => Tile::Wall,
            '.' => Tile::Floor,
            'X' => Tile::Exit,
            'E' => Tile::DoorElectronic,
            'P' => Tile::DoorPhysical,
            '$' => Tile::LootPrimary,
            '*' => Tile::LootBonus,
            'C' => Tile::ChargingPad,
            'A' => Tile::AlarmPanel,
            'V' => Tile::Camera,
            'L' => Tile::Laser,
            'T' => Tile::Tripwire,
            'S' => Tile::Safe,
            _ => return None,
        };
        Some(tile)
    }

    pub fn is_door(&self) -> bool {
        matches!(self, Tile::DoorElectronic | Tile::DoorPhysical)
    }
}

/// Fixed-size tile grid. Reads outside the bounds return `Tile::Wall`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl Grid {
    pub fn filled(width: i32, height: i32, tile: Tile) -> Self {
        Self {
            width,
            height,
            tiles: vec![tile; (width.max(0) * height.max(0)) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn get(&self, pos: Position) -> Tile {
        if self.in_bounds(pos) {
            self.tiles[(pos.y * self.width + pos.x) as usize]
        } else {
            Tile::Wall
        }
    }

    pub fn set(&mut self, pos: Position, tile: Tile) {
        if self.in_bounds(pos) {
            self.tiles[(pos.y * self.width + pos.x) as usize] = tile;
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Position::new(x, y)))
    }

    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|t| **t == tile).count()
    }

    pub fn rows(&self) -> Vec<String> {
        self.tiles
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().map(Tile::glyph).collect())
            .collect()
    }

    /// Rebuilds a grid from glyph rows. Returns `None` on ragged rows or unknown glyphs.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Option<Grid> {
        let height = rows.len() as i32;
        let width = rows.first().map(|r| r.as_ref().chars().count()).unwrap_or(0) as i32;
        let mut tiles = Vec::with_capacity((width * height) as usize);
        for row in rows {
            let row = row.as_ref();
            if row.chars().count() as i32 != width {
                return None;
            }
            for glyph in row.chars() {
                tiles.push(Tile::from_glyph(glyph)?);
            }
        }
        Some(Grid {
            width,
            height,
            tiles,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Patrol,
    Suspicious,
    Alert,
}

impl AlertLevel {
    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Patrol => 0,
            AlertLevel::Suspicious => 1,
            AlertLevel::Alert => 2,
        }
    }
}
