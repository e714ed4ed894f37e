//! Mutable model of one active level: both avatars, guards, hazards, doors,
//! loot, the alarm and the objectives. One `WorldState` exists per running room
//! and is replaced wholesale when the room advances to the next level.
//!
//! The simulation rules live in `game.rs` and `guard_ai.rs`; this module only
//! holds the data, the tile queries they share, and the snapshot projection.

use crate::level::{self, LevelLayout};
use crate::objectives::{draw_objectives, Objective};
use crate::upgrades::Loadout;
use shared::{
    ActionLabel, AlarmView, AlertLevel, CameraView, Direction, DoorView, DroneView, Grid,
    GuardView, LaserView, LootView, MarkerView, Outcome, Position, SafeView, Shake, Snapshot,
    SoundCue, ThiefView, Tile, TripwireView, SAFE_VALUE, SMOKE_RADIUS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPick {
    pub door: usize,
    pub progress_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Thief {
    pub position: Position,
    pub facing: Direction,
    pub hp: u32,
    pub max_hp: u32,
    pub primary_loot: u32,
    pub bonus_loot: u32,
    pub action: ActionLabel,
    pub action_ms: u64,
    pub invulnerable_ms: u64,
    pub picking: Option<LockPick>,
    pub pick_speed_ms: u64,
    pub sprint_ms: u64,
    pub sprint_cooldown_ms: u64,
    pub noise_charges: u32,
    pub smoke_charges: u32,
    pub vision_radius: u32,
    pub locks_picked: u32,
    pub damage_taken: u32,
}

impl Thief {
    fn new(position: Position, loadout: &Loadout) -> Self {
        Self {
            position,
            facing: Direction::Down,
            hp: loadout.max_hp,
            max_hp: loadout.max_hp,
            primary_loot: 0,
            bonus_loot: 0,
            action: ActionLabel::Idle,
            action_ms: 0,
            invulnerable_ms: 0,
            picking: None,
            pick_speed_ms: loadout.pick_speed_ms,
            sprint_ms: 0,
            sprint_cooldown_ms: 0,
            noise_charges: loadout.noise_charges,
            smoke_charges: loadout.smoke_charges,
            vision_radius: loadout.vision_radius,
            locks_picked: 0,
            damage_taken: 0,
        }
    }

    pub fn is_sprinting(&self) -> bool {
        self.sprint_ms > 0
    }

    /// Label shown to clients. Ongoing states win over the last one-shot action.
    pub fn action_label(&self) -> ActionLabel {
        if self.picking.is_some() {
            ActionLabel::Picking
        } else if self.action_ms > 0 {
            self.action
        } else if self.is_sprinting() {
            ActionLabel::Sprinting
        } else {
            ActionLabel::Idle
        }
    }
}

#[derive(Debug, Clone)]
pub struct Drone {
    pub position: Position,
    pub battery: f32,
    pub max_battery: f32,
    pub charging: bool,
    pub hack_cost: f32,
    pub emp_charges: u32,
    pub decoy_charges: u32,
    pub hacks: u32,
}

impl Drone {
    fn new(position: Position, loadout: &Loadout) -> Self {
        Self {
            position,
            battery: loadout.max_battery,
            max_battery: loadout.max_battery,
            charging: false,
            hack_cost: loadout.hack_cost,
            emp_charges: loadout.emp_charges,
            decoy_charges: loadout.decoy_charges,
            hacks: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Guard {
    pub position: Position,
    pub route: Vec<Position>,
    pub route_index: usize,
    pub facing: Direction,
    pub alert_level: AlertLevel,
    pub alert_ms: u64,
    pub frozen_ms: u64,
    pub last_known: Option<Position>,
    pub investigate: Option<Position>,
    pub base_period_ms: u64,
    pub move_timer_ms: u64,
}

impl Guard {
    pub fn new(route: Vec<Position>, facing: Direction, base_period_ms: u64) -> Self {
        let position = route.first().copied().unwrap_or_default();
        Self {
            position,
            route_index: if route.len() > 1 { 1 } else { 0 },
            route,
            facing,
            alert_level: AlertLevel::Patrol,
            alert_ms: 0,
            frozen_ms: 0,
            last_known: None,
            investigate: None,
            base_period_ms,
            move_timer_ms: 0,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_ms > 0
    }

    /// Step interval at the current alert level. Alerted guards move faster.
    pub fn move_interval_ms(&self) -> u64 {
        match self.alert_level {
            AlertLevel::Patrol => self.base_period_ms,
            AlertLevel::Suspicious => self.base_period_ms * 3 / 4,
            AlertLevel::Alert => self.base_period_ms / 2,
        }
        .max(1)
    }

    /// Back to patrol with no remembered targets.
    pub fn calm_down(&mut self) {
        self.alert_level = AlertLevel::Patrol;
        self.alert_ms = 0;
        self.last_known = None;
        self.investigate = None;
    }

    pub fn freeze(&mut self, duration_ms: u64) {
        self.frozen_ms = duration_ms;
        self.move_timer_ms = 0;
        self.calm_down();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Door {
    pub position: Position,
    pub electronic: bool,
    pub open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootItem {
    pub position: Position,
    pub primary: bool,
    pub collected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Camera {
    pub position: Position,
    pub facing: Direction,
    pub active: bool,
    /// Remaining EMP downtime. Zero while inactive means hacked for good.
    pub disabled_ms: u64,
    pub rotate_timer_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Laser {
    pub position: Position,
    pub horizontal: bool,
    pub period_ms: u64,
    pub phase_ms: u64,
    pub active: bool,
}

impl Laser {
    /// On during the first half of each period, offset by the phase.
    pub fn is_on_at(&self, elapsed_ms: u64) -> bool {
        let period = self.period_ms.max(2);
        (elapsed_ms + self.phase_ms) % period < period / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tripwire {
    pub position: Position,
    pub triggered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Safe {
    pub position: Position,
    pub open: bool,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub position: Position,
    pub remaining_ms: u64,
}

impl Marker {
    pub fn new(position: Position, remaining_ms: u64) -> Self {
        Self {
            position,
            remaining_ms,
        }
    }

    fn view(&self) -> MarkerView {
        MarkerView {
            position: self.position,
            remaining_ms: self.remaining_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alarm {
    pub active: bool,
    pub remaining_ms: u64,
    pub ever_triggered: bool,
}

/// One-shot cues produced by intents and ticks, drained by each broadcast.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    sounds: Vec<SoundCue>,
    shakes: Vec<Shake>,
}

impl EventBuffer {
    pub fn sound(&mut self, cue: SoundCue) {
        self.sounds.push(cue);
    }

    pub fn shake(&mut self, intensity: f32, duration_ms: u64) {
        self.shakes.push(Shake {
            intensity,
            duration_ms,
        });
    }

    pub fn sounds(&self) -> &[SoundCue] {
        &self.sounds
    }

    pub fn shakes(&self) -> &[Shake] {
        &self.shakes
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty() && self.shakes.is_empty()
    }

    pub fn drain(&mut self) -> (Vec<SoundCue>, Vec<Shake>) {
        (
            std::mem::take(&mut self.sounds),
            std::mem::take(&mut self.shakes),
        )
    }
}

#[derive(Debug, Clone)]
pub struct WorldState {
    pub level: u32,
    pub grid: Grid,
    pub exit: Position,
    pub exit_unlocked: bool,
    pub primary_loot_total: u32,
    pub thief: Thief,
    pub drone: Drone,
    pub guards: Vec<Guard>,
    pub cameras: Vec<Camera>,
    pub doors: Vec<Door>,
    pub loot: Vec<LootItem>,
    pub lasers: Vec<Laser>,
    pub tripwires: Vec<Tripwire>,
    pub safes: Vec<Safe>,
    pub noise_makers: Vec<Marker>,
    pub smoke_clouds: Vec<Marker>,
    pub decoys: Vec<Marker>,
    pub ping: Option<Marker>,
    pub alarm: Alarm,
    pub objectives: Vec<Objective>,
    pub elapsed_ms: u64,
    pub outcome: Outcome,
    pub level_score: u64,
    pub safe_score: u64,
    pub events: EventBuffer,
}

impl WorldState {
    /// Generates a fresh level and draws its objectives.
    pub fn from_level(level: u32, loadout: &Loadout) -> Self {
        let layout = level::generate(level);
        let has_safes = layout.grid.count(Tile::Safe) > 0;
        let objectives = draw_objectives(has_safes, &mut rand::thread_rng());
        Self::from_layout(layout, loadout, objectives)
    }

    pub fn from_layout(layout: LevelLayout, loadout: &Loadout, objectives: Vec<Objective>) -> Self {
        let grid = layout.grid;
        let mut doors = Vec::new();
        let mut loot = Vec::new();
        let mut tripwires = Vec::new();
        let mut safes = Vec::new();

        for pos in grid.positions() {
            match grid.get(pos) {
                Tile::DoorElectronic | Tile::DoorPhysical => doors.push(Door {
                    position: pos,
                    electronic: grid.get(pos) == Tile::DoorElectronic,
                    open: false,
                }),
                Tile::LootPrimary | Tile::LootBonus => loot.push(LootItem {
                    position: pos,
                    primary: grid.get(pos) == Tile::LootPrimary,
                    collected: false,
                }),
                Tile::Tripwire => tripwires.push(Tripwire {
                    position: pos,
                    triggered: false,
                }),
                Tile::Safe => safes.push(Safe {
                    position: pos,
                    open: false,
                    value: SAFE_VALUE,
                }),
                _ => {}
            }
        }

        let guards = layout
            .guards
            .into_iter()
            .map(|g| Guard::new(g.route, g.facing, g.move_period_ms))
            .collect();
        let cameras = layout
            .cameras
            .into_iter()
            .map(|c| Camera {
                position: c.position,
                facing: c.facing,
                active: true,
                disabled_ms: 0,
                rotate_timer_ms: 0,
            })
            .collect();
        let lasers = layout
            .lasers
            .into_iter()
            .map(|l| Laser {
                position: l.position,
                horizontal: l.horizontal,
                period_ms: l.period_ms,
                phase_ms: l.phase_ms,
                active: false,
            })
            .map(|mut l| {
                l.active = l.is_on_at(0);
                l
            })
            .collect();

        let primary_loot_total = loot.iter().filter(|l| l.primary).count() as u32;

        Self {
            level: layout.level,
            grid,
            exit: layout.exit,
            exit_unlocked: primary_loot_total == 0,
            primary_loot_total,
            thief: Thief::new(layout.start, loadout),
            drone: Drone::new(layout.start, loadout),
            guards,
            cameras,
            doors,
            loot,
            lasers,
            tripwires,
            safes,
            noise_makers: Vec::new(),
            smoke_clouds: Vec::new(),
            decoys: Vec::new(),
            ping: None,
            alarm: Alarm::default(),
            objectives,
            elapsed_ms: 0,
            outcome: Outcome::Playing,
            level_score: 0,
            safe_score: 0,
            events: EventBuffer::default(),
        }
    }

    pub fn is_over(&self) -> bool {
        self.outcome != Outcome::Playing
    }

    pub fn door_at(&self, pos: Position) -> Option<usize> {
        self.doors.iter().position(|d| d.position == pos)
    }

    pub fn safe_at(&self, pos: Position) -> Option<usize> {
        self.safes.iter().position(|s| s.position == pos)
    }

    fn is_closed_door(&self, pos: Position) -> bool {
        self.door_at(pos).map_or(false, |i| !self.doors[i].open)
    }

    fn is_closed_safe(&self, pos: Position) -> bool {
        self.safe_at(pos).map_or(false, |i| !self.safes[i].open)
    }

    /// Walls, closed doors and unopened safes stop both movement and sight.
    pub fn is_solid(&self, pos: Position) -> bool {
        self.grid.get(pos) == Tile::Wall || self.is_closed_door(pos) || self.is_closed_safe(pos)
    }

    pub fn is_walkable(&self, pos: Position) -> bool {
        self.grid.in_bounds(pos) && !self.is_solid(pos)
    }

    pub fn is_smoky(&self, pos: Position) -> bool {
        self.smoke_clouds
            .iter()
            .any(|s| s.position.chebyshev(pos) <= SMOKE_RADIUS)
    }

    pub fn blocks_vision(&self, pos: Position) -> bool {
        self.is_solid(pos) || self.is_smoky(pos)
    }

    /// Builds the broadcast snapshot and drains the one-shot event buffer.
    pub fn snapshot(&mut self, tick: u64, paused: bool, banked_score: u64) -> Snapshot {
        let (sounds, shakes) = self.events.drain();
        let thief = &self.thief;
        let drone = &self.drone;
        Snapshot {
            tick,
            level: self.level,
            paused,
            outcome: self.outcome,
            elapsed_ms: self.elapsed_ms,
            level_score: self.level_score,
            banked_score,
            grid: self.grid.rows(),
            exit: self.exit,
            exit_unlocked: self.exit_unlocked,
            primary_loot_total: self.primary_loot_total,
            thief: ThiefView {
                position: thief.position,
                hp: thief.hp,
                max_hp: thief.max_hp,
                primary_loot: thief.primary_loot,
                bonus_loot: thief.bonus_loot,
                action: thief.action_label(),
                invulnerable_ms: thief.invulnerable_ms,
                picking: thief.picking.is_some(),
                pick_progress_ms: thief.picking.map_or(0, |p| p.progress_ms),
                pick_speed_ms: thief.pick_speed_ms,
                sprinting_ms: thief.sprint_ms,
                sprint_cooldown_ms: thief.sprint_cooldown_ms,
                noise_charges: thief.noise_charges,
                smoke_charges: thief.smoke_charges,
                vision_radius: thief.vision_radius,
                locks_picked: thief.locks_picked,
            },
            drone: DroneView {
                position: drone.position,
                battery: drone.battery,
                max_battery: drone.max_battery,
                charging: drone.charging,
                hack_cost: drone.hack_cost,
                emp_charges: drone.emp_charges,
                decoy_charges: drone.decoy_charges,
            },
            guards: self
                .guards
                .iter()
                .map(|g| GuardView {
                    position: g.position,
                    facing: g.facing,
                    alert_level: g.alert_level,
                    frozen: g.is_frozen(),
                })
                .collect(),
            cameras: self
                .cameras
                .iter()
                .map(|c| CameraView {
                    position: c.position,
                    facing: c.facing,
                    active: c.active,
                })
                .collect(),
            doors: self
                .doors
                .iter()
                .map(|d| DoorView {
                    position: d.position,
                    electronic: d.electronic,
                    open: d.open,
                })
                .collect(),
            loot: self
                .loot
                .iter()
                .map(|l| LootView {
                    position: l.position,
                    primary: l.primary,
                    collected: l.collected,
                })
                .collect(),
            lasers: self
                .lasers
                .iter()
                .map(|l| LaserView {
                    position: l.position,
                    horizontal: l.horizontal,
                    active: l.active,
                })
                .collect(),
            tripwires: self
                .tripwires
                .iter()
                .map(|t| TripwireView {
                    position: t.position,
                    triggered: t.triggered,
                })
                .collect(),
            safes: self
                .safes
                .iter()
                .map(|s| SafeView {
                    position: s.position,
                    open: s.open,
                    value: s.value,
                })
                .collect(),
            noise_makers: self.noise_makers.iter().map(Marker::view).collect(),
            smoke_clouds: self.smoke_clouds.iter().map(Marker::view).collect(),
            decoys: self.decoys.iter().map(Marker::view).collect(),
            ping: self.ping.as_ref().map(Marker::view),
            alarm: AlarmView {
                active: self.alarm.active,
                remaining_ms: self.alarm.remaining_ms,
                ever_triggered: self.alarm.ever_triggered,
            },
            objectives: self.objectives.iter().map(Objective::view).collect(),
            sounds,
            shakes,
        }
    }
}
