//! Bonus objectives. Two are drawn when a level is built and judged once,
//! at the moment the thief walks out through the exit.

use crate::world::WorldState;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::ObjectiveView;

const SPEEDRUN_LIMIT_MS: u64 = 90_000;
const HACKER_THRESHOLD: u32 = 3;
const OBJECTIVES_PER_LEVEL: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveKind {
    Ghost,
    Collector,
    Locksmith,
    Untouchable,
    Speedrunner,
    Hacker,
    Safecracker,
}

impl ObjectiveKind {
    pub const ALL: [ObjectiveKind; 7] = [
        ObjectiveKind::Ghost,
        ObjectiveKind::Collector,
        ObjectiveKind::Locksmith,
        ObjectiveKind::Untouchable,
        ObjectiveKind::Speedrunner,
        ObjectiveKind::Hacker,
        ObjectiveKind::Safecracker,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ObjectiveKind::Ghost => "ghost",
            ObjectiveKind::Collector => "collector",
            ObjectiveKind::Locksmith => "locksmith",
            ObjectiveKind::Untouchable => "untouchable",
            ObjectiveKind::Speedrunner => "speedrunner",
            ObjectiveKind::Hacker => "hacker",
            ObjectiveKind::Safecracker => "safecracker",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ObjectiveKind::Ghost => "Never trigger the alarm",
            ObjectiveKind::Collector => "Collect every piece of bonus loot",
            ObjectiveKind::Locksmith => "Pick at least one lock",
            ObjectiveKind::Untouchable => "Finish without taking damage",
            ObjectiveKind::Speedrunner => "Escape within 90 seconds",
            ObjectiveKind::Hacker => "Land three successful hacks",
            ObjectiveKind::Safecracker => "Crack a safe",
        }
    }

    pub fn is_met(&self, world: &WorldState) -> bool {
        match self {
            ObjectiveKind::Ghost => !world.alarm.ever_triggered,
            ObjectiveKind::Collector => world.loot.iter().filter(|l| !l.primary).all(|l| l.collected),
            ObjectiveKind::Locksmith => world.thief.locks_picked > 0,
            ObjectiveKind::Untouchable => world.thief.damage_taken == 0,
            ObjectiveKind::Speedrunner => world.elapsed_ms <= SPEEDRUN_LIMIT_MS,
            ObjectiveKind::Hacker => world.drone.hacks >= HACKER_THRESHOLD,
            ObjectiveKind::Safecracker => world.safes.iter().any(|s| s.open),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Objective {
    pub kind: ObjectiveKind,
    pub completed: bool,
}

impl Objective {
    pub fn new(kind: ObjectiveKind) -> Self {
        Self {
            kind,
            completed: false,
        }
    }

    pub fn view(&self) -> ObjectiveView {
        ObjectiveView {
            id: self.kind.id().to_string(),
            description: self.kind.description().to_string(),
            completed: self.completed,
        }
    }
}

/// Draws the level's objectives without replacement. Safecracker is only
/// eligible when the level actually has a safe.
pub fn draw_objectives<R: Rng + ?Sized>(has_safes: bool, rng: &mut R) -> Vec<Objective> {
    let pool: Vec<ObjectiveKind> = ObjectiveKind::ALL
        .iter()
        .copied()
        .filter(|kind| has_safes || *kind != ObjectiveKind::Safecracker)
        .collect();
    pool.choose_multiple(rng, OBJECTIVES_PER_LEVEL)
        .copied()
        .map(Objective::new)
        .collect()
}

/// Marks each objective against the final state and returns how many were met.
pub fn evaluate(world: &mut WorldState) -> u32 {
    let state: &WorldState = world;
    let results: Vec<bool> = state.objectives.iter().map(|o| o.kind.is_met(state)).collect();
    let mut met = 0;
    for (objective, done) in world.objectives.iter_mut().zip(results) {
        objective.completed = done;
        if done {
            met += 1;
        }
    }
    met
}
