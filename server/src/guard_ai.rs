//! Guard and camera behaviour.
//!
//! Guards run a three-level state machine (patrol, suspicious, alert). Alert
//! and freeze timers tick down every simulation step, but a guard only looks
//! around and takes a step when its personal movement timer matures, so
//! faster (more alert) guards also perceive more often.

use crate::world::{Guard, Marker, WorldState};
use log::debug;
use shared::{
    AlertLevel, Direction, Position, SoundCue, CAMERA_ROTATE_MS, CAMERA_VISION_RANGE,
    DECOY_PERCEPTION_RADIUS, GUARD_ALERT_MS, GUARD_ALERT_VISION_RANGE, GUARD_VISION_RANGE,
    NOISE_PERCEPTION_RADIUS, SPRINT_PERCEPTION_RADIUS,
};

pub fn update_guards(world: &mut WorldState, dt_ms: u64) {
    for index in 0..world.guards.len() {
        if world.is_over() {
            return;
        }
        update_guard(world, index, dt_ms);
    }
}

fn update_guard(world: &mut WorldState, index: usize, dt_ms: u64) {
    let guard = &mut world.guards[index];
    if guard.is_frozen() {
        guard.frozen_ms = guard.frozen_ms.saturating_sub(dt_ms);
        return;
    }
    if guard.alert_level != AlertLevel::Patrol {
        guard.alert_ms = guard.alert_ms.saturating_sub(dt_ms);
        if guard.alert_ms == 0 {
            debug!("Guard {} lost interest", index);
            guard.calm_down();
        }
    }

    if check_collision(world, index) {
        return;
    }

    let guard = &mut world.guards[index];
    guard.move_timer_ms += dt_ms;
    if guard.move_timer_ms < guard.move_interval_ms() {
        return;
    }
    guard.move_timer_ms = 0;

    perceive(world, index);
    if world.is_over() {
        return;
    }
    step(world, index);
    check_collision(world, index);
}

/// Escalates to alert with a fresh timer and a located target.
fn raise_alert(guard: &mut Guard, target: Position) {
    guard.alert_level = AlertLevel::Alert;
    guard.alert_ms = GUARD_ALERT_MS;
    guard.last_known = Some(target);
}

/// A sound worth checking out. Never lowers an existing alert.
fn raise_suspicion(guard: &mut Guard, target: Position) {
    guard.alert_level = guard.alert_level.max(AlertLevel::Suspicious);
    guard.alert_ms = GUARD_ALERT_MS;
    guard.investigate = Some(target);
}

/// Standing on the thief's tile always counts, whatever the guard is facing.
fn check_collision(world: &mut WorldState, index: usize) -> bool {
    let thief = world.thief.position;
    if world.guards[index].position != thief {
        return false;
    }
    spotted(world, index, thief);
    world.damage_thief(false);
    true
}

fn spotted(world: &mut WorldState, index: usize, thief: Position) {
    let guard = &mut world.guards[index];
    let first_sighting = guard.alert_level != AlertLevel::Alert;
    raise_alert(guard, thief);
    if first_sighting {
        world.events.sound(SoundCue::Spotted);
    }
    world.arm_alarm();
}

fn perceive(world: &mut WorldState, index: usize) {
    let thief = world.thief.position;
    if guard_sees(world, &world.guards[index], thief) {
        spotted(world, index, thief);
        return;
    }

    let position = world.guards[index].position;
    if let Some(decoy) = nearest_within(&world.decoys, position, DECOY_PERCEPTION_RADIUS) {
        raise_alert(&mut world.guards[index], decoy);
        return;
    }

    if let Some(noise) = nearest_within(&world.noise_makers, position, NOISE_PERCEPTION_RADIUS) {
        raise_suspicion(&mut world.guards[index], noise);
        return;
    }

    let guard = &mut world.guards[index];
    if world.thief.is_sprinting()
        && guard.alert_level != AlertLevel::Alert
        && position.manhattan(thief) <= SPRINT_PERCEPTION_RADIUS
    {
        raise_suspicion(guard, thief);
    }
}

fn nearest_within(markers: &[Marker], from: Position, radius: i32) -> Option<Position> {
    markers
        .iter()
        .map(|m| m.position)
        .filter(|p| from.manhattan(*p) <= radius)
        .min_by_key(|p| from.manhattan(*p))
}

/// Straight ray along the facing, plus one tile to either side once the
/// guard is on edge.
pub fn guard_sees(world: &WorldState, guard: &Guard, target: Position) -> bool {
    let calm = guard.alert_level == AlertLevel::Patrol;
    let range = if calm {
        GUARD_VISION_RANGE
    } else {
        GUARD_ALERT_VISION_RANGE
    };
    if ray_reaches(world, guard.position, guard.facing, range, target) {
        return true;
    }
    !calm
        && guard
            .facing
            .perpendicular()
            .iter()
            .any(|side| ray_reaches(world, guard.position, *side, 1, target))
}

/// Walks `range` tiles from `from`. Walls, closed doors, closed safes and
/// smoke stop the ray before it reaches anything behind them.
pub fn ray_reaches(
    world: &WorldState,
    from: Position,
    direction: Direction,
    range: i32,
    target: Position,
) -> bool {
    let mut pos = from;
    for _ in 0..range {
        pos = pos.step(direction);
        if world.blocks_vision(pos) {
            return false;
        }
        if pos == target {
            return true;
        }
    }
    false
}

fn step(world: &mut WorldState, index: usize) {
    let guard = &world.guards[index];
    let chasing = match guard.alert_level {
        AlertLevel::Alert => guard.last_known,
        _ => None,
    };

    if let Some(target) = chasing.or(guard.investigate) {
        if guard.position == target {
            let guard = &mut world.guards[index];
            if chasing.is_some() {
                // Look around where the thief was last seen.
                guard.facing = guard.facing.clockwise();
            } else {
                guard.investigate = None;
            }
            return;
        }
        if let Some((next, facing)) = next_step(world, guard.position, target) {
            let guard = &mut world.guards[index];
            guard.position = next;
            guard.facing = facing;
            if chasing.is_none() && next == target {
                guard.investigate = None;
            }
        }
        return;
    }

    patrol(world, index);
}

fn patrol(world: &mut WorldState, index: usize) {
    let guard = &world.guards[index];
    if guard.route.is_empty() {
        return;
    }
    let mut route_index = guard.route_index % guard.route.len();
    if guard.route[route_index] == guard.position {
        route_index = (route_index + 1) % guard.route.len();
    }
    let target = guard.route[route_index];
    let step = next_step(world, guard.position, target);

    let guard = &mut world.guards[index];
    match step {
        Some((next, facing)) => {
            guard.position = next;
            guard.facing = facing;
            if next == target {
                route_index = (route_index + 1) % guard.route.len();
            }
        }
        None => route_index = (route_index + 1) % guard.route.len(),
    }
    guard.route_index = route_index;
}

/// One orthogonal step toward `target`, along the longer axis first and the
/// other axis if that is blocked.
fn next_step(world: &WorldState, from: Position, target: Position) -> Option<(Position, Direction)> {
    let dx = target.x - from.x;
    let dy = target.y - from.y;
    let (primary, secondary) = if dx.abs() >= dy.abs() {
        (Direction::from_delta(dx, 0), Direction::from_delta(0, dy))
    } else {
        (Direction::from_delta(0, dy), Direction::from_delta(dx, 0))
    };
    [primary, secondary]
        .into_iter()
        .flatten()
        .map(|dir| (from.step(dir), dir))
        .find(|(next, _)| world.is_walkable(*next))
}

pub fn update_cameras(world: &mut WorldState, dt_ms: u64) {
    let thief = world.thief.position;
    for index in 0..world.cameras.len() {
        let camera = &mut world.cameras[index];
        if !camera.active {
            if camera.disabled_ms > 0 {
                camera.disabled_ms = camera.disabled_ms.saturating_sub(dt_ms);
                if camera.disabled_ms == 0 {
                    camera.active = true;
                    camera.rotate_timer_ms = 0;
                }
            }
            continue;
        }

        camera.rotate_timer_ms += dt_ms;
        if camera.rotate_timer_ms >= CAMERA_ROTATE_MS {
            camera.rotate_timer_ms -= CAMERA_ROTATE_MS;
            camera.facing = camera.facing.clockwise();
        }

        let (position, facing) = (camera.position, camera.facing);
        if ray_reaches(world, position, facing, CAMERA_VISION_RANGE, thief) && world.arm_alarm() {
            world.events.sound(SoundCue::Spotted);
            debug!("Camera at {:?} spotted the thief", position);
        }
    }
}
