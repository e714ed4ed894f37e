use crate::guard_ai;
use crate::objectives;
use crate::world::{LockPick, Marker, WorldState};
use log::{debug, info};
use shared::{
    Action, ActionLabel, Direction, Outcome, Position, SoundCue, Tile, ALARM_DURATION_MS,
    BATTERY_CHARGE_PER_SEC, BATTERY_DRAIN_PER_SEC, BONUS_LOOT_POINTS, DECOY_DURATION_MS,
    EMP_CAMERA_RADIUS, EMP_DURATION_MS, EMP_GUARD_RADIUS, HACK_FREEZE_MS, INVULNERABILITY_MS,
    NOISE_DURATION_MS, NOISE_THROW_RANGE, OBJECTIVE_BONUS, PING_DURATION_MS, PRIMARY_LOOT_POINTS,
    SIREN_PERIOD_MS, SMOKE_DURATION_MS, SPRINT_COOLDOWN_MS, SPRINT_DURATION_MS, STEALTH_BONUS,
    TIME_BONUS_MAX, TIME_BONUS_PER_SEC,
};

/// How long a one-shot action label stays visible to clients.
const ACTION_LABEL_MS: u64 = 200;

impl WorldState {
    /// Applies one thief intent. Returns `false` when the intent was rejected
    /// and left the world untouched.
    pub fn apply_thief(&mut self, action: Action, dx: i32, dy: i32) -> bool {
        if self.is_over() {
            return false;
        }
        match action {
            Action::Move => self.move_thief(dx, dy),
            Action::StartPick => self.start_pick(),
            Action::StopPick => self.thief.picking.take().is_some(),
            Action::Sprint => self.start_sprint(),
            Action::Noise => self.throw_noise(dx, dy),
            Action::Smoke => self.drop_smoke(),
            Action::Hack | Action::Emp | Action::Decoy | Action::Ping => false,
        }
    }

    pub fn apply_drone(&mut self, action: Action, dx: i32, dy: i32) -> bool {
        if self.is_over() {
            return false;
        }
        match action {
            Action::Move => self.move_drone(dx, dy),
            Action::Hack => self.hack(),
            Action::Emp => self.emp(),
            Action::Decoy => self.drop_decoy(),
            Action::Ping => {
                self.ping = Some(Marker::new(self.drone.position, PING_DURATION_MS));
                self.events.sound(SoundCue::Ping);
                true
            }
            _ => false,
        }
    }

    /// One fixed-step advance. Stops as soon as the level is lost.
    pub fn advance(&mut self, dt_ms: u64) {
        if self.is_over() {
            return;
        }
        self.elapsed_ms += dt_ms;

        self.update_lock_pick(dt_ms);

        guard_ai::update_guards(self, dt_ms);
        if self.is_over() {
            return;
        }
        guard_ai::update_cameras(self, dt_ms);

        self.update_alarm(dt_ms);
        if self.is_over() {
            return;
        }

        self.update_battery(dt_ms);
        self.thief.invulnerable_ms = self.thief.invulnerable_ms.saturating_sub(dt_ms);

        self.update_lasers();
        if self.is_over() {
            return;
        }

        self.expire_effects(dt_ms);
    }

    /// Deals one point of damage. Returns whether the hit landed.
    pub(crate) fn damage_thief(&mut self, bypass_invulnerability: bool) -> bool {
        if self.is_over() || self.thief.hp == 0 {
            return false;
        }
        if !bypass_invulnerability && self.thief.invulnerable_ms > 0 {
            return false;
        }
        self.thief.hp -= 1;
        self.thief.damage_taken += 1;
        self.thief.invulnerable_ms = INVULNERABILITY_MS;
        self.set_action(ActionLabel::Hurt);
        self.events.sound(SoundCue::Hurt);
        self.events.shake(0.6, 300);
        debug!("Thief hit, {} hp left", self.thief.hp);

        if self.thief.hp == 0 {
            self.lose();
        }
        true
    }

    /// Arms the alarm if it is not already running.
    pub(crate) fn arm_alarm(&mut self) -> bool {
        if self.alarm.active || self.is_over() {
            return false;
        }
        self.alarm.active = true;
        self.alarm.remaining_ms = ALARM_DURATION_MS;
        self.alarm.ever_triggered = true;
        self.events.sound(SoundCue::Alarm);
        self.events.shake(0.3, 500);
        info!("Alarm raised on level {}", self.level);
        true
    }

    fn set_action(&mut self, label: ActionLabel) {
        self.thief.action = label;
        self.thief.action_ms = ACTION_LABEL_MS;
    }

    fn move_thief(&mut self, dx: i32, dy: i32) -> bool {
        if self.thief.picking.is_some() {
            return false;
        }
        let Some(direction) = Direction::from_delta(dx, dy) else {
            return false;
        };
        let dest = self.thief.position.step(direction);
        if !self.is_walkable(dest) {
            return false;
        }
        self.thief.position = dest;
        self.thief.facing = direction;
        self.set_action(ActionLabel::Moving);

        if self.lasers.iter().any(|l| l.active && l.position == dest) {
            self.damage_thief(false);
            if self.is_over() {
                return true;
            }
        }

        if let Some(wire) = self.tripwires.iter_mut().find(|t| t.position == dest && !t.triggered) {
            wire.triggered = true;
            self.arm_alarm();
        }

        self.collect_loot(dest);
        self.try_open_safes();

        if dest == self.exit && self.exit_unlocked {
            self.win();
        }
        true
    }

    fn collect_loot(&mut self, pos: Position) {
        let Some(item) = self.loot.iter_mut().find(|l| l.position == pos && !l.collected) else {
            return;
        };
        item.collected = true;
        if item.primary {
            self.thief.primary_loot += 1;
        } else {
            self.thief.bonus_loot += 1;
        }
        self.events.sound(SoundCue::Pickup);

        if !self.exit_unlocked && self.thief.primary_loot >= self.primary_loot_total {
            self.exit_unlocked = true;
            self.events.sound(SoundCue::Unlock);
            info!("Exit unlocked on level {}", self.level);
        }
    }

    /// A safe opens while the thief stands next to it and the drone hovers on it.
    fn try_open_safes(&mut self) {
        let thief = self.thief.position;
        let drone = self.drone.position;
        for safe in self.safes.iter_mut() {
            if !safe.open && safe.position == drone && thief.is_adjacent(safe.position) {
                safe.open = true;
                self.safe_score += safe.value;
                self.level_score += safe.value;
                self.events.sound(SoundCue::Safe);
                info!("Safe cracked for {}", safe.value);
            }
        }
    }

    fn start_pick(&mut self) -> bool {
        if self.thief.picking.is_some() {
            return false;
        }
        let thief = self.thief.position;
        let door = self
            .doors
            .iter()
            .position(|d| !d.electronic && !d.open && thief.is_adjacent(d.position));
        match door {
            Some(door) => {
                self.thief.picking = Some(LockPick {
                    door,
                    progress_ms: 0,
                });
                true
            }
            None => false,
        }
    }

    fn update_lock_pick(&mut self, dt_ms: u64) {
        let Some(mut pick) = self.thief.picking else {
            return;
        };
        pick.progress_ms += dt_ms;
        if pick.progress_ms < self.thief.pick_speed_ms {
            self.thief.picking = Some(pick);
            return;
        }
        self.thief.picking = None;
        if let Some(door) = self.doors.get_mut(pick.door) {
            door.open = true;
            self.thief.locks_picked += 1;
            self.events.sound(SoundCue::Door);
        }
    }

    fn start_sprint(&mut self) -> bool {
        if self.thief.is_sprinting() || self.thief.sprint_cooldown_ms > 0 {
            return false;
        }
        self.thief.sprint_ms = SPRINT_DURATION_MS;
        true
    }

    /// Lands up to `NOISE_THROW_RANGE` tiles away, short of the first solid tile.
    /// A zero direction throws along the thief's facing.
    fn throw_noise(&mut self, dx: i32, dy: i32) -> bool {
        if self.thief.noise_charges == 0 {
            return false;
        }
        let direction = Direction::from_delta(dx, dy).unwrap_or(self.thief.facing);
        let mut landing = self.thief.position;
        for _ in 0..NOISE_THROW_RANGE {
            let next = landing.step(direction);
            if self.is_solid(next) {
                break;
            }
            landing = next;
        }
        self.thief.noise_charges -= 1;
        self.noise_makers.push(Marker::new(landing, NOISE_DURATION_MS));
        self.set_action(ActionLabel::Throwing);
        self.events.sound(SoundCue::Noise);
        true
    }

    fn drop_smoke(&mut self) -> bool {
        if self.thief.smoke_charges == 0 {
            return false;
        }
        self.thief.smoke_charges -= 1;
        self.smoke_clouds
            .push(Marker::new(self.thief.position, SMOKE_DURATION_MS));
        self.set_action(ActionLabel::Throwing);
        self.events.sound(SoundCue::Smoke);
        true
    }

    fn move_drone(&mut self, dx: i32, dy: i32) -> bool {
        let Some(direction) = Direction::from_delta(dx, dy) else {
            return false;
        };
        let dest = self.drone.position.step(direction);
        if !self.grid.in_bounds(dest) {
            return false;
        }
        self.drone.position = dest;
        self.try_open_safes();
        true
    }

    /// Resolves against the cursor tile: electronic door, camera, guard, then
    /// the alarm panel while the alarm is sounding.
    fn hack(&mut self) -> bool {
        let cost = self.drone.hack_cost;
        if self.drone.battery < cost {
            return false;
        }
        let target = self.drone.position;

        let hacked = if let Some(door) = self
            .doors
            .iter_mut()
            .find(|d| d.electronic && !d.open && d.position == target)
        {
            door.open = true;
            true
        } else if let Some(camera) = self
            .cameras
            .iter_mut()
            .find(|c| c.active && c.position == target)
        {
            camera.active = false;
            camera.disabled_ms = 0;
            true
        } else if let Some(guard) = self
            .guards
            .iter_mut()
            .find(|g| !g.is_frozen() && g.position == target)
        {
            guard.freeze(HACK_FREEZE_MS);
            true
        } else if self.alarm.active && self.grid.get(target) == Tile::AlarmPanel {
            self.alarm.active = false;
            self.alarm.remaining_ms = 0;
            info!("Alarm cancelled from panel at {:?}", target);
            true
        } else {
            false
        };

        if hacked {
            self.drone.battery = (self.drone.battery - cost).max(0.0);
            self.drone.hacks += 1;
            self.events.sound(SoundCue::Hack);
        }
        hacked
    }

    fn emp(&mut self) -> bool {
        if self.drone.emp_charges == 0 {
            return false;
        }
        self.drone.emp_charges -= 1;
        let center = self.drone.position;
        let within = |p: Position, radius: i32| {
            let (dx, dy) = (p.x - center.x, p.y - center.y);
            dx * dx + dy * dy <= radius * radius
        };

        for camera in self.cameras.iter_mut() {
            if camera.active && within(camera.position, EMP_CAMERA_RADIUS) {
                camera.active = false;
                camera.disabled_ms = EMP_DURATION_MS;
            }
        }
        for guard in self.guards.iter_mut() {
            if !guard.is_frozen() && within(guard.position, EMP_GUARD_RADIUS) {
                guard.freeze(EMP_DURATION_MS);
            }
        }
        self.events.sound(SoundCue::Emp);
        self.events.shake(0.4, 250);
        true
    }

    fn drop_decoy(&mut self) -> bool {
        if self.drone.decoy_charges == 0 {
            return false;
        }
        self.drone.decoy_charges -= 1;
        self.decoys
            .push(Marker::new(self.drone.position, DECOY_DURATION_MS));
        self.events.sound(SoundCue::Decoy);
        true
    }

    /// Counts down the alarm. The siren cue fires whenever a period boundary
    /// is crossed since the previous tick, so it does not depend on tick size.
    fn update_alarm(&mut self, dt_ms: u64) {
        if !self.alarm.active {
            return;
        }
        let before = ALARM_DURATION_MS - self.alarm.remaining_ms;
        self.alarm.remaining_ms = self.alarm.remaining_ms.saturating_sub(dt_ms);
        let after = ALARM_DURATION_MS - self.alarm.remaining_ms;

        if self.alarm.remaining_ms > 0 {
            if after / SIREN_PERIOD_MS != before / SIREN_PERIOD_MS {
                self.events.sound(SoundCue::Siren);
            }
            return;
        }

        self.alarm.active = false;
        info!("Alarm ran out on level {}", self.level);
        self.damage_thief(true);
    }

    fn update_battery(&mut self, dt_ms: u64) {
        let seconds = dt_ms as f32 / 1000.0;
        let drone = &mut self.drone;
        drone.charging = self.grid.get(drone.position) == Tile::ChargingPad;
        drone.battery = if drone.charging {
            (drone.battery + BATTERY_CHARGE_PER_SEC * seconds).min(drone.max_battery)
        } else {
            (drone.battery - BATTERY_DRAIN_PER_SEC * seconds).max(0.0)
        };
    }

    fn update_lasers(&mut self) {
        let elapsed = self.elapsed_ms;
        for laser in self.lasers.iter_mut() {
            laser.active = laser.is_on_at(elapsed);
        }
        let thief = self.thief.position;
        if self.lasers.iter().any(|l| l.active && l.position == thief) {
            self.damage_thief(false);
        }
    }

    fn expire_effects(&mut self, dt_ms: u64) {
        for markers in [
            &mut self.noise_makers,
            &mut self.smoke_clouds,
            &mut self.decoys,
        ] {
            for marker in markers.iter_mut() {
                marker.remaining_ms = marker.remaining_ms.saturating_sub(dt_ms);
            }
            markers.retain(|m| m.remaining_ms > 0);
        }

        if let Some(ping) = self.ping.as_mut() {
            ping.remaining_ms = ping.remaining_ms.saturating_sub(dt_ms);
            if ping.remaining_ms == 0 {
                self.ping = None;
            }
        }

        let thief = &mut self.thief;
        thief.action_ms = thief.action_ms.saturating_sub(dt_ms);
        if thief.sprint_ms > 0 {
            thief.sprint_ms = thief.sprint_ms.saturating_sub(dt_ms);
            if thief.sprint_ms == 0 {
                thief.sprint_cooldown_ms = SPRINT_COOLDOWN_MS;
            }
        } else {
            thief.sprint_cooldown_ms = thief.sprint_cooldown_ms.saturating_sub(dt_ms);
        }
    }

    fn win(&mut self) {
        let met = objectives::evaluate(self);
        let seconds = self.elapsed_ms / 1000;
        let time_bonus = TIME_BONUS_MAX.saturating_sub(TIME_BONUS_PER_SEC * seconds);
        let stealth_bonus = if self.alarm.ever_triggered {
            0
        } else {
            STEALTH_BONUS
        };
        let earned = u64::from(self.thief.primary_loot) * PRIMARY_LOOT_POINTS
            + u64::from(self.thief.bonus_loot) * BONUS_LOOT_POINTS
            + time_bonus
            + stealth_bonus
            + u64::from(met) * OBJECTIVE_BONUS;

        self.level_score += earned;
        self.outcome = Outcome::Won;
        self.thief.picking = None;
        self.events.sound(SoundCue::Win);
        info!(
            "Level {} won in {}s for {} points ({} objectives)",
            self.level, seconds, earned, met
        );
    }

    fn lose(&mut self) {
        self.outcome = Outcome::Lost;
        self.thief.picking = None;
        self.events.sound(SoundCue::Lose);
        self.events.shake(1.0, 600);
        info!("Level {} lost after {}ms", self.level, self.elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use crate::upgrades::Loadout;
    use crate::world::test_support::*;
    use crate::world::WorldState;
    use assert_approx_eq::assert_approx_eq;
    use shared::*;

    const TICK: u64 = 50;

    fn run(world: &mut WorldState, total_ms: u64) {
        for _ in 0..total_ms / TICK {
            world.advance(TICK);
        }
    }

    #[test]
    fn test_move_rejects_walls_and_diagonals() {
        let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
        assert!(!world.apply_thief(Action::Move, 0, -1));
        assert!(!world.apply_thief(Action::Move, 1, 1));
        assert!(!world.apply_thief(Action::Move, 0, 0));
        assert_eq!(world.thief.position, Position::new(1, 1));
        assert!(world.apply_thief(Action::Move, 1, 0));
        assert_eq!(world.thief.position, Position::new(2, 1));
    }

    #[test]
    fn test_collecting_primaries_unlocks_exit_and_wins() {
        let mut world = world(&["#########", "#.$$$..X#", "#########"], Position::new(1, 1));
        world.apply_thief(Action::Move, 1, 0);
        world.apply_thief(Action::Move, 1, 0);
        assert!(!world.exit_unlocked);
        world.apply_thief(Action::Move, 1, 0);
        assert!(world.exit_unlocked);
        assert_eq!(world.thief.primary_loot, 3);

        for _ in 0..3 {
            world.apply_thief(Action::Move, 1, 0);
        }
        assert_eq!(world.outcome, Outcome::Won);
        assert!(world.level_score >= 3 * PRIMARY_LOOT_POINTS + STEALTH_BONUS);
        assert_eq!(world.level_score, 3 * PRIMARY_LOOT_POINTS + TIME_BONUS_MAX + STEALTH_BONUS);
        assert!(!world.apply_thief(Action::Move, -1, 0));
    }

    #[test]
    fn test_locked_exit_is_just_floor() {
        let mut world = world(&["#####", "#.X$#", "#####"], Position::new(1, 1));
        world.apply_thief(Action::Move, 1, 0);
        assert_eq!(world.outcome, Outcome::Playing);
        world.apply_thief(Action::Move, 1, 0);
        world.apply_thief(Action::Move, -1, 0);
        assert_eq!(world.outcome, Outcome::Won);
    }

    #[test]
    fn test_lock_pick_opens_physical_door() {
        let mut world = world(&["#####", "#.P.#", "#####"], Position::new(1, 1));
        assert!(!world.apply_thief(Action::Move, 1, 0));
        assert!(world.apply_thief(Action::StartPick, 0, 0));
        assert!(!world.apply_thief(Action::Move, 0, 1));
        run(&mut world, PICK_SPEED_MS - TICK);
        assert!(!world.doors[0].open);
        world.advance(TICK);
        assert!(world.doors[0].open);
        assert_eq!(world.thief.locks_picked, 1);
        assert!(world.thief.picking.is_none());
        assert!(world.apply_thief(Action::Move, 1, 0));
    }

    #[test]
    fn test_stop_pick_cancels() {
        let mut world = world(&["#####", "#.P.#", "#####"], Position::new(1, 1));
        world.apply_thief(Action::StartPick, 0, 0);
        run(&mut world, 1_000);
        assert!(world.apply_thief(Action::StopPick, 0, 0));
        run(&mut world, PICK_SPEED_MS);
        assert!(!world.doors[0].open);
    }

    #[test]
    fn test_electronic_door_cannot_be_picked() {
        let mut world = world(&["#####", "#.E.#", "#####"], Position::new(1, 1));
        assert!(!world.apply_thief(Action::StartPick, 0, 0));
    }

    #[test]
    fn test_alarm_expiry_deals_exactly_one_damage() {
        let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
        assert!(world.arm_alarm());
        assert!(!world.arm_alarm());
        run(&mut world, ALARM_DURATION_MS);
        assert_eq!(world.thief.hp, THIEF_MAX_HP - 1);
        assert!(!world.alarm.active);
        assert!(world.alarm.ever_triggered);
        run(&mut world, ALARM_DURATION_MS);
        assert_eq!(world.thief.hp, THIEF_MAX_HP - 1);
    }

    #[test]
    fn test_alarm_expiry_ignores_invulnerability() {
        let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
        world.arm_alarm();
        run(&mut world, ALARM_DURATION_MS - TICK);
        world.thief.invulnerable_ms = 10_000;
        world.advance(TICK);
        assert_eq!(world.thief.hp, THIEF_MAX_HP - 1);
    }

    #[test]
    fn test_siren_fires_on_period_edges() {
        for tick in [50, 300, 700] {
            let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
            world.arm_alarm();
            world.events.drain();
            let mut sirens = 0;
            while world.alarm.active {
                world.advance(tick);
                sirens += world
                    .events
                    .sounds()
                    .iter()
                    .filter(|s| **s == SoundCue::Siren)
                    .count();
                world.events.drain();
            }
            assert_eq!(sirens, 14, "tick size {}", tick);
        }
    }

    #[test]
    fn test_hp_never_negative() {
        let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
        for _ in 0..10 {
            world.damage_thief(true);
        }
        assert_eq!(world.thief.hp, 0);
        assert_eq!(world.outcome, Outcome::Lost);
        assert!(!world.damage_thief(true));
        assert_eq!(world.thief.damage_taken, THIEF_MAX_HP);
        let elapsed = world.elapsed_ms;
        world.advance(TICK);
        assert_eq!(world.elapsed_ms, elapsed);
    }

    #[test]
    fn test_invulnerability_window_blocks_repeat_damage() {
        let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
        assert!(world.damage_thief(false));
        assert!(!world.damage_thief(false));
        run(&mut world, INVULNERABILITY_MS);
        assert!(world.damage_thief(false));
        assert_eq!(world.thief.hp, THIEF_MAX_HP - 2);
    }

    #[test]
    fn test_hack_on_empty_tile_is_noop() {
        let mut world = world(&["#####", "#.E.#", "#####"], Position::new(1, 1));
        let battery = world.drone.battery;
        assert!(!world.apply_drone(Action::Hack, 0, 0));
        assert_approx_eq!(world.drone.battery, battery, 0.0001);
        assert_eq!(world.drone.hacks, 0);
        assert!(!world.doors[0].open);
    }

    #[test]
    fn test_hack_needs_battery() {
        let mut world = world(&["#####", "#.E.#", "#####"], Position::new(1, 1));
        world.apply_drone(Action::Move, 1, 0);
        world.drone.battery = HACK_COST - 1.0;
        assert!(!world.apply_drone(Action::Hack, 0, 0));
        assert!(!world.doors[0].open);
        assert_approx_eq!(world.drone.battery, HACK_COST - 1.0, 0.0001);

        world.drone.battery = DRONE_MAX_BATTERY;
        assert!(world.apply_drone(Action::Hack, 0, 0));
        assert!(world.doors[0].open);
        assert_approx_eq!(world.drone.battery, DRONE_MAX_BATTERY - HACK_COST, 0.0001);
    }

    #[test]
    fn test_hack_cancels_alarm_only_while_active() {
        let mut world = world(&["#####", "#.A.#", "#####"], Position::new(1, 1));
        world.apply_drone(Action::Move, 1, 0);
        assert!(!world.apply_drone(Action::Hack, 0, 0));
        world.arm_alarm();
        assert!(world.apply_drone(Action::Hack, 0, 0));
        assert!(!world.alarm.active);
        assert!(world.alarm.ever_triggered);
    }

    #[test]
    fn test_drone_ignores_walls() {
        let mut world = world(&["###", "#.#", "###"], Position::new(1, 1));
        assert!(world.apply_drone(Action::Move, 0, -1));
        assert!(!world.apply_drone(Action::Move, 0, -1));
        assert_eq!(world.drone.position, Position::new(1, 0));
    }

    #[test]
    fn test_battery_drains_and_charges() {
        let mut world = world(&["#####", "#.C.#", "#####"], Position::new(1, 1));
        run(&mut world, 2_000);
        assert_approx_eq!(world.drone.battery, DRONE_MAX_BATTERY - 1.0, 0.01);
        assert!(!world.drone.charging);
        world.apply_drone(Action::Move, 1, 0);
        run(&mut world, 1_000);
        assert!(world.drone.charging);
        assert_approx_eq!(world.drone.battery, DRONE_MAX_BATTERY, 0.01);
        world.drone.battery = 0.0;
        world.apply_drone(Action::Move, 1, 0);
        run(&mut world, 1_000);
        assert_approx_eq!(world.drone.battery, 0.0, 0.0001);
    }

    #[test]
    fn test_sprint_then_cooldown() {
        let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
        assert!(world.apply_thief(Action::Sprint, 0, 0));
        assert!(!world.apply_thief(Action::Sprint, 0, 0));
        run(&mut world, SPRINT_DURATION_MS);
        assert!(!world.thief.is_sprinting());
        assert_eq!(world.thief.sprint_cooldown_ms, SPRINT_COOLDOWN_MS);
        assert!(!world.apply_thief(Action::Sprint, 0, 0));
        run(&mut world, SPRINT_COOLDOWN_MS);
        assert!(world.apply_thief(Action::Sprint, 0, 0));
    }

    #[test]
    fn test_noise_stops_at_wall_and_expires() {
        let mut world = world(&["#######", "#.....#", "#######"], Position::new(1, 1));
        assert!(world.apply_thief(Action::Noise, 1, 0));
        assert_eq!(world.noise_makers[0].position, Position::new(5, 1));
        assert_eq!(world.thief.noise_charges, NOISE_CHARGES - 1);
        run(&mut world, NOISE_DURATION_MS);
        assert!(world.noise_makers.is_empty());
    }

    #[test]
    fn test_charges_run_out() {
        let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
        assert!(world.apply_thief(Action::Smoke, 0, 0));
        assert!(!world.apply_thief(Action::Smoke, 0, 0));
        assert!(world.apply_drone(Action::Decoy, 0, 0));
        assert!(!world.apply_drone(Action::Decoy, 0, 0));
        assert!(world.apply_drone(Action::Emp, 0, 0));
        assert!(!world.apply_drone(Action::Emp, 0, 0));
    }

    #[test]
    fn test_emp_radii() {
        let rows = [
            "########", "#......#", "#......#", "#......#", "#V.....#", "#......#", "#V.....#",
            "########",
        ];
        let mut layout = layout(&rows, Position::new(1, 1));
        layout.guards.push(guard(&[Position::new(4, 1)], Direction::Left));
        layout.guards.push(guard(&[Position::new(5, 1)], Direction::Left));
        layout.cameras.push(camera(Position::new(1, 4), Direction::Down));
        layout.cameras.push(camera(Position::new(1, 6), Direction::Up));
        let mut world = WorldState::from_layout(layout, &Loadout::default(), Vec::new());
        world.drone.position = Position::new(1, 1);
        for guard in world.guards.iter_mut() {
            guard.alert_level = AlertLevel::Alert;
            guard.last_known = Some(Position::new(1, 1));
        }

        assert!(world.apply_drone(Action::Emp, 0, 0));

        let inside = &world.guards[0];
        assert!(inside.is_frozen());
        assert_eq!(inside.alert_level, AlertLevel::Patrol);
        assert_eq!(inside.last_known, None);

        let outside = &world.guards[1];
        assert!(!outside.is_frozen());
        assert_eq!(outside.alert_level, AlertLevel::Alert);
        assert_eq!(outside.last_known, Some(Position::new(1, 1)));

        assert!(!world.cameras[0].active);
        assert_eq!(world.cameras[0].disabled_ms, EMP_DURATION_MS);
        assert!(world.cameras[1].active);
    }

    #[test]
    fn test_tripwire_arms_alarm_once() {
        let mut world = world(&["######", "#.T..#", "######"], Position::new(1, 1));
        world.apply_thief(Action::Move, 1, 0);
        assert!(world.alarm.active);
        assert!(world.tripwires[0].triggered);
        world.alarm.active = false;
        world.apply_thief(Action::Move, 1, 0);
        world.apply_thief(Action::Move, -1, 0);
        assert!(!world.alarm.active);
    }

    #[test]
    fn test_laser_contact_damages() {
        let mut layout = layout(&["#####", "#.L.#", "#####"], Position::new(1, 1));
        layout.lasers.push(laser(Position::new(2, 1), 2_000, 0));
        let mut world = WorldState::from_layout(layout, &Loadout::default(), Vec::new());
        assert!(world.lasers[0].active);
        world.apply_thief(Action::Move, 1, 0);
        assert_eq!(world.thief.hp, THIEF_MAX_HP - 1);
        run(&mut world, 500);
        assert_eq!(world.thief.hp, THIEF_MAX_HP - 1);
    }

    #[test]
    fn test_safe_needs_both_players() {
        let mut world = world(&["#####", "#.S.#", "#####"], Position::new(1, 1));
        assert_eq!(world.level_score, 0);
        world.apply_drone(Action::Move, 1, 0);
        assert!(world.safes[0].open);
        assert_eq!(world.level_score, SAFE_VALUE);
        assert!(world.is_walkable(Position::new(2, 1)));
    }

    #[test]
    fn test_safe_stays_shut_without_thief() {
        let mut world = world(&["######", "#..S.#", "######"], Position::new(1, 1));
        world.apply_drone(Action::Move, 1, 0);
        world.apply_drone(Action::Move, 1, 0);
        assert!(!world.safes[0].open);
        world.apply_thief(Action::Move, 1, 0);
        assert!(world.safes[0].open);
        assert_eq!(world.safe_score, SAFE_VALUE);
    }

    #[test]
    fn test_ping_marks_and_expires() {
        let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
        assert!(world.apply_drone(Action::Ping, 0, 0));
        assert!(world.ping.is_some());
        run(&mut world, PING_DURATION_MS);
        assert!(world.ping.is_none());
    }

    #[test]
    fn test_roles_reject_foreign_actions() {
        let mut world = world(&["#####", "#...#", "#####"], Position::new(1, 1));
        assert!(!world.apply_thief(Action::Hack, 0, 0));
        assert!(!world.apply_drone(Action::Sprint, 0, 0));
    }
}
