//! Persistent per-run progression: the stat loadout both avatars start each
//! level with, and the fixed upgrade catalog that modifies it.
//!
//! Catalog entries are plain effect descriptors. `Loadout::apply` is the one
//! place that interprets them.

use shared::{
    Role, UpgradeView, DECOY_CHARGES, DRONE_MAX_BATTERY, EMP_CHARGES, HACK_COST, MIN_HACK_COST,
    MIN_PICK_SPEED_MS, NOISE_CHARGES, PICK_SPEED_MS, SMOKE_CHARGES, THIEF_MAX_HP,
    THIEF_VISION_RADIUS,
};
use std::collections::BTreeSet;

/// Stats threaded from one level to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct Loadout {
    pub max_hp: u32,
    pub pick_speed_ms: u64,
    pub vision_radius: u32,
    pub noise_charges: u32,
    pub smoke_charges: u32,
    pub max_battery: f32,
    pub hack_cost: f32,
    pub emp_charges: u32,
    pub decoy_charges: u32,
}

impl Default for Loadout {
    fn default() -> Self {
        Self {
            max_hp: THIEF_MAX_HP,
            pick_speed_ms: PICK_SPEED_MS,
            vision_radius: THIEF_VISION_RADIUS,
            noise_charges: NOISE_CHARGES,
            smoke_charges: SMOKE_CHARGES,
            max_battery: DRONE_MAX_BATTERY,
            hack_cost: HACK_COST,
            emp_charges: EMP_CHARGES,
            decoy_charges: DECOY_CHARGES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpgradeEffect {
    MaxHp(u32),
    FasterPick(u64),
    NoiseCharges(u32),
    SmokeCharges(u32),
    VisionRadius(u32),
    MaxBattery(f32),
    CheaperHack(f32),
    EmpCharges(u32),
    DecoyCharges(u32),
}

impl Loadout {
    pub fn apply(&mut self, effect: UpgradeEffect) {
        match effect {
            UpgradeEffect::MaxHp(n) => self.max_hp += n,
            UpgradeEffect::FasterPick(ms) => {
                self.pick_speed_ms = self.pick_speed_ms.saturating_sub(ms).max(MIN_PICK_SPEED_MS)
            }
            UpgradeEffect::NoiseCharges(n) => self.noise_charges += n,
            UpgradeEffect::SmokeCharges(n) => self.smoke_charges += n,
            UpgradeEffect::VisionRadius(n) => self.vision_radius += n,
            UpgradeEffect::MaxBattery(amount) => self.max_battery += amount,
            UpgradeEffect::CheaperHack(amount) => {
                self.hack_cost = (self.hack_cost - amount).max(MIN_HACK_COST)
            }
            UpgradeEffect::EmpCharges(n) => self.emp_charges += n,
            UpgradeEffect::DecoyCharges(n) => self.decoy_charges += n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpgradeEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub role: Role,
    pub cost: u64,
    pub effect: UpgradeEffect,
}

pub const CATALOG: [UpgradeEntry; 9] = [
    UpgradeEntry {
        id: "thief_health",
        name: "Padded Suit",
        role: Role::Thief,
        cost: 2_000,
        effect: UpgradeEffect::MaxHp(1),
    },
    UpgradeEntry {
        id: "thief_picks",
        name: "Tension Wrench",
        role: Role::Thief,
        cost: 1_500,
        effect: UpgradeEffect::FasterPick(1_000),
    },
    UpgradeEntry {
        id: "thief_noise",
        name: "Extra Noisemaker",
        role: Role::Thief,
        cost: 1_000,
        effect: UpgradeEffect::NoiseCharges(1),
    },
    UpgradeEntry {
        id: "thief_smoke",
        name: "Extra Smoke Bomb",
        role: Role::Thief,
        cost: 1_000,
        effect: UpgradeEffect::SmokeCharges(1),
    },
    UpgradeEntry {
        id: "thief_vision",
        name: "Night Goggles",
        role: Role::Thief,
        cost: 1_200,
        effect: UpgradeEffect::VisionRadius(1),
    },
    UpgradeEntry {
        id: "drone_battery",
        name: "Extended Battery",
        role: Role::Drone,
        cost: 1_500,
        effect: UpgradeEffect::MaxBattery(25.0),
    },
    UpgradeEntry {
        id: "drone_hack",
        name: "Efficient Exploits",
        role: Role::Drone,
        cost: 2_000,
        effect: UpgradeEffect::CheaperHack(5.0),
    },
    UpgradeEntry {
        id: "drone_emp",
        name: "Spare EMP",
        role: Role::Drone,
        cost: 1_500,
        effect: UpgradeEffect::EmpCharges(1),
    },
    UpgradeEntry {
        id: "drone_decoy",
        name: "Spare Decoy",
        role: Role::Drone,
        cost: 1_000,
        effect: UpgradeEffect::DecoyCharges(1),
    },
];

pub fn find_upgrade(id: &str) -> Option<&'static UpgradeEntry> {
    CATALOG.iter().find(|entry| entry.id == id)
}

/// Which catalog entries this run has bought. Each id can be bought once.
#[derive(Debug, Clone, Default)]
pub struct UpgradeLedger {
    purchased: BTreeSet<&'static str>,
}

impl UpgradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_purchased(&self, id: &str) -> bool {
        self.purchased.contains(id)
    }

    /// Records a purchase if the id exists, matches `role`, has not been bought
    /// yet and costs at most `available`. Returns the entry on success.
    pub fn purchase(&mut self, id: &str, role: Role, available: u64) -> Option<&'static UpgradeEntry> {
        let entry = find_upgrade(id)?;
        if entry.role != role || self.is_purchased(entry.id) || entry.cost > available {
            return None;
        }
        self.purchased.insert(entry.id);
        Some(entry)
    }

    pub fn clear(&mut self) {
        self.purchased.clear();
    }

    pub fn len(&self) -> usize {
        self.purchased.len()
    }

    pub fn is_empty(&self) -> bool {
        self.purchased.is_empty()
    }

    pub fn catalog_view(&self, available: u64) -> Vec<UpgradeView> {
        CATALOG
            .iter()
            .map(|entry| {
                let purchased = self.is_purchased(entry.id);
                UpgradeView {
                    id: entry.id.to_string(),
                    name: entry.name.to_string(),
                    role: entry.role,
                    cost: entry.cost,
                    purchased,
                    affordable: !purchased && entry.cost <= available,
                }
            })
            .collect()
    }
}
