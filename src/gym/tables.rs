//! Compiled-in game balance tables.
//!
//! Everything numeric about the economy lives here: inspector and protection tiers, the two
//! inspection modes, dumbbell and coach ladders, hall pricing, transfer fees and clan costs.
//! [`GameTables::standard`] is built once at startup and shared as `Arc<GameTables>`; no
//! service reads these numbers from anywhere else.

use std::collections::BTreeMap;

use crate::gym::errors::GymError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorTier {
    pub level: u8,
    pub price: i64,
    pub min_damage: u32,
    pub max_damage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionTier {
    pub level: u8,
    pub name: &'static str,
    /// Charged once to unlock the tier and again on every activation.
    pub price: i64,
    pub duration_minutes: i64,
    /// Percent chance (1..=100) to block an inspection.
    pub chance: u8,
    /// Highest inspector tier this protection can block.
    pub max_inspector_level: u8,
}

/// Rules that switch with the global inspection-time mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSettings {
    pub cooldown_minutes: i64,
    pub daily_limit: u32,
    pub compensation_per_hall: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumbbellLevel {
    pub level: u8,
    pub name: String,
    pub weight_kg: u32,
    pub price: i64,
    pub income_per_lift: i64,
    pub power_per_lift: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoachLevel {
    pub level: u8,
    pub name: &'static str,
    pub price: i64,
    pub min_income: i64,
    pub max_income: i64,
    pub bonus_chance: u8,
    pub bonus_halls: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HallRules {
    pub start_price: i64,
    pub price_step: i64,
    pub daily_purchase_limit: u32,
    pub daily_income: i64,
}

impl HallRules {
    /// Price of `count` halls bought in one go: arithmetic series from `start_price`.
    pub fn price_for(&self, count: u32) -> i64 {
        let n = count as i64;
        n * (2 * self.start_price + (n - 1) * self.price_step) / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRules {
    pub min_amount: i64,
    pub commission_percent: i64,
    pub min_commission: i64,
}

impl TransferRules {
    /// Fee burned on a transfer of `amount`; `None` if the amount is too large to price.
    pub fn commission_for(&self, amount: i64) -> Option<i64> {
        let fee = amount.checked_mul(self.commission_percent)? / 100;
        Some(fee.max(self.min_commission))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClanRules {
    pub create_cost: i64,
    pub max_level: u8,
    pub upgrade_cost_per_level: i64,
    pub base_member_limit: u32,
    pub members_per_level: u32,
}

/// Level-derived clan bonuses. All of them are the level itself or affine in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClanBonuses {
    pub lift_bonus_coins: i64,
    pub hall_income_bonus: i64,
    pub player_lift_bonus: i64,
    pub member_limit: u32,
}

impl ClanRules {
    pub fn bonuses(&self, level: u8) -> ClanBonuses {
        let level = level.clamp(1, self.max_level);
        ClanBonuses {
            lift_bonus_coins: level as i64,
            hall_income_bonus: level as i64,
            player_lift_bonus: level as i64,
            member_limit: self.base_member_limit + self.members_per_level * level as u32,
        }
    }

    pub fn upgrade_cost(&self, current_level: u8) -> i64 {
        self.upgrade_cost_per_level * current_level as i64
    }
}

#[derive(Debug, Clone)]
pub struct GameTables {
    pub inspectors: BTreeMap<u8, InspectorTier>,
    pub protections: BTreeMap<u8, ProtectionTier>,
    pub normal_mode: ModeSettings,
    pub inspection_time_mode: ModeSettings,
    pub dumbbells: BTreeMap<u8, DumbbellLevel>,
    pub coaches: BTreeMap<u8, CoachLevel>,
    pub halls: HallRules,
    pub transfer: TransferRules,
    pub clans: ClanRules,
    pub starting_balance: i64,
    pub lift_cooldown_secs: i64,
    pub training_cooldown_minutes: i64,
}

// (level, price, min, max)
const INSPECTORS: [(u8, i64, u32, u32); 5] = [
    (1, 3, 0, 1),
    (2, 6, 1, 2),
    (3, 15, 3, 5),
    (4, 50, 5, 7),
    (5, 100, 8, 10),
];

// (level, name, price, minutes, chance, max inspector level)
const PROTECTIONS: [(u8, &str, i64, i64, u8, u8); 5] = [
    (1, "Tidy up every hall", 35, 15, 10, 2),
    (2, "Bribery rumours", 75, 30, 15, 3),
    (3, "Everything is by the book", 100, 30, 20, 4),
    (4, "Outbid the other side", 175, 60, 40, 5),
    (5, "Friends at the prosecutor's office", 350, 60, 100, 5),
];

// (weight kg, upgrade price)
const DUMBBELLS: [(u32, i64); 20] = [
    (1, 0),
    (2, 50),
    (3, 120),
    (5, 250),
    (7, 500),
    (10, 900),
    (12, 1_500),
    (15, 2_500),
    (20, 4_000),
    (25, 6_000),
    (30, 9_000),
    (40, 13_000),
    (50, 18_000),
    (60, 25_000),
    (70, 35_000),
    (80, 50_000),
    (100, 70_000),
    (120, 100_000),
    (150, 140_000),
    (200, 200_000),
];

// (level, name, price, min, max, bonus chance, bonus halls)
const COACHES: [(u8, &str, i64, i64, i64, u8, u32); 10] = [
    (1, "Intern coach", 500, 5, 15, 1, 1),
    (2, "Junior coach", 1_500, 10, 30, 2, 1),
    (3, "Coach", 4_000, 20, 60, 3, 1),
    (4, "Senior coach", 9_000, 40, 110, 4, 2),
    (5, "Head coach", 18_000, 70, 180, 5, 2),
    (6, "Master of sport", 35_000, 120, 300, 6, 2),
    (7, "Honoured coach", 60_000, 200, 480, 7, 3),
    (8, "National team coach", 100_000, 320, 750, 8, 3),
    (9, "Olympic coach", 160_000, 500, 1_100, 9, 4),
    (10, "Legend", 250_000, 800, 1_600, 10, 5),
];

fn dumbbell_name(level: u8, weight_kg: u32) -> String {
    let equipment = match level {
        1..=10 => "Dumbbell",
        11..=15 => "Barbell",
        _ => "Deadlift bar",
    };
    format!("{} {}kg", equipment, weight_kg)
}

impl GameTables {
    pub fn standard() -> Self {
        let inspectors = INSPECTORS
            .iter()
            .map(|&(level, price, min_damage, max_damage)| {
                (
                    level,
                    InspectorTier {
                        level,
                        price,
                        min_damage,
                        max_damage,
                    },
                )
            })
            .collect();
        let protections = PROTECTIONS
            .iter()
            .map(|&(level, name, price, duration_minutes, chance, max_inspector_level)| {
                (
                    level,
                    ProtectionTier {
                        level,
                        name,
                        price,
                        duration_minutes,
                        chance,
                        max_inspector_level,
                    },
                )
            })
            .collect();
        let dumbbells = DUMBBELLS
            .iter()
            .enumerate()
            .map(|(idx, &(weight_kg, price))| {
                let level = idx as u8 + 1;
                (
                    level,
                    DumbbellLevel {
                        level,
                        name: dumbbell_name(level, weight_kg),
                        weight_kg,
                        price,
                        income_per_lift: level as i64,
                        power_per_lift: level as i64,
                    },
                )
            })
            .collect();
        let coaches = COACHES
            .iter()
            .map(|&(level, name, price, min_income, max_income, bonus_chance, bonus_halls)| {
                (
                    level,
                    CoachLevel {
                        level,
                        name,
                        price,
                        min_income,
                        max_income,
                        bonus_chance,
                        bonus_halls,
                    },
                )
            })
            .collect();

        Self {
            inspectors,
            protections,
            normal_mode: ModeSettings {
                cooldown_minutes: 60,
                daily_limit: 10,
                compensation_per_hall: 3,
            },
            inspection_time_mode: ModeSettings {
                cooldown_minutes: 30,
                daily_limit: 24,
                compensation_per_hall: 6,
            },
            dumbbells,
            coaches,
            halls: HallRules {
                start_price: 35,
                price_step: 5,
                daily_purchase_limit: 100,
                daily_income: 10,
            },
            transfer: TransferRules {
                min_amount: 10,
                commission_percent: 5,
                min_commission: 1,
            },
            clans: ClanRules {
                create_cost: 5_000,
                max_level: 100,
                upgrade_cost_per_level: 1_000,
                base_member_limit: 10,
                members_per_level: 2,
            },
            starting_balance: 1,
            lift_cooldown_secs: 30,
            training_cooldown_minutes: 60,
        }
    }

    pub fn mode(&self, inspection_time: bool) -> ModeSettings {
        if inspection_time {
            self.inspection_time_mode
        } else {
            self.normal_mode
        }
    }

    pub fn inspector(&self, level: u8) -> Result<&InspectorTier, GymError> {
        self.inspectors.get(&level).ok_or(GymError::UnknownLevel {
            kind: "inspector",
            level,
        })
    }

    pub fn protection(&self, level: u8) -> Result<&ProtectionTier, GymError> {
        self.protections.get(&level).ok_or(GymError::UnknownLevel {
            kind: "protection",
            level,
        })
    }

    pub fn dumbbell(&self, level: u8) -> Result<&DumbbellLevel, GymError> {
        self.dumbbells.get(&level).ok_or(GymError::UnknownLevel {
            kind: "dumbbell",
            level,
        })
    }

    pub fn coach(&self, level: u8) -> Result<&CoachLevel, GymError> {
        self.coaches.get(&level).ok_or(GymError::UnknownLevel {
            kind: "coach",
            level,
        })
    }
}

impl Default for GameTables {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hall_price_is_arithmetic_series() {
        let rules = GameTables::standard().halls;
        assert_eq!(rules.price_for(1), 35);
        assert_eq!(rules.price_for(2), 35 + 40);
        assert_eq!(rules.price_for(10), 575);
    }

    #[test]
    fn commission_has_floor() {
        let rules = GameTables::standard().transfer;
        assert_eq!(rules.commission_for(10), Some(1));
        assert_eq!(rules.commission_for(1_000), Some(50));
        assert_eq!(rules.commission_for(i64::MAX), None);
    }

    #[test]
    fn clan_bonuses_clamp_level() {
        let rules = GameTables::standard().clans;
        assert_eq!(rules.bonuses(0).lift_bonus_coins, 1);
        assert_eq!(rules.bonuses(250).member_limit, 10 + 200);
        assert_eq!(rules.bonuses(7).hall_income_bonus, 7);
    }

    #[test]
    fn ladders_are_complete() {
        let tables = GameTables::standard();
        assert_eq!(tables.dumbbells.len(), 20);
        assert_eq!(tables.coaches.len(), 10);
        assert_eq!(tables.dumbbell(1).map(|d| d.name.as_str()).ok(), Some("Dumbbell 1kg"));
        assert!(tables.inspector(6).is_err());
        for (level, tier) in &tables.protections {
            assert!(tier.chance <= 100, "protection {} chance out of range", level);
        }
    }
}
