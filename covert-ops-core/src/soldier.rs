//! Soldier records touched by covert operations: stats, roles, wounds.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::numbers::{ceil_f64_to_i32, i32_to_f32};
use crate::rng::RollExt;
use crate::stats::{Stat, StatBlock, StatCategory};

/// Career track a soldier can hold ranks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoldierRole {
    Soldier,
    Pilot,
    Agent,
    Scientist,
    Engineer,
}

/// First sprite index of each role's rank badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RankSpriteTable {
    #[serde(default)]
    pub soldier: i32,
    #[serde(default)]
    pub pilot: i32,
    #[serde(default)]
    pub agent: i32,
    #[serde(default)]
    pub scientist: i32,
    #[serde(default)]
    pub engineer: i32,
}

impl RankSpriteTable {
    #[must_use]
    pub const fn offset(&self, role: SoldierRole) -> i32 {
        match role {
            SoldierRole::Soldier => self.soldier,
            SoldierRole::Pilot => self.pilot,
            SoldierRole::Agent => self.agent,
            SoldierRole::Scientist => self.scientist,
            SoldierRole::Engineer => self.engineer,
        }
    }
}

/// Rank and accumulated experience within one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRank {
    pub role: SoldierRole,
    pub rank: i32,
    #[serde(default)]
    pub experience: i32,
}

/// Which training a soldier goes back to once an operation releases them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnToTraining {
    #[default]
    None,
    Martial,
    Psi,
    Both,
}

impl ReturnToTraining {
    #[must_use]
    pub const fn martial(self) -> bool {
        matches!(self, Self::Martial | Self::Both)
    }

    #[must_use]
    pub const fn psi(self) -> bool {
        matches!(self, Self::Psi | Self::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Soldier {
    pub id: u32,
    pub name: String,
    /// Soldier rule type; resolves stat caps.
    pub kind: String,
    pub current: StatBlock,
    #[serde(default)]
    pub initial: StatBlock,
    #[serde(default)]
    wound_recovery: f32,
    #[serde(default)]
    health_missing: i32,
    #[serde(default)]
    mana_missing: i32,
    #[serde(default)]
    pub roles: Vec<RoleRank>,
    /// Id of the covert operation this soldier is assigned to.
    #[serde(default)]
    pub assignment: Option<u32>,
    #[serde(default)]
    pub in_training: bool,
    #[serde(default)]
    pub in_psi_training: bool,
    #[serde(default)]
    pub return_to_training: ReturnToTraining,
}

impl Soldier {
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, kind: impl Into<String>, stats: StatBlock) -> Self {
        Self {
            id,
            name: name.into(),
            kind: kind.into(),
            current: stats,
            initial: stats,
            wound_recovery: 0.0,
            health_missing: 0,
            mana_missing: 0,
            roles: Vec::new(),
            assignment: None,
            in_training: false,
            in_psi_training: false,
            return_to_training: ReturnToTraining::None,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: SoldierRole, rank: i32) -> Self {
        self.add_role(role, rank);
        self
    }

    /// Days until wounds are healed.
    #[must_use]
    pub fn wound_recovery(&self) -> i32 {
        ceil_f64_to_i32(f64::from(self.wound_recovery))
    }

    pub fn set_wound_recovery(&mut self, days: i32) {
        self.wound_recovery = i32_to_f32(days.max(0));
    }

    /// Heal one day of wounds with optional sick bay bonuses.
    pub fn heal_wound(&mut self, abs_bonus: f32, rel_bonus: f32) {
        let health = i32_to_f32(self.current[Stat::Health]);
        self.wound_recovery -= 1.0 + abs_bonus + rel_bonus * health * 0.01;
        if self.wound_recovery < 0.0 {
            self.wound_recovery = 0.0;
        }
    }

    #[must_use]
    pub const fn health_missing(&self) -> i32 {
        self.health_missing
    }

    pub fn set_health_missing(&mut self, value: i32) {
        self.health_missing = value.max(0);
    }

    #[must_use]
    pub const fn mana_missing(&self) -> i32 {
        self.mana_missing
    }

    pub fn set_mana_missing(&mut self, value: i32) {
        self.mana_missing = value.max(0);
    }

    #[must_use]
    pub fn is_wounded(&self) -> bool {
        self.wound_recovery > 0.0 || self.health_missing > 0
    }

    pub fn add_role(&mut self, role: SoldierRole, rank: i32) {
        if let Some(entry) = self.roles.iter_mut().find(|r| r.role == role) {
            entry.rank += rank;
        } else {
            self.roles.push(RoleRank {
                role,
                rank,
                experience: 0,
            });
        }
    }

    pub fn add_experience(&mut self, role: SoldierRole, exp: i32) {
        if let Some(entry) = self.roles.iter_mut().find(|r| r.role == role) {
            entry.experience += exp;
        } else {
            self.roles.push(RoleRank {
                role,
                rank: 0,
                experience: exp,
            });
        }
    }

    #[must_use]
    pub fn role_rank(&self, role: SoldierRole) -> i32 {
        self.roles
            .iter()
            .find(|r| r.role == role)
            .map_or(0, |r| r.rank)
    }

    #[must_use]
    pub fn role_experience(&self, role: SoldierRole) -> i32 {
        self.roles
            .iter()
            .find(|r| r.role == role)
            .map_or(0, |r| r.experience)
    }

    /// Highest rank held in any role; a soldier without roles is a rank 0 soldier.
    #[must_use]
    pub fn best_role_rank(&self) -> (SoldierRole, i32) {
        let mut best: Option<(SoldierRole, i32)> = None;
        for entry in &self.roles {
            if best.is_none_or(|(_, rank)| entry.rank > rank) {
                best = Some((entry.role, entry.rank));
            }
        }
        best.unwrap_or((SoldierRole::Soldier, 0))
    }

    #[must_use]
    pub fn role_rank_sprite(&self, role: SoldierRole, table: &RankSpriteTable) -> i32 {
        table.offset(role) + self.role_rank(role) - 1
    }

    /// Apply combat and covert experience, crediting role experience along the way.
    pub fn improve_primary_stats<R: Rng + ?Sized>(
        &mut self,
        exp: &StatBlock,
        role: SoldierRole,
        caps: &StatBlock,
        rng: &mut R,
    ) {
        for stat in Stat::ALL {
            let points = exp[stat];
            if points == 0 || !self.current.below_cap(stat, caps) {
                continue;
            }
            match stat.category() {
                StatCategory::Secondary => continue,
                StatCategory::Combat if stat == Stat::Bravery => {
                    let (gain, _) = improve_stat(points, true, rng);
                    self.current.add(stat, gain);
                    let credited = match role {
                        SoldierRole::Soldier | SoldierRole::Agent | SoldierRole::Pilot => role,
                        _ => SoldierRole::Soldier,
                    };
                    self.add_experience(credited, 1);
                }
                StatCategory::Combat => {
                    let (gain, rate) = improve_stat(points, false, rng);
                    self.current.add(stat, gain);
                    let credited = match role {
                        SoldierRole::Soldier | SoldierRole::Agent => role,
                        _ => SoldierRole::Soldier,
                    };
                    self.add_experience(credited, rate);
                }
                StatCategory::Covert => {
                    let (gain, rate) = improve_stat(points, false, rng);
                    self.current.add(stat, gain);
                    self.add_experience(SoldierRole::Agent, rate);
                }
            }
        }
        self.current.clamp_to(caps);
    }

    /// Apply time-unit, stamina and health experience.
    pub fn improve_secondary_stats<R: Rng + ?Sized>(
        &mut self,
        exp: &StatBlock,
        caps: &StatBlock,
        rng: &mut R,
    ) {
        for stat in Stat::ALL {
            if stat.category() != StatCategory::Secondary {
                continue;
            }
            let (gain, _) = improve_stat(exp[stat], false, rng);
            self.current.add(stat, gain);
        }
        self.current.clamp_to(caps);
    }
}

/// Stat growth for `exp` experience points, with the role experience rate it earns.
pub fn improve_stat<R: Rng + ?Sized>(exp: i32, bravery: bool, rng: &mut R) -> (i32, i32) {
    if bravery && exp > rng.roll_range(0, 10) {
        return (10, 1);
    }
    if exp > 10 {
        (rng.roll_range(2, 6), 3)
    } else if exp > 5 {
        (rng.roll_range(1, 4), 2)
    } else if exp > 2 {
        (rng.roll_range(1, 3), 1)
    } else if exp > 0 {
        let gain = rng.roll_range(0, 1);
        (gain, gain)
    } else {
        (0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn recruit() -> Soldier {
        Soldier::new(
            1,
            "Ada Vance",
            "STR_AGENT",
            StatBlock::zero()
                .with(Stat::Health, 40)
                .with(Stat::Firing, 50)
                .with(Stat::Stealth, 20),
        )
    }

    #[test]
    fn counters_never_go_negative() {
        let mut soldier = recruit();
        soldier.set_health_missing(-4);
        soldier.set_mana_missing(-1);
        soldier.set_wound_recovery(-3);
        assert_eq!(soldier.health_missing(), 0);
        assert_eq!(soldier.mana_missing(), 0);
        assert_eq!(soldier.wound_recovery(), 0);
        assert!(!soldier.is_wounded());

        soldier.set_wound_recovery(2);
        soldier.heal_wound(0.0, 0.0);
        soldier.heal_wound(5.0, 0.0);
        assert_eq!(soldier.wound_recovery(), 0);
    }

    #[test]
    fn sick_bay_bonus_scales_with_health() {
        let mut soldier = recruit();
        soldier.set_wound_recovery(12);
        soldier.heal_wound(0.0, 10.0);
        assert_eq!(soldier.wound_recovery(), 7);
        soldier.heal_wound(0.5, 0.0);
        assert_eq!(soldier.wound_recovery(), 6);
    }

    #[test]
    fn best_role_rank_prefers_highest() {
        let soldier = recruit()
            .with_role(SoldierRole::Soldier, 1)
            .with_role(SoldierRole::Agent, 4)
            .with_role(SoldierRole::Pilot, 2);
        assert_eq!(soldier.best_role_rank(), (SoldierRole::Agent, 4));
        assert_eq!(recruit().best_role_rank(), (SoldierRole::Soldier, 0));
    }

    #[test]
    fn rank_sprite_uses_role_offset() {
        let table = RankSpriteTable {
            soldier: 0,
            pilot: 10,
            agent: 20,
            scientist: 30,
            engineer: 40,
        };
        let soldier = recruit().with_role(SoldierRole::Agent, 3);
        assert_eq!(soldier.role_rank_sprite(SoldierRole::Agent, &table), 22);
        assert_eq!(soldier.role_rank_sprite(SoldierRole::Engineer, &table), 39);
    }

    #[test]
    fn improve_stat_follows_steps() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        for _ in 0..200 {
            let (gain, rate) = improve_stat(12, false, &mut rng);
            assert!((2..=6).contains(&gain));
            assert_eq!(rate, 3);
            assert_eq!(improve_stat(0, false, &mut rng), (0, 0));
            assert_eq!(improve_stat(-3, false, &mut rng), (0, 0));
            let (gain, _) = improve_stat(1, false, &mut rng);
            assert!((0..=1).contains(&gain));
        }
    }

    #[test]
    fn primary_improvement_respects_caps_and_credits_agent() {
        let mut rng = ChaCha20Rng::seed_from_u64(17);
        let caps = StatBlock::splat(52);
        let mut soldier = recruit();
        let exp = StatBlock::zero()
            .with(Stat::Firing, 12)
            .with(Stat::Stealth, 12);
        soldier.improve_primary_stats(&exp, SoldierRole::Agent, &caps, &mut rng);
        assert!(soldier.current[Stat::Firing] <= 52);
        assert!(soldier.current[Stat::Stealth] > 20);
        assert!(soldier.role_experience(SoldierRole::Agent) >= 6);
    }
}
