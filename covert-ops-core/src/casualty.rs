//! Background simulation of soldier risk and reward for operations that
//! resolve without a tactical battle.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{
    COST_UNITS_PER_EXPERIENCE_TIER, EXPERIENCE_JITTER, LAST_SURVIVOR_MAX_DAMAGE,
    LAST_SURVIVOR_MIN_DAMAGE, LATE_GAME_MONTH, MAX_EXPERIENCE_REROLLS, PROTECTION_BASE_ROLL,
    PROTECTION_CRITICAL_PENALTY, PROTECTION_PSI_BONUS, PROTECTION_RANK_OFFSET,
    REACTION_DODGE_FACTOR, SAVED_BRAVERY_CHANCE, SAVED_BRAVERY_THRESHOLD, STAT_ROLL_FLOOR,
    WOUND_DAMAGE_MAX_PER_HIT, WOUND_DAMAGE_MIN_PER_HIT,
};
use crate::difficulty::Difficulty;
use crate::numbers::{ceil_f64_to_i32, len_to_i32, trunc_f64_to_i32};
use crate::operation::SoldierFate;
use crate::rng::RollExt;
use crate::rules::{OperationCategory, RuleCovertOperation, RuleSet};
use crate::soldier::{ReturnToTraining, Soldier, SoldierRole};
use crate::stats::{Stat, StatBlock};

/// Resolution facts the simulation depends on.
#[derive(Debug, Clone, Copy)]
pub struct CasualtyInput<'a> {
    pub rule: &'a RuleCovertOperation,
    pub success: bool,
    pub critical_failure: bool,
    pub difficulty: Difficulty,
    pub has_psi: bool,
    pub month: u32,
}

/// Outcome of one background simulation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CasualtyReport {
    pub experience_rolls: i32,
    pub engaged: bool,
    pub fates: BTreeMap<u32, SoldierFate>,
    pub improvements: BTreeMap<u32, StatBlock>,
    /// Soldiers that must be removed from the campaign.
    pub killed: Vec<u32>,
}

/// Experience budget before the late-game bonus and jitter.
#[must_use]
pub fn base_experience_rolls(costs: i32, exp_factor: i32) -> i32 {
    let rule_cost = costs / COST_UNITS_PER_EXPERIENCE_TIER;
    // The lowest band divides whole tiers, so it rounds down.
    let effective = match rule_cost {
        ..20 => rule_cost / 8,
        20..40 => ceil_f64_to_i32(f64::from(rule_cost) / 8.5),
        40..60 => ceil_f64_to_i32(f64::from(rule_cost) / 9.86),
        60..80 => ceil_f64_to_i32(f64::from(rule_cost) / 11.54),
        _ => ceil_f64_to_i32(f64::from(rule_cost) / 12.52),
    };
    match effective.saturating_mul(exp_factor) / 100 {
        4..=8 => 6,
        9..=12 => 9,
        13.. => 10,
        rolls => rolls,
    }
}

/// Simulate wounds, deaths and experience for `soldiers`.
///
/// Wounds and stat growth are applied to the soldiers directly. Soldiers in
/// [`CasualtyReport::killed`] are still on the roster; the caller removes them.
/// When every participant is doomed one of them is spared at random.
/// Operations without danger leave the squad untouched.
pub fn simulate_casualties<R: Rng + ?Sized>(
    input: &CasualtyInput<'_>,
    rules: &RuleSet,
    soldiers: &mut [&mut Soldier],
    rng: &mut R,
) -> CasualtyReport {
    let mut report = CasualtyReport::default();
    if input.rule.danger <= 0 {
        return report;
    }
    let odds = input.difficulty.odds();
    let mut rolls = base_experience_rolls(input.rule.costs, rules.covert_ops_exp_factor);
    if input.month > LATE_GAME_MONTH {
        rolls += 1;
    }
    rolls += rng.roll_range(-EXPERIENCE_JITTER, EXPERIENCE_JITTER);

    let mut danger = input.rule.danger;
    if !soldiers.is_empty() {
        let stealth: i32 = soldiers.iter().map(|s| s.current[Stat::Stealth]).sum();
        let avg_stealth = stealth / len_to_i32(soldiers.len());
        let mut chance = danger * 10 - avg_stealth;
        if !input.success {
            chance *= 2;
        }
        report.engaged = rng.roll_percent(chance);
    }
    if report.engaged {
        danger = input.difficulty.adjust_danger(danger);
        let penalty = input.difficulty.engaged_experience_penalty();
        if penalty > 0 {
            rolls -= rng.roll_range(0, penalty);
        }
    }
    report.experience_rolls = rolls;
    log::debug!(
        "background simulation for {}: {rolls} experience rolls, engaged {}",
        input.rule.name,
        report.engaged
    );

    let mut doomed: Vec<usize> = Vec::new();
    for (idx, soldier) in soldiers.iter_mut().enumerate() {
        let soldier: &mut Soldier = soldier;
        let mut exp = StatBlock::zero();
        let mut dead = false;
        let mut wounds = 0;

        if report.engaged && danger > 0 {
            let dodge = ceil_f64_to_i32(
                f64::from(soldier.current[Stat::Reactions]) * REACTION_DODGE_FACTOR,
            );
            for _ in 0..danger {
                if rng.roll_range(0, 99) < odds.wound_odds && rng.roll_range(0, 99) >= dodge {
                    wounds += 1;
                }
            }
            let damage = if wounds > 0 {
                rng.roll_range(
                    wounds * WOUND_DAMAGE_MIN_PER_HIT,
                    wounds * WOUND_DAMAGE_MAX_PER_HIT,
                )
            } else {
                0
            };
            if damage < soldier.current[Stat::Health] {
                soldier.set_wound_recovery(damage);
                if damage > 0 {
                    report.fates.insert(soldier.id, SoldierFate::Wounded(damage));
                }
            } else {
                dead = true;
            }
            if !dead && input.critical_failure {
                dead = rng.roll_range(0, 99) < odds.death_odds + danger / 3;
            }
            if dead {
                let mut protection = soldier.best_role_rank().1 - PROTECTION_RANK_OFFSET;
                if input.has_psi {
                    protection += PROTECTION_PSI_BONUS;
                }
                let mut required =
                    rng.roll_range(1, PROTECTION_BASE_ROLL + input.difficulty.coefficient());
                if input.critical_failure {
                    required += PROTECTION_CRITICAL_PENALTY;
                }
                if required > protection {
                    doomed.push(idx);
                } else {
                    dead = false;
                    if soldier.current[Stat::Bravery] <= SAVED_BRAVERY_THRESHOLD
                        || rng.roll_percent(SAVED_BRAVERY_CHANCE)
                    {
                        exp.add(Stat::Bravery, 1);
                    }
                }
            }
        }

        let before = soldier.current;
        let caps = rules.stat_caps(&soldier.kind);
        if !dead && rolls > 0 {
            let mut category_rolls = rolls;
            if report.engaged {
                let spent = roll_combat_experience(
                    &mut exp,
                    &before,
                    &caps,
                    rolls,
                    wounds > 0,
                    input,
                    rules,
                    rng,
                );
                category_rolls = spent / 2;
            } else {
                exp.add(Stat::Stealth, rng.roll_range(1, 4));
                exp.add(Stat::Perception, rng.roll_range(1, 2));
            }
            roll_category_experience(&mut exp, input.rule, category_rolls, rng);
        }

        if !exp.is_empty() {
            soldier.improve_primary_stats(&exp, SoldierRole::Agent, &caps, rng);
            soldier.improve_secondary_stats(&exp, &caps, rng);
            let improvement = soldier.current - before;
            if !improvement.is_empty() {
                report.improvements.insert(soldier.id, improvement);
            }
        }

        if !dead && wounds > 0 {
            soldier.return_to_training = ReturnToTraining::None;
        }
    }

    if !doomed.is_empty() {
        let spared = if doomed.len() == soldiers.len() {
            rng.roll_index(doomed.len())
        } else {
            None
        };
        for (pos, idx) in doomed.into_iter().enumerate() {
            let soldier = &mut soldiers[idx];
            if spared == Some(pos) {
                let health = f64::from(soldier.current[Stat::Health]);
                let damage = rng.roll_range(
                    trunc_f64_to_i32(health * LAST_SURVIVOR_MIN_DAMAGE),
                    trunc_f64_to_i32(health * LAST_SURVIVOR_MAX_DAMAGE),
                );
                soldier.set_wound_recovery(damage);
                soldier.return_to_training = ReturnToTraining::None;
                report.fates.insert(soldier.id, SoldierFate::LastSurvivor(damage));
                log::info!(
                    "every soldier on {} should be dead, {} was chosen to survive",
                    input.rule.name,
                    soldier.name
                );
            } else {
                report.fates.insert(soldier.id, SoldierFate::Killed);
                report.killed.push(soldier.id);
            }
        }
    }

    report
}

/// Random walk over the eight combat slots plus time units and stamina.
///
/// Returns the number of rolls spent, rerolls included.
#[allow(clippy::too_many_arguments)]
fn roll_combat_experience<R: Rng + ?Sized>(
    exp: &mut StatBlock,
    before: &StatBlock,
    caps: &StatBlock,
    rolls: i32,
    wounded: bool,
    input: &CasualtyInput<'_>,
    rules: &RuleSet,
    rng: &mut R,
) -> i32 {
    for stat in [Stat::Tu, Stat::Stamina] {
        if before.below_cap(stat, caps) {
            exp.add(stat, rng.roll_range(STAT_ROLL_FLOOR, rolls));
        }
    }

    let train_psi_skill = before[Stat::PsiSkill] > 0 && input.has_psi;
    let train_psi_strength = train_psi_skill && rules.allow_psi_strength_improvement;
    let train_mana_primary = train_psi_skill && rules.mana_training_primary;
    let train_mana_secondary = rules.mana_training_secondary;

    let mut remaining = rolls;
    let mut rerolls = 0;
    while remaining > 0 {
        remaining -= 1;
        let slot = rng.roll_range(1, 8);
        let mut gain = rng.roll_range(1, 4);
        if gain == 4 {
            gain = 1;
        }
        let mut reroll = false;
        match slot {
            1 => {
                if before.below_cap(Stat::Bravery, caps) && exp[Stat::Bravery] == 0 {
                    let threshold = if wounded { 2 } else { 1 };
                    if rng.roll_range(0, 14) > threshold {
                        exp.add(Stat::Bravery, gain);
                    }
                }
            }
            2..=6 => {
                let stat = match slot {
                    2 => Stat::Reactions,
                    3 => Stat::Firing,
                    4 => Stat::Throwing,
                    5 => Stat::Melee,
                    _ => Stat::Strength,
                };
                if before.below_cap(stat, caps) {
                    exp.add(stat, gain);
                }
            }
            7 => {
                if !train_psi_skill {
                    reroll = true;
                } else if before.below_cap(Stat::PsiSkill, caps) {
                    exp.add(Stat::PsiSkill, gain);
                    if train_psi_strength && before.below_cap(Stat::PsiStrength, caps) {
                        exp.add(Stat::PsiStrength, gain);
                    }
                    if train_mana_primary && before.below_cap(Stat::Mana, caps) {
                        exp.add(Stat::Mana, gain);
                    }
                }
            }
            _ => {
                if !train_mana_secondary {
                    reroll = true;
                } else if before.below_cap(Stat::Mana, caps) {
                    exp.add(Stat::Mana, gain);
                }
            }
        }
        if reroll && rerolls < MAX_EXPERIENCE_REROLLS {
            rerolls += 1;
            remaining += 1;
        }
    }
    rolls + rerolls
}

fn roll_category_experience<R: Rng + ?Sized>(
    exp: &mut StatBlock,
    rule: &RuleCovertOperation,
    rolls: i32,
    rng: &mut R,
) {
    let minor = (rolls / 2).max(1);
    let social = trunc_f64_to_i32(f64::from(rolls) * 1.5).max(3);
    if rule.has_category(OperationCategory::Investigation) {
        exp.add(Stat::Investigation, rng.roll_range(1, rolls.max(2)));
        exp.add(Stat::Perception, rng.roll_range(0, minor));
        exp.add(Stat::Interrogation, rng.roll_range(0, minor));
    }
    if rule.has_category(OperationCategory::Infiltration) {
        exp.add(Stat::Stealth, rng.roll_range(1, rolls.max(2)));
        exp.add(Stat::Perception, rng.roll_range(0, minor));
        exp.add(Stat::Interrogation, rng.roll_range(0, minor));
    }
    if rule.has_category(OperationCategory::Negotiation) {
        exp.add(Stat::Charisma, rng.roll_range(1, social));
    }
    if rule.has_category(OperationCategory::Deception) {
        exp.add(Stat::Deception, rng.roll_range(1, social));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rule(danger: i32, costs: i32) -> RuleCovertOperation {
        serde_json::from_value(serde_json::json!({
            "name": "STR_RAID",
            "danger": danger,
            "costs": costs,
            "categories": ["infiltration"],
        }))
        .expect("rule")
    }

    fn squad(size: u32, health: i32) -> Vec<Soldier> {
        (1..=size)
            .map(|id| {
                Soldier::new(
                    id,
                    format!("Agent {id}"),
                    "STR_AGENT",
                    StatBlock::splat(30).with(Stat::Health, health).with(Stat::Stealth, 0),
                )
            })
            .collect()
    }

    fn input(rule: &RuleCovertOperation, critical: bool) -> CasualtyInput<'_> {
        CasualtyInput {
            rule,
            success: false,
            critical_failure: critical,
            difficulty: Difficulty::Superhuman,
            has_psi: false,
            month: 30,
        }
    }

    #[test]
    fn experience_budget_bands() {
        assert_eq!(base_experience_rolls(0, 100), 0);
        assert_eq!(base_experience_rolls(100, 100), 0);
        assert_eq!(base_experience_rolls(200, 100), 1);
        assert_eq!(base_experience_rolls(300, 100), 1);
        assert_eq!(base_experience_rolls(400, 100), 3);
        assert_eq!(base_experience_rolls(2_000, 100), 6);
        assert_eq!(base_experience_rolls(2_000, 150), 9);
        assert_eq!(base_experience_rolls(2_000, 300), 10);
    }

    #[test]
    fn lethal_operations_always_leave_a_survivor() {
        let rule = rule(10, 2_000);
        for seed in 0..200 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut roster = squad(3, 5);
            let mut refs: Vec<&mut Soldier> = roster.iter_mut().collect();
            let report =
                simulate_casualties(&input(&rule, true), &RuleSet::default(), &mut refs, &mut rng);
            assert!(report.engaged, "seed {seed} should engage");
            assert!(report.killed.len() < 3, "seed {seed} wiped the squad");
            let spared = report
                .fates
                .values()
                .filter(|fate| matches!(fate, SoldierFate::LastSurvivor(_)))
                .count();
            if spared > 0 {
                assert_eq!(spared, 1);
                assert_eq!(report.killed.len(), 2);
            }
        }
    }

    #[test]
    fn lone_doomed_soldier_is_spared() {
        let rule = rule(10, 2_000);
        let mut spared = 0;
        for seed in 0..50 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut roster = squad(1, 1);
            let mut refs: Vec<&mut Soldier> = roster.iter_mut().collect();
            let report =
                simulate_casualties(&input(&rule, true), &RuleSet::default(), &mut refs, &mut rng);
            assert!(report.killed.is_empty());
            if let Some(fate) = report.fates.get(&1) {
                assert!(matches!(fate, SoldierFate::LastSurvivor(_)));
                spared += 1;
            }
        }
        assert!(spared > 40);
    }

    #[test]
    fn safe_operations_change_nothing() {
        let rule = rule(0, 2_000);
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let mut roster = squad(2, 50);
        let before = roster.clone();
        let mut refs: Vec<&mut Soldier> = roster.iter_mut().collect();
        let critical = input(&rule, true);
        let report = simulate_casualties(&critical, &RuleSet::default(), &mut refs, &mut rng);
        assert!(!report.engaged);
        assert!(report.fates.is_empty());
        assert!(report.improvements.is_empty());
        assert_eq!(roster, before);
    }

    #[test]
    fn unnoticed_squads_only_train() {
        let rule = rule(1, 2_000);
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let mut roster = squad(2, 50);
        for soldier in &mut roster {
            soldier.current[Stat::Stealth] = 30;
        }
        let before = roster.clone();
        let mut refs: Vec<&mut Soldier> = roster.iter_mut().collect();
        let mut quiet = input(&rule, false);
        quiet.success = true;
        let report = simulate_casualties(&quiet, &RuleSet::default(), &mut refs, &mut rng);
        assert!(!report.engaged);
        assert!(report.fates.is_empty());
        for (after, before) in roster.iter().zip(&before) {
            assert!(after.current[Stat::Stealth] >= before.current[Stat::Stealth]);
            assert_eq!(after.current[Stat::Firing], before.current[Stat::Firing]);
            assert_eq!(after.wound_recovery(), 0);
        }
    }

    #[test]
    fn combat_experience_reports_rerolls() {
        let rule = rule(3, 2_000);
        let engaged = input(&rule, false);
        let caps = StatBlock::splat(100);
        let before = StatBlock::splat(30);
        let mut extended = 0;
        for seed in 0..40 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut exp = StatBlock::zero();
            let spent = roll_combat_experience(
                &mut exp,
                &before,
                &caps,
                12,
                false,
                &engaged,
                &RuleSet::default(),
                &mut rng,
            );
            assert!((12..=12 + MAX_EXPERIENCE_REROLLS).contains(&spent));
            if spent > 12 {
                extended += 1;
            }
        }
        // Without psi or mana training two of eight slots always reroll.
        assert!(extended > 20, "only {extended} runs rerolled");
    }

    #[test]
    fn stats_never_exceed_caps() {
        let rule = rule(3, 2_000);
        let rules = RuleSet {
            default_stat_caps: StatBlock::splat(32).with(Stat::Health, 200),
            ..RuleSet::default()
        };
        for seed in 0..50 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut roster = squad(4, 150);
            let mut refs: Vec<&mut Soldier> = roster.iter_mut().collect();
            let mut engaged = input(&rule, false);
            engaged.difficulty = Difficulty::Beginner;
            simulate_casualties(&engaged, &rules, &mut refs, &mut rng);
            for soldier in &roster {
                for (stat, value) in soldier.current.iter() {
                    if stat != Stat::Health {
                        assert!(value <= 32, "{stat} = {value}");
                    }
                }
            }
        }
    }
}
