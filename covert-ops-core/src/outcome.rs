//! Outcome resolution: turns the final roll of an operation into rewards,
//! penalties, follow-on missions and either a battle request or a background
//! simulation.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::BattleRequest;
use crate::campaign::CampaignContext;
use crate::casualty::{CasualtyInput, simulate_casualties};
use crate::constants::{
    CRITICAL_FAILURE_SCORE_PENALTY, CRITICAL_TRAP_BONUS, MSG_ALIEN_BASE_REVEALED,
    MSG_NEW_DATA_ACQUIRED, OUTCOME_ROLL_MAX,
};
use crate::loyalty::{LoyaltySource, update_loyalty};
use crate::mission::place_alien_mission;
use crate::operation::{Operation, OperationReport, OperationResults};
use crate::reputation::apply_reputation_delta;
use crate::rng::RollExt;
use crate::rules::{RuleCovertOperation, RuleOutcomeBranch, RulesError};
use crate::soldier::Soldier;

/// Success and critical failure read off a single roll.
///
/// Both flags are evaluated independently: `success` is `chance > roll`,
/// `critical_failure` is `roll > chance + margin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRoll {
    pub roll: i32,
    pub success: bool,
    pub critical_failure: bool,
}

impl OutcomeRoll {
    #[must_use]
    pub const fn evaluate(roll: i32, success_chance: i32, critical_fail_margin: i32) -> Self {
        Self {
            roll,
            success: success_chance > roll,
            critical_failure: roll > success_chance.saturating_add(critical_fail_margin),
        }
    }

    /// Draw a fresh outcome roll in `[0, 99]`.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> i32 {
        rng.roll_range(0, OUTCOME_ROLL_MAX)
    }
}

/// Summary of a resolution returned to the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: OutcomeRoll,
    /// Deployment handed to the battle subsystem, if any.
    pub battle: Option<String>,
}

/// Resolve `op` with a given outcome roll.
///
/// Runs at most once per operation; calling it on a resolved operation returns
/// the stored outcome without changing anything.
///
/// # Errors
///
/// Fails when the operation rule or anything its chosen branch references
/// (mission, region, race, deployment, research, event, item) is undefined.
pub fn resolve_with_roll<R: Rng + ?Sized>(
    op: &mut Operation,
    ctx: &mut CampaignContext<'_, R>,
    roll: i32,
) -> Result<Resolution, RulesError> {
    if let Some(results) = op.results() {
        return Ok(Resolution {
            outcome: OutcomeRoll {
                roll: results.roll,
                success: results.success,
                critical_failure: results.critical_failure,
            },
            battle: results
                .battle_requested
                .then(|| results.deployment.clone())
                .flatten(),
        });
    }

    let rules = ctx.rules;
    let rule = rules.operation(&op.rule)?;
    let odds = ctx.state.difficulty.odds();
    let outcome = OutcomeRoll::evaluate(roll, op.success_chance, odds.critical_fail_margin);
    let branch = if outcome.success {
        &rule.success
    } else {
        &rule.failure
    };
    log::debug!(
        "resolving {} #{}: roll {roll} vs {} (success {}, critical {})",
        rule.name,
        op.id,
        op.success_chance,
        outcome.success,
        outcome.critical_failure
    );

    let mut results = OperationResults {
        operation: rule.name.clone(),
        day: ctx.state.day,
        roll,
        success: outcome.success,
        critical_failure: outcome.critical_failure,
        ..OperationResults::default()
    };

    apply_score_and_funds(ctx, branch, &outcome, &mut results);
    stage_reward_items(op, ctx, rule, branch, &mut results)?;
    if let Some(event) = &branch.event {
        rules.require_event(&rule.name, event)?;
        ctx.state.spawn_event(event);
        results.event = Some(event.clone());
    }
    unlock_research(ctx, &rule.name, &branch.research, &mut results)?;
    for (faction, delta) in &branch.reputation {
        if apply_reputation_delta(&mut ctx.state.factions, faction, *delta, &rules.reputation_levels)
        {
            results.reputation.insert(faction.clone(), *delta);
        }
    }

    let remove_required = if outcome.success {
        rule.remove_required_items_on_success
    } else {
        rule.remove_required_items_on_failure
    };
    if remove_required {
        for (item, qty) in &rule.required_items {
            op.items.remove(item, *qty);
        }
    }

    if let Some(mission) = branch.missions.choose(ctx.rng) {
        let anchor = ctx.state.base(&op.base).map(|base| base.region.clone());
        let placement = place_alien_mission(ctx, &rule.name, mission, anchor.as_deref())?;
        results.mission = Some(placement);
    }

    if let Some(deployment) = &rule.reveal_alien_base {
        for base in ctx
            .state
            .alien_bases
            .iter_mut()
            .filter(|base| &base.deployment == deployment)
        {
            base.discovered = true;
            results.special_message = Some(MSG_ALIEN_BASE_REVEALED.to_string());
        }
    }

    let mut battle = None;
    if let Some(deployment) = branch.deployments.choose(ctx.rng) {
        if !rules.has_deployment(deployment) {
            return Err(RulesError::UnknownDeployment {
                operation: rule.name.clone(),
                deployment: deployment.to_string(),
            });
        }
        let enter = outcome.success || {
            let mut trap = rule.trap_chance;
            if outcome.critical_failure && trap > 0 {
                trap += CRITICAL_TRAP_BONUS;
            }
            ctx.rng.roll_percent(trap)
        };
        results.deployment = Some(deployment.to_string());
        if enter && !op.in_battlescape() {
            op.mark_battle();
            results.battle_requested = true;
            ctx.state.pending_battles.push(BattleRequest {
                base: op.base.clone(),
                operation: op.id,
                operation_name: rule.name.clone(),
                deployment: deployment.to_string(),
                soldiers: op.soldiers.clone(),
            });
            log::debug!("{} #{} requests battle {deployment}", rule.name, op.id);
            battle = Some(deployment.to_string());
        }
    }

    if battle.is_none() {
        run_background_path(op, ctx, rule, &outcome, &mut results);
    }

    op.store_results(results);
    op.mark_over();
    Ok(Resolution { outcome, battle })
}

fn apply_score_and_funds<R: Rng + ?Sized>(
    ctx: &mut CampaignContext<'_, R>,
    branch: &RuleOutcomeBranch,
    outcome: &OutcomeRoll,
    results: &mut OperationResults,
) {
    let mut score = branch.score;
    if !outcome.success && outcome.critical_failure {
        score -= CRITICAL_FAILURE_SCORE_PENALTY;
    }
    let coefficients = ctx.rules.loyalty;
    if score != 0 {
        ctx.state.add_score(score);
        results.score = score;
        results.loyalty_change +=
            update_loyalty(&mut ctx.state.loyalty, &coefficients, score, LoyaltySource::Geoscape);
    }
    if branch.loyalty != 0 {
        results.loyalty_change += update_loyalty(
            &mut ctx.state.loyalty,
            &coefficients,
            branch.loyalty,
            LoyaltySource::Absolute,
        );
    }
    if branch.funds != 0 {
        ctx.state.funds += branch.funds;
        results.funds = branch.funds;
    }
}

fn stage_reward_items<R: Rng + ?Sized>(
    op: &mut Operation,
    ctx: &mut CampaignContext<'_, R>,
    rule: &RuleCovertOperation,
    branch: &RuleOutcomeBranch,
    results: &mut OperationResults,
) -> Result<(), RulesError> {
    let weighted = branch.weighted_item.choose(ctx.rng).map(|item| (item, 1));
    let flat = branch.items.iter().map(|(item, qty)| (item.as_str(), *qty));
    for (item, qty) in flat.chain(weighted) {
        if !ctx.rules.has_item(item) {
            return Err(RulesError::UnknownItem {
                context: rule.name.clone(),
                item: item.to_string(),
            });
        }
        op.items.add(item, qty);
        results.add_item(item, qty);
    }
    Ok(())
}

/// Unlock the first not yet researched topic of `candidates`.
fn unlock_research<R: Rng + ?Sized>(
    ctx: &mut CampaignContext<'_, R>,
    context: &str,
    candidates: &[String],
    results: &mut OperationResults,
) -> Result<(), RulesError> {
    let rules = ctx.rules;
    let Some(topic) = candidates
        .iter()
        .find(|topic| !ctx.state.is_researched(topic))
    else {
        return Ok(());
    };
    let research = rules.research(context, topic)?;
    ctx.state.add_research(&research.name);
    results.research = Some(research.name.clone());
    if !research.hidden {
        results.special_message = Some(MSG_NEW_DATA_ACQUIRED.to_string());
    }
    if let Some(lookup) = &research.lookup {
        let lookup = rules.research(context, lookup)?;
        ctx.state.add_research(&lookup.name);
        results.research = Some(lookup.name.clone());
    }

    let free: Vec<&String> = research
        .get_one_free
        .iter()
        .filter(|topic| !ctx.state.is_researched(topic))
        .collect();
    if let Some(idx) = ctx.rng.roll_index(free.len()) {
        let bonus = rules.research(context, free[idx])?;
        ctx.state.add_research(&bonus.name);
        if let Some(lookup) = &bonus.lookup {
            let lookup = rules.research(context, lookup)?;
            ctx.state.add_research(&lookup.name);
        }
    }

    for mission in &mut ctx.state.missions {
        let mission_rule = rules.mission(context, &mission.rule)?;
        if mission_rule.interrupt_research.as_deref() == Some(research.name.as_str()) {
            mission.interrupted = true;
            log::debug!("alien mission #{} interrupted by {}", mission.id, research.name);
        }
    }
    Ok(())
}

/// Simulate the squad, return staged items and file the end-of-operation report.
fn run_background_path<R: Rng + ?Sized>(
    op: &mut Operation,
    ctx: &mut CampaignContext<'_, R>,
    rule: &RuleCovertOperation,
    outcome: &OutcomeRoll,
    results: &mut OperationResults,
) {
    let input = CasualtyInput {
        rule,
        success: outcome.success,
        critical_failure: outcome.critical_failure,
        difficulty: ctx.state.difficulty,
        has_psi: op.has_psi,
        month: ctx.state.month(),
    };
    let Some(base) = ctx.state.base_mut(&op.base) else {
        log::warn!("{} #{}: base {} no longer exists", rule.name, op.id, op.base);
        return;
    };
    op.items.drain_into(&mut base.storage);
    // Operations without danger are not simulated; the squad just comes home.
    if rule.danger > 0 {
        let mut squad: Vec<&mut Soldier> = base
            .soldiers
            .iter_mut()
            .filter(|soldier| op.soldiers.contains(&soldier.id))
            .collect();
        let report = simulate_casualties(&input, ctx.rules, &mut squad, ctx.rng);

        for id in &report.killed {
            ctx.state.kill_soldier(&op.base, *id, &rule.name);
        }
        op.soldiers.retain(|id| !report.killed.contains(id));
        results.soldier_fates = report.fates;
        results.improvements = report.improvements;
        if results.killed() > 0 {
            log::info!("{} #{} lost {} soldiers", rule.name, op.id, results.killed());
        }
    }

    ctx.state.reports.push(OperationReport {
        base: op.base.clone(),
        operation: op.id,
        success: outcome.success,
        results: results.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_critical_are_independent() {
        assert_eq!(
            OutcomeRoll::evaluate(50, 80, 45),
            OutcomeRoll {
                roll: 50,
                success: true,
                critical_failure: false
            }
        );
        let near_miss = OutcomeRoll::evaluate(95, 80, 45);
        assert!(!near_miss.success);
        assert!(!near_miss.critical_failure);

        let disaster = OutcomeRoll::evaluate(99, 10, 45);
        assert!(!disaster.success);
        assert!(disaster.critical_failure);

        let both = OutcomeRoll::evaluate(10, 200, -300);
        assert!(both.success && both.critical_failure);
    }
}
