//! Daily progression of covert operations and their lifecycle after resolution.
use std::mem;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::{BattleError, BattleReport};
use crate::campaign::{CampaignContext, CampaignState};
use crate::operation::{Operation, OperationPhase, OperationReport};
use crate::outcome::{OutcomeRoll, Resolution, resolve_with_roll};
use crate::rng::RollExt;
use crate::rules::{RuleCovertOperation, RuleSet, RulesError};

/// Result of spending one day on an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayProgress {
    Active,
    /// The cost has been paid; the operation must resolve this tick.
    Ready,
}

/// What a single tick did to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickOutcome {
    Active,
    Resolved(Resolution),
    AwaitingBattle,
    /// The operation was released and removed from its base.
    Finished,
}

/// Tick record for one operation during [`advance_operations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTick {
    pub base: String,
    pub operation: u32,
    pub outcome: TickOutcome,
}

/// Spend a day on `op` and maybe raise its progress event.
///
/// # Errors
///
/// Fails when the operation rule or a drawn progress event is undefined.
pub fn progress_day<R: Rng + ?Sized>(
    op: &mut Operation,
    ctx: &mut CampaignContext<'_, R>,
) -> Result<DayProgress, RulesError> {
    let rules = ctx.rules;
    let rule = rules.operation(&op.rule)?;
    let ready = op.spend_day();
    maybe_spawn_progress_event(op, ctx, rule)?;
    Ok(if ready {
        DayProgress::Ready
    } else {
        DayProgress::Active
    })
}

fn maybe_spawn_progress_event<R: Rng + ?Sized>(
    op: &mut Operation,
    ctx: &mut CampaignContext<'_, R>,
    rule: &RuleCovertOperation,
) -> Result<(), RulesError> {
    if rule.progress_events.is_empty() || (op.progress_event_spawned() && !rule.repeat_progress_event)
    {
        return Ok(());
    }
    if !ctx.rng.roll_percent(rule.progress_event_chance) {
        return Ok(());
    }
    let Some(event) = rule.progress_events.choose(ctx.rng) else {
        return Ok(());
    };
    ctx.rules.require_event(&rule.name, event)?;
    if ctx.state.spawn_event(event) {
        log::debug!("{} #{} raised progress event {event}", rule.name, op.id);
    }
    op.set_progress_event_spawned(true);
    Ok(())
}

/// Advance one operation by a day.
///
/// Operations waiting on a battle are left untouched; finished ones are released.
///
/// # Errors
///
/// Propagates rule lookup failures from progression and resolution.
pub fn tick_operation<R: Rng + ?Sized>(
    op: &mut Operation,
    ctx: &mut CampaignContext<'_, R>,
) -> Result<TickOutcome, RulesError> {
    match op.phase() {
        OperationPhase::Done => {
            release_operation(ctx.state, ctx.rules, op);
            Ok(TickOutcome::Finished)
        }
        OperationPhase::AwaitingBattle => Ok(TickOutcome::AwaitingBattle),
        OperationPhase::Active => match progress_day(op, ctx)? {
            DayProgress::Active => Ok(TickOutcome::Active),
            DayProgress::Ready => {
                let roll = OutcomeRoll::draw(ctx.rng);
                resolve_with_roll(op, ctx, roll).map(TickOutcome::Resolved)
            }
        },
    }
}

/// Tick every operation of every base once.
///
/// Finished operations are dropped from their base. On error the remaining
/// operations of the failing base are put back before returning.
///
/// # Errors
///
/// Stops at the first rule lookup failure.
pub fn advance_operations<R: Rng + ?Sized>(
    ctx: &mut CampaignContext<'_, R>,
) -> Result<Vec<OperationTick>, RulesError> {
    let mut ticks = Vec::new();
    let base_names: Vec<String> = ctx.state.bases.iter().map(|b| b.name.clone()).collect();
    for name in base_names {
        let Some(base) = ctx.state.base_mut(&name) else {
            continue;
        };
        let mut pending = mem::take(&mut base.operations).into_iter();
        let mut kept = Vec::new();
        let mut failure = None;
        for mut op in pending.by_ref() {
            let id = op.id;
            match tick_operation(&mut op, ctx) {
                Ok(outcome) => {
                    if outcome != TickOutcome::Finished {
                        kept.push(op);
                    }
                    ticks.push(OperationTick {
                        base: name.clone(),
                        operation: id,
                        outcome,
                    });
                }
                Err(err) => {
                    kept.push(op);
                    failure = Some(err);
                    break;
                }
            }
        }
        kept.extend(pending);
        if let Some(base) = ctx.state.base_mut(&name) {
            kept.append(&mut base.operations);
            base.operations = kept;
        }
        if let Some(err) = failure {
            return Err(err);
        }
    }
    Ok(ticks)
}

/// Unassign the operation's soldiers and send the healthy ones back to training.
fn release_operation(state: &mut CampaignState, rules: &RuleSet, op: &Operation) {
    let Some(base) = state.base_mut(&op.base) else {
        return;
    };
    for id in &op.soldiers {
        let free_training = base.has_free_training();
        let free_psi = rules.anytime_psi_training && base.has_free_psi_lab();
        let Some(soldier) = base.soldier_mut(*id) else {
            continue;
        };
        if soldier.assignment != Some(op.id) {
            continue;
        }
        soldier.assignment = None;
        if soldier.is_wounded() {
            continue;
        }
        if soldier.return_to_training.martial() && free_training {
            soldier.in_training = true;
        }
        if soldier.return_to_training.psi() && free_psi {
            soldier.in_psi_training = true;
        }
    }
    log::debug!("released covert operation {} #{}", op.rule, op.id);
}

/// Release and remove a resolved operation, wherever it lives.
pub fn finish_operation(
    state: &mut CampaignState,
    rules: &RuleSet,
    operation: u32,
) -> Option<Operation> {
    let base = state.bases.iter_mut().find(|b| b.operation(operation).is_some())?;
    let idx = base.operations.iter().position(|op| op.id == operation)?;
    let op = base.operations.remove(idx);
    release_operation(state, rules, &op);
    Some(op)
}

/// Feed a finished battle back into the operation that requested it.
///
/// A won battle returns the staged items to base storage; a lost one forfeits them.
///
/// # Errors
///
/// Fails when no operation with that id exists or it is not waiting for a battle.
pub fn complete_battle(
    state: &mut CampaignState,
    rules: &RuleSet,
    report: BattleReport,
) -> Result<OperationReport, BattleError> {
    let base = state
        .bases
        .iter_mut()
        .find(|b| b.operation(report.operation).is_some())
        .ok_or(BattleError::UnknownOperation(report.operation))?;
    let Some(op) = base.operations.iter_mut().find(|op| op.id == report.operation) else {
        return Err(BattleError::UnknownOperation(report.operation));
    };
    if op.phase() != OperationPhase::AwaitingBattle {
        return Err(BattleError::NotAwaitingBattle(report.operation));
    }
    op.leave_battle();
    if report.success {
        op.items.drain_into(&mut base.storage);
    } else {
        op.items = Default::default();
        if let Some(results) = op.results_mut() {
            results.items.clear();
        }
    }
    let operation_report = OperationReport {
        base: op.base.clone(),
        operation: op.id,
        success: report.success,
        results: op.results().cloned().unwrap_or_default(),
    };
    state
        .pending_battles
        .retain(|request| request.operation != report.operation);
    state.reports.push(operation_report.clone());
    finish_operation(state, rules, report.operation);
    Ok(operation_report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Base;
    use crate::battle::BattleRequest;
    use crate::soldier::{ReturnToTraining, Soldier};
    use crate::stats::StatBlock;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rules(op: &str) -> RuleSet {
        RuleSet {
            events: vec!["STR_RUMOURS".into()],
            deployments: vec!["STR_AMBUSH".into()],
            operations: vec![serde_json::from_str(op).expect("operation rule")],
            ..RuleSet::default()
        }
    }

    fn state(rule: &str, cost: i32) -> CampaignState {
        let mut base = Base::new("Alpha", "STR_EUROPE");
        base.training_capacity = 4;
        let mut soldier = Soldier::new(1, "Vera", "STR_SOLDIER", StatBlock::splat(40));
        soldier.assignment = Some(1);
        soldier.return_to_training = ReturnToTraining::Martial;
        base.soldiers.push(soldier);
        let mut op = Operation::new(1, rule, "Alpha", cost, 80);
        op.soldiers = vec![1];
        base.operations.push(op);
        let mut state = CampaignState::default();
        state.bases.push(base);
        state
    }

    #[test]
    fn resolves_exactly_when_cost_is_paid() {
        let rules = rules(r#"{ "name": "STR_WATCH" }"#);
        let mut state = state("STR_WATCH", 3);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut resolved = 0;
        let mut last_spent = 0;
        for _ in 0..6 {
            let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
            for tick in advance_operations(&mut ctx).expect("tick") {
                if matches!(tick.outcome, TickOutcome::Resolved(_)) {
                    resolved += 1;
                }
            }
            if let Some(op) = state.bases[0].operations.first() {
                assert!(op.spent() >= last_spent);
                last_spent = op.spent();
            }
        }
        assert_eq!(resolved, 1);
        assert!(state.bases[0].operations.is_empty());
        let soldier = &state.bases[0].soldiers[0];
        assert_eq!(soldier.assignment, None);
        assert!(soldier.in_training);
    }

    #[test]
    fn progress_event_fires_once_without_repeat() {
        let rules = rules(
            r#"{
                "name": "STR_WATCH",
                "progress_events": { "STR_RUMOURS": 1 },
                "progress_event_chance": 100
            }"#,
        );
        let mut state = state("STR_WATCH", 10);
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let mut op = state.bases[0].operations.remove(0);
        let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
        progress_day(&mut op, &mut ctx).expect("day one");
        assert!(op.progress_event_spawned());
        ctx.state.active_events.clear();
        progress_day(&mut op, &mut ctx).expect("day two");
        assert!(state.active_events.is_empty());
    }

    #[test]
    fn battle_ops_wait_until_the_report_arrives() {
        let rules = rules(
            r#"{ "name": "STR_RAID", "success": { "deployments": { "STR_AMBUSH": 1 } } }"#,
        );
        let mut state = state("STR_RAID", 0);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut op = state.bases[0].operations.remove(0);
        {
            let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
            let resolution = resolve_with_roll(&mut op, &mut ctx, 10).expect("resolve");
            assert_eq!(resolution.battle.as_deref(), Some("STR_AMBUSH"));
            assert_eq!(
                tick_operation(&mut op, &mut ctx).expect("idle"),
                TickOutcome::AwaitingBattle
            );
        }
        state.bases[0].operations.push(op);
        assert_eq!(
            state.pending_battles,
            vec![BattleRequest {
                base: "Alpha".into(),
                operation: 1,
                operation_name: "STR_RAID".into(),
                deployment: "STR_AMBUSH".into(),
                soldiers: vec![1],
            }]
        );

        let report = complete_battle(
            &mut state,
            &rules,
            BattleReport {
                operation: 1,
                success: true,
            },
        )
        .expect("battle accepted");
        assert!(report.success);
        assert!(state.pending_battles.is_empty());
        assert!(state.bases[0].operations.is_empty());
        assert_eq!(
            complete_battle(
                &mut state,
                &rules,
                BattleReport {
                    operation: 1,
                    success: true
                }
            ),
            Err(BattleError::UnknownOperation(1))
        );
    }
}
