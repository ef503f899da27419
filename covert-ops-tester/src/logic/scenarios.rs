use anyhow::{Context, Result, ensure};
use covert_ops_core::{
    CampaignContext, CampaignSession, CampaignState, Difficulty, OperationPhase, RuleSet,
    TickOutcome, commit_operation, place_alien_mission, resolve_with_roll,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

/// Inputs shared by every scenario run.
pub struct ScenarioInput<'a> {
    pub rules: &'a RuleSet,
    pub seed: u64,
    pub difficulty: Difficulty,
}

/// Named logic check executed once per seed and iteration.
#[derive(Clone, Copy)]
pub struct LogicScenario {
    pub key: &'static str,
    pub description: &'static str,
    check: fn(&ScenarioInput<'_>) -> Result<()>,
}

impl LogicScenario {
    /// Run the check.
    ///
    /// # Errors
    ///
    /// Returns the first violated expectation.
    pub fn run(&self, input: &ScenarioInput<'_>) -> Result<()> {
        (self.check)(input)
    }
}

const CATALOG: [LogicScenario; 5] = [
    LogicScenario {
        key: "smoke",
        description: "Start a campaign and advance it through one month",
        check: smoke,
    },
    LogicScenario {
        key: "operation-lifecycle",
        description: "Commit an operation and follow it until it is released",
        check: operation_lifecycle,
    },
    LogicScenario {
        key: "casualty-floor",
        description: "Critical failures of the most dangerous operation never wipe out a squad",
        check: casualty_floor,
    },
    LogicScenario {
        key: "region-placement",
        description: "Alien missions land in regions that have the requested zone",
        check: region_placement,
    },
    LogicScenario {
        key: "event-scripts",
        description: "Scripted events respect one-time and cooldown rules over a quarter",
        check: event_scripts,
    },
];

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    CATALOG.iter().map(|s| (s.key, s.description)).collect()
}

#[must_use]
pub fn get_scenario(name: &str) -> Option<LogicScenario> {
    CATALOG.iter().copied().find(|s| s.key == name)
}

#[must_use]
pub fn all_scenario_keys() -> Vec<String> {
    CATALOG.iter().map(|s| s.key.to_string()).collect()
}

fn new_session(input: &ScenarioInput<'_>) -> Result<CampaignSession> {
    CampaignSession::new(input.rules.clone(), input.seed, input.difficulty)
        .context("campaign setup failed")
}

fn smoke(input: &ScenarioInput<'_>) -> Result<()> {
    let mut session = new_session(input)?;
    let mut month_rolls = 0;
    for _ in 0..30 {
        if session.advance_day()?.new_month {
            month_rolls += 1;
        }
    }
    ensure!(session.state().day == 30, "day counter is {}", session.state().day);
    ensure!(month_rolls == 1, "expected one month rollover, saw {month_rolls}");
    ensure!(
        session.state().factions.len() == input.rules.factions.len(),
        "faction ledgers do not match the rules"
    );
    Ok(())
}

fn operation_lifecycle(input: &ScenarioInput<'_>) -> Result<()> {
    let mut session = new_session(input)?;
    let rule = input
        .rules
        .operations
        .iter()
        .find(|rule| rule.required_items.is_empty())
        .context("rules define no operation without required items")?;
    let (base, soldier) = {
        let base = session
            .state()
            .bases
            .first()
            .context("campaign has no base")?;
        let soldier = base.soldiers.first().context("base has no soldiers")?;
        (base.name.clone(), soldier.id)
    };
    let cost = 3;
    let id = session.commit_operation(&base, &rule.name, &[soldier], cost, 70, false)?;

    let mut resolved = 0;
    let mut last_spent = 0;
    for _ in 0..=cost + 1 {
        let report = session.advance_day()?;
        resolved += report
            .ticks
            .iter()
            .filter(|t| t.operation == id && matches!(t.outcome, TickOutcome::Resolved(_)))
            .count();
        let live = session
            .state()
            .base(&base)
            .and_then(|b| b.operation(id))
            .map(|op| (op.spent(), op.phase()));
        if let Some((spent, phase)) = live {
            ensure!(spent >= last_spent, "spent went backwards ({last_spent} -> {spent})");
            last_spent = spent;
            if phase == OperationPhase::AwaitingBattle {
                return Ok(());
            }
        }
    }
    ensure!(resolved == 1, "operation resolved {resolved} times");
    let state = session.state();
    ensure!(
        state.base(&base).and_then(|b| b.operation(id)).is_none(),
        "operation was not cleaned up"
    );
    if let Some(s) = state.base(&base).and_then(|b| b.soldier(soldier)) {
        ensure!(s.assignment.is_none(), "soldier is still assigned");
    }
    Ok(())
}

fn casualty_floor(input: &ScenarioInput<'_>) -> Result<()> {
    let rules = input.rules;
    let rule = rules
        .operations
        .iter()
        .max_by_key(|rule| rule.danger)
        .context("rules define no operations")?;
    let mut rng = StdRng::seed_from_u64(input.seed);
    let mut state = CampaignState::new_campaign(rules, &mut rng, Difficulty::Superhuman)?;
    let Some(base) = state.bases.first_mut() else {
        return Ok(());
    };
    for (item, qty) in &rule.required_items {
        base.storage.add(item, *qty);
    }
    let base_name = base.name.clone();
    let squad: Vec<u32> = base.soldiers.iter().map(|s| s.id).take(4).collect();
    if squad.is_empty() {
        return Ok(());
    }
    let id = commit_operation(&mut state, rules, &base_name, &rule.name, &squad, 1, 0, false)?;
    let base = state.base_mut(&base_name).context("base vanished")?;
    let idx = base
        .operations
        .iter()
        .position(|op| op.id == id)
        .context("operation vanished")?;
    let mut op = base.operations.remove(idx);

    let mut ctx = CampaignContext::new(&mut state, rules, &mut rng);
    let resolution = resolve_with_roll(&mut op, &mut ctx, 99)?;
    if resolution.battle.is_some() {
        return Ok(());
    }
    let killed = op.results().map_or(0, |r| r.killed());
    ensure!(
        killed < squad.len(),
        "{} lost all {} soldiers",
        rule.name,
        squad.len()
    );
    ensure!(state.fallen.len() == killed, "fallen roll does not match casualties");
    Ok(())
}

fn region_placement(input: &ScenarioInput<'_>) -> Result<()> {
    let rules = input.rules;
    let mut rng = StdRng::seed_from_u64(input.seed);
    let mut state = CampaignState::new_campaign(rules, &mut rng, input.difficulty)?;
    let mut ctx = CampaignContext::new(&mut state, rules, &mut rng);
    for mission in &rules.missions {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        let draws = 300;
        for _ in 0..draws {
            let placement = place_alien_mission(&mut ctx, "region-placement", &mission.name, None)?;
            if placement.placed {
                let region = rules.region(&mission.name, &placement.region)?;
                ensure!(
                    region.mission_zones.len() > placement.zone,
                    "{} placed into {} without zone {}",
                    mission.name,
                    placement.region,
                    placement.zone
                );
            }
            *counts.entry(placement.region).or_default() += 1;
        }
        let untargeted = !mission.has_region_weights() && mission.target_base_odds == 0;
        if untargeted && counts.len() > 1 {
            let fair = draws / u32::try_from(counts.len()).unwrap_or(1);
            let busiest = counts.values().copied().max().unwrap_or(0);
            ensure!(
                busiest <= fair * 2,
                "{} favours one region ({busiest} of {draws})",
                mission.name
            );
        }
    }
    Ok(())
}

fn event_scripts(input: &ScenarioInput<'_>) -> Result<()> {
    let mut session = new_session(input)?;
    let mut spawned: Vec<String> = Vec::new();
    for _ in 0..90 {
        let report = session.advance_day()?;
        spawned.extend(report.events);
        for (script, gap) in &session.state().script_gaps {
            ensure!(*gap > 0, "script {script} kept a spent cooldown");
        }
    }
    for script in &session.rules().event_scripts {
        let one_time = script
            .one_time_sequential_events
            .iter()
            .map(String::as_str)
            .chain(script.one_time_random_events.names());
        for event in one_time {
            let times = spawned.iter().filter(|e| e.as_str() == event).count();
            ensure!(times <= 1, "one-time event {event} spawned {times} times");
        }
    }
    for event in &spawned {
        ensure!(
            session.state().was_event_generated(event),
            "{event} was reported but not recorded"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keys_are_unique() {
        let keys = all_scenario_keys();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(keys.len(), sorted.len());
        assert!(get_scenario("smoke").is_some());
        assert!(get_scenario("nope").is_none());
    }

    #[test]
    fn every_scenario_passes_on_bundled_rules() {
        let rules = RuleSet::bundled().unwrap();
        for scenario in CATALOG {
            let input = ScenarioInput {
                rules: &rules,
                seed: 1337,
                difficulty: Difficulty::Veteran,
            };
            scenario
                .run(&input)
                .unwrap_or_else(|err| panic!("{} failed: {err:#}", scenario.key));
        }
    }
}
