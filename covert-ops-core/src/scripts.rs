//! Campaign event scripts: gated, cooldown-limited geoscape event generation.
use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::campaign::{CampaignContext, CampaignState};
use crate::rng::RollExt;
use crate::rules::{RuleEventScript, RulesError};

/// Tick source a script is evaluated from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorSource {
    #[default]
    Monthly,
    Factional,
    Xcom,
}

impl ProcessorSource {
    pub const ALL: [Self; 3] = [Self::Monthly, Self::Factional, Self::Xcom];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Factional => "factional",
            Self::Xcom => "xcom",
        }
    }
}

/// Regions and countries that currently host a friendly base.
struct BasePresence {
    regions: BTreeSet<String>,
    countries: BTreeSet<String>,
}

impl BasePresence {
    fn collect(state: &CampaignState) -> Self {
        Self {
            regions: state.bases.iter().map(|b| b.region.clone()).collect(),
            countries: state
                .bases
                .iter()
                .filter_map(|b| b.country.clone())
                .collect(),
        }
    }
}

/// Evaluate every script of `source` and spawn the events of those that pass.
///
/// Returns the names of the events actually spawned, in script order.
///
/// # Errors
///
/// Fails when a script generates an event that is not defined.
pub fn evaluate_event_scripts<R: Rng + ?Sized>(
    ctx: &mut CampaignContext<'_, R>,
    source: ProcessorSource,
) -> Result<Vec<String>, RulesError> {
    let rules = ctx.rules;
    let presence = BasePresence::collect(ctx.state);
    let mut spawned = Vec::new();
    for script in rules
        .event_scripts
        .iter()
        .filter(|script| script.processor == source)
    {
        if !window_open(script, ctx.state) || !secondary_gates_pass(script, ctx.state, &presence) {
            continue;
        }
        let generated = generate_events(script, ctx)?;
        let mut any = false;
        for event in generated {
            if ctx.state.spawn_event(&event) {
                any = true;
                spawned.push(event);
            }
        }
        if any {
            let gap = script.spawn_gap + ctx.rng.roll_range(0, script.random_spawn_gap);
            if gap > 0 {
                ctx.state.script_gaps.insert(script.name.clone(), gap);
            }
            log::debug!("script {} fired ({}), gap {gap}", script.name, source.as_str());
        }
    }
    Ok(spawned)
}

/// Calendar, score, loyalty, funds, difficulty and cooldown gates.
fn window_open(script: &RuleEventScript, state: &CampaignState) -> bool {
    let month = state.month();
    let difficulty = u8::try_from(state.difficulty.coefficient()).unwrap_or(u8::MAX);
    month >= script.first_month
        && script.last_month.is_none_or(|last| month <= last)
        && (script.min_score..=script.max_score).contains(&state.current_score())
        && (script.min_loyalty..=script.max_loyalty).contains(&state.loyalty)
        && (script.min_funds..=script.max_funds).contains(&state.funds)
        && (script.min_difficulty..=script.max_difficulty).contains(&difficulty)
        && !state.is_script_gapped(&script.name)
}

fn secondary_gates_pass(
    script: &RuleEventScript,
    state: &CampaignState,
    presence: &BasePresence,
) -> bool {
    let research = script
        .research_triggers
        .iter()
        .all(|(topic, wanted)| state.is_researched(topic) == *wanted);
    let reputation = script.reputation_requirements.is_empty()
        || script.reputation_requirements.iter().any(|(name, level)| {
            state.factions.iter().any(|faction| {
                &faction.name == name && faction.reputation_level() >= *level
            })
        });
    research
        && reputation
        && counter_in_range(script, state)
        && script
            .item_triggers
            .iter()
            .all(|(item, wanted)| state.is_item_obtained(item) == *wanted)
        && script
            .facility_triggers
            .iter()
            .all(|(facility, wanted)| state.is_facility_built(facility) == *wanted)
        && script
            .base_in_region_triggers
            .iter()
            .all(|(region, wanted)| presence.regions.contains(region) == *wanted)
        && script
            .base_in_country_triggers
            .iter()
            .all(|(country, wanted)| presence.countries.contains(country) == *wanted)
}

fn counter_in_range(script: &RuleEventScript, state: &CampaignState) -> bool {
    let mut counters = SmallVec::<[i32; 2]>::new();
    if let Some(var) = &script.mission_var_name {
        counters.push(state.missions_run.get(var).copied().unwrap_or(0));
    }
    if let Some(marker) = &script.mission_marker_name {
        counters.push(state.last_id(marker));
    }
    counters.iter().all(|value| {
        (script.counter_min <= 0 || *value >= script.counter_min)
            && script.counter_max.is_none_or(|max| *value <= max)
    })
}

/// The three generation tiers: sequential one-shot, random one-shot, repeatable.
fn generate_events<R: Rng + ?Sized>(
    script: &RuleEventScript,
    ctx: &mut CampaignContext<'_, R>,
) -> Result<SmallVec<[String; 3]>, RulesError> {
    let mut events = SmallVec::<[String; 3]>::new();
    if let Some(next) = script
        .one_time_sequential_events
        .iter()
        .find(|event| !ctx.state.was_event_generated(event))
    {
        events.push(next.clone());
    }
    let unseen = script
        .one_time_random_events
        .without(|event| ctx.state.was_event_generated(event));
    if let Some(event) = unseen.choose(ctx.rng) {
        events.push(event.to_string());
    }
    if let Some(event) = script.random_events.choose(ctx.state.month(), ctx.rng) {
        events.push(event.to_string());
    }
    for event in &events {
        ctx.rules.require_event(&script.name, event)?;
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Base;
    use crate::reputation::Faction;
    use crate::rules::RuleSet;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rules(scripts: &str) -> RuleSet {
        RuleSet {
            events: vec!["STR_FIRST".into(), "STR_SECOND".into(), "STR_NOISE".into()],
            event_scripts: serde_json::from_str(scripts).expect("scripts"),
            ..RuleSet::default()
        }
    }

    fn state() -> CampaignState {
        let mut state = CampaignState::default();
        let mut base = Base::new("Alpha", "STR_EUROPE");
        base.country = Some("STR_FRANCE".into());
        state.bases.push(base);
        state
    }

    #[test]
    fn sequential_events_fire_in_order_with_cooldown() {
        let rules = rules(
            r#"[{
                "name": "STR_STORY",
                "processor": "xcom",
                "one_time_sequential_events": ["STR_FIRST", "STR_SECOND"],
                "spawn_gap": 2
            }]"#,
        );
        let mut state = state();
        let mut rng = ChaCha20Rng::seed_from_u64(5);

        let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
        let first = evaluate_event_scripts(&mut ctx, ProcessorSource::Xcom).expect("first");
        assert_eq!(first, vec!["STR_FIRST".to_string()]);
        let gapped = evaluate_event_scripts(&mut ctx, ProcessorSource::Xcom).expect("gapped");
        assert!(gapped.is_empty());
        let other = evaluate_event_scripts(&mut ctx, ProcessorSource::Monthly).expect("monthly");
        assert!(other.is_empty());

        state.tick_script_gaps();
        state.tick_script_gaps();
        let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
        let second = evaluate_event_scripts(&mut ctx, ProcessorSource::Xcom).expect("second");
        assert_eq!(second, vec!["STR_SECOND".to_string()]);
    }

    #[test]
    fn every_trigger_must_match() {
        let rules = rules(
            r#"[{
                "name": "STR_LOCAL",
                "base_in_region_triggers": { "STR_EUROPE": true, "STR_ASIA": true },
                "random_events": { "0": { "STR_NOISE": 1 } }
            }]"#,
        );
        let mut state = state();
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
        assert!(
            evaluate_event_scripts(&mut ctx, ProcessorSource::Monthly)
                .expect("evaluate")
                .is_empty()
        );

        state.bases.push(Base::new("Beta", "STR_ASIA"));
        let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
        assert_eq!(
            evaluate_event_scripts(&mut ctx, ProcessorSource::Monthly).expect("evaluate"),
            vec!["STR_NOISE".to_string()]
        );
    }

    #[test]
    fn reputation_floor_accepts_any_listed_faction() {
        let rules = rules(
            r#"[{
                "name": "STR_DIPLOMACY",
                "reputation_requirements": { "STR_CHURCH": "friendly", "STR_CARTEL": "hated" },
                "one_time_sequential_events": ["STR_FIRST"]
            }]"#,
        );
        let mut state = state();
        state.factions.push(Faction::new("STR_CARTEL", 0));
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
        assert_eq!(
            evaluate_event_scripts(&mut ctx, ProcessorSource::Monthly).expect("evaluate"),
            vec!["STR_FIRST".to_string()]
        );
    }

    #[test]
    fn mission_counter_gates_scripts() {
        let rules = rules(
            r#"[{
                "name": "STR_ESCALATION",
                "mission_var_name": "STR_ALIEN_TERROR",
                "counter_min": 2,
                "one_time_sequential_events": ["STR_FIRST"]
            }]"#,
        );
        let mut state = state();
        state.missions_run.insert("STR_ALIEN_TERROR".into(), 1);
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
        assert!(
            evaluate_event_scripts(&mut ctx, ProcessorSource::Monthly)
                .expect("evaluate")
                .is_empty()
        );
        state.missions_run.insert("STR_ALIEN_TERROR".into(), 2);
        let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
        assert_eq!(
            evaluate_event_scripts(&mut ctx, ProcessorSource::Monthly)
                .expect("evaluate")
                .len(),
            1
        );
    }

    #[test]
    fn undefined_event_is_fatal() {
        let rules = rules(r#"[{ "name": "STR_BROKEN", "one_time_sequential_events": ["STR_GHOST"] }]"#);
        let mut state = state();
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let mut ctx = CampaignContext::new(&mut state, &rules, &mut rng);
        assert!(matches!(
            evaluate_event_scripts(&mut ctx, ProcessorSource::Monthly),
            Err(RulesError::UnknownEvent { .. })
        ));
    }
}
