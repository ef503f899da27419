//! Hostile mission placement.
//!
//! A new mission needs a region that defines its spawn zone and, when the
//! mission rolls for base targeting, a region that holds a friendly base.
//! Regions are drawn from the mission's monthly weights (or uniformly when it
//! has none) until both checks pass. The search is capped; when it runs out
//! the last candidate is used anyway so the campaign never stalls.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignContext;
use crate::constants::{
    ALIEN_MISSION_ID_KEY, ANCHOR_BASE_ATTEMPTS, MAX_PLACEMENT_ATTEMPTS,
    MONTH_FALLBACK_AFTER_ATTEMPTS,
};
use crate::rng::RollExt;
use crate::rules::{RuleAlienMission, RulesError};

/// Spawned hostile mission. Region and zone never change after placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlienMission {
    pub id: u32,
    pub rule: String,
    pub race: String,
    region: String,
    zone: usize,
    #[serde(default)]
    pub interrupted: bool,
}

impl AlienMission {
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub const fn zone(&self) -> usize {
        self.zone
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlienBase {
    pub id: u32,
    pub deployment: String,
    pub region: String,
    #[serde(default)]
    pub discovered: bool,
}

/// Where and how a mission was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionPlacement {
    pub mission_id: u32,
    pub region: String,
    pub zone: usize,
    pub race: String,
    pub attempts: u32,
    /// False when the search ran out and the last candidate was used.
    pub placed: bool,
    /// True when the mission had no race for the month and one was substituted.
    pub race_substituted: bool,
}

/// Place a new mission of type `mission` and append it to the campaign.
///
/// `context` names the caller for error messages; `anchor_region` is the region
/// of the base that triggered the spawn, checked first when targeting bases.
///
/// # Errors
///
/// Fails when the mission, a drawn region or the resolved race is undefined.
pub fn place_alien_mission<R: Rng + ?Sized>(
    ctx: &mut CampaignContext<'_, R>,
    context: &str,
    mission: &str,
    anchor_region: Option<&str>,
) -> Result<MissionPlacement, RulesError> {
    let rules = ctx.rules;
    let rule = rules.mission(context, mission)?;
    let month = ctx.state.month();
    let zone = rule.spawn_zone;
    let target_base = ctx.rng.roll_percent(rule.target_base_odds);

    let mut region = String::new();
    let mut placed = false;
    let mut attempts = 0;
    // A long search falls back to the month 0 tables for the race as well.
    let mut draw_month = month;
    while !placed && attempts < MAX_PLACEMENT_ATTEMPTS {
        if attempts > MONTH_FALLBACK_AFTER_ATTEMPTS {
            draw_month = 0;
        }
        region = draw_region(ctx, rule, draw_month)?;
        let has_zone = rules.region(&rule.name, &region)?.mission_zones.len() > zone;
        let has_base = !target_base || base_in_region(ctx, &region, anchor_region, attempts);
        attempts += 1;
        placed = has_zone && has_base;
    }
    if !placed {
        log::warn!(
            "{context}: failed to choose a suitable region for alien mission {mission} after {attempts} attempts, using {region}"
        );
    }

    let (race, race_substituted) = resolve_race(ctx, context, rule, draw_month)?;
    let id = ctx.state.next_id(ALIEN_MISSION_ID_KEY);
    ctx.state.missions.push(AlienMission {
        id,
        rule: rule.name.clone(),
        race: race.clone(),
        region: region.clone(),
        zone,
        interrupted: false,
    });
    *ctx.state.missions_run.entry(rule.name.clone()).or_insert(0) += 1;

    Ok(MissionPlacement {
        mission_id: id,
        region,
        zone,
        race,
        attempts,
        placed,
        race_substituted,
    })
}

/// Spawn a mission outside of any operation, e.g. from campaign scripting.
///
/// # Errors
///
/// See [`place_alien_mission`].
pub fn spawn_alien_mission<R: Rng + ?Sized>(
    ctx: &mut CampaignContext<'_, R>,
    mission: &str,
    anchor_base: Option<&str>,
) -> Result<MissionPlacement, RulesError> {
    let anchor_region = anchor_base
        .and_then(|name| ctx.state.base(name))
        .map(|base| base.region.clone());
    place_alien_mission(ctx, "alien mission spawn", mission, anchor_region.as_deref())
}

fn draw_region<R: Rng + ?Sized>(
    ctx: &mut CampaignContext<'_, R>,
    rule: &RuleAlienMission,
    month: u32,
) -> Result<String, RulesError> {
    if rule.has_region_weights()
        && let Some(region) = rule.region_weights.choose(month, ctx.rng)
    {
        return Ok(region.to_string());
    }
    let idx = ctx
        .rng
        .roll_index(ctx.rules.regions.len())
        .ok_or_else(|| RulesError::NoRegions {
            mission: rule.name.clone(),
        })?;
    Ok(ctx.rules.regions[idx].name.clone())
}

fn base_in_region<R: Rng + ?Sized>(
    ctx: &CampaignContext<'_, R>,
    region: &str,
    anchor_region: Option<&str>,
    attempts: u32,
) -> bool {
    match anchor_region {
        Some(anchor) if attempts < ANCHOR_BASE_ATTEMPTS => anchor == region,
        _ => ctx.state.bases.iter().any(|base| base.region == region),
    }
}

fn resolve_race<R: Rng + ?Sized>(
    ctx: &mut CampaignContext<'_, R>,
    context: &str,
    rule: &RuleAlienMission,
    month: u32,
) -> Result<(String, bool), RulesError> {
    let (race, substituted) = match rule.race_weights.choose(month, ctx.rng) {
        Some(race) => (race.to_string(), false),
        None => {
            let race = if let Some(fallback) = &ctx.rules.fallback_race {
                fallback.clone()
            } else {
                ctx.rng
                    .roll_index(ctx.rules.races.len())
                    .map(|idx| ctx.rules.races[idx].clone())
                    .unwrap_or_default()
            };
            log::warn!(
                "{context}: alien mission {} has no race for month {month}, using {race:?}",
                rule.name
            );
            (race, true)
        }
    };
    if !ctx.rules.has_race(&race) {
        return Err(RulesError::UnknownRace {
            mission: rule.name.clone(),
            race,
        });
    }
    Ok((race, substituted))
}
