use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;

/// Seed metadata used by logic scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    /// Original token when the seed was not given as a plain integer.
    pub token: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub const fn from_numeric(seed: u64) -> Self {
        Self { seed, token: None }
    }

    #[must_use]
    pub fn label(&self) -> String {
        self.token
            .clone()
            .unwrap_or_else(|| self.seed.to_string())
    }
}

/// Resolve CLI seed tokens into a deduplicated seed list.
///
/// Supports decimal integers (negative values use their magnitude), `0x` hex
/// literals, and `start..end` ranges (end exclusive).
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if let Ok(value) = token.parse::<i64>() {
            pending.push(SeedInfo::from_numeric(value.unsigned_abs()));
            continue;
        }

        if let Ok(value) = token.parse::<u64>() {
            pending.push(SeedInfo::from_numeric(value));
            continue;
        }

        if let Some(hex) = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
        {
            let seed = u64::from_str_radix(&hex.replace('_', ""), 16)
                .with_context(|| format!("invalid hex seed: {token}"))?;
            pending.push(SeedInfo {
                seed,
                token: Some(token.to_lowercase()),
            });
            continue;
        }

        if let Some((start, end)) = token.split_once("..") {
            let start: u64 = start
                .parse()
                .with_context(|| format!("invalid range start in {token}"))?;
            let end: u64 = end
                .parse()
                .with_context(|| format!("invalid range end in {token}"))?;
            if end <= start {
                bail!("empty seed range: {token}");
            }
            pending.extend((start..end).map(SeedInfo::from_numeric));
            continue;
        }

        bail!("Unrecognized seed token: {token}");
    }

    let mut seen = BTreeSet::new();
    let mut deduped: Vec<SeedInfo> = pending
        .into_iter()
        .filter(|info| seen.insert(info.seed))
        .collect();

    if deduped.is_empty() {
        deduped.push(SeedInfo::from_numeric(1337));
    }

    Ok(deduped)
}
