//! Campaign-wide loyalty ledger.
use num_traits::cast::cast;
use serde::{Deserialize, Serialize};

use crate::numbers::{ceil_f64_to_i32, round_f64_to_i32};
use crate::rules::LoyaltyCoefficients;

/// What produced a score change that moves loyalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltySource {
    Battlescape,
    Dogfight,
    Geoscape,
    Research,
    AlienMissionDespawn,
    UfoActivity,
    AlienBase,
    /// Score moves loyalty one to one.
    Absolute,
}

impl LoyaltySource {
    /// Signed percent coefficient for this source. Alien sources count against loyalty.
    #[must_use]
    pub const fn coefficient(self, coefficients: &LoyaltyCoefficients) -> f64 {
        match self {
            Self::Battlescape => coefficients.battlescape,
            Self::Dogfight => coefficients.dogfight,
            Self::Geoscape => coefficients.geoscape,
            Self::Research => coefficients.research,
            Self::AlienMissionDespawn => -coefficients.alien_mission,
            Self::UfoActivity => -coefficients.ufo,
            Self::AlienBase => -coefficients.alien_base,
            Self::Absolute => 100.0,
        }
    }
}

/// Move `loyalty` by `round(coef% * score)` and return the change.
pub fn update_loyalty(
    loyalty: &mut i64,
    coefficients: &LoyaltyCoefficients,
    score: i32,
    source: LoyaltySource,
) -> i64 {
    let coef = source.coefficient(coefficients) / 100.0;
    let change = i64::from(round_f64_to_i32(coef * f64::from(score)));
    *loyalty = loyalty.saturating_add(change);
    log::debug!("loyalty {loyalty} after {change:+} ({source:?}, score {score})");
    change
}

/// Base service performance in percent for a loyalty value; 100 is normal.
#[must_use]
pub fn loyalty_performance_bonus(loyalty: i64) -> i32 {
    let value = cast::<i64, f64>(loyalty).unwrap_or(0.0);
    if loyalty > 100 {
        100 + ceil_f64_to_i32(-9.79 + 2.23 * value.ln())
    } else if loyalty < 0 {
        100 - ceil_f64_to_i32(0.271 * (-value).powf(0.537))
    } else {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_source_ignores_coefficients() {
        let coefficients = LoyaltyCoefficients {
            geoscape: 10.0,
            ..LoyaltyCoefficients::default()
        };
        let mut loyalty = 0;
        assert_eq!(
            update_loyalty(&mut loyalty, &coefficients, 37, LoyaltySource::Absolute),
            37
        );
        assert_eq!(
            update_loyalty(&mut loyalty, &coefficients, 37, LoyaltySource::Geoscape),
            4
        );
        assert_eq!(loyalty, 41);
    }

    #[test]
    fn alien_sources_reduce_loyalty() {
        let coefficients = LoyaltyCoefficients {
            ufo: 50.0,
            ..LoyaltyCoefficients::default()
        };
        let mut loyalty = 100;
        let change = update_loyalty(&mut loyalty, &coefficients, 30, LoyaltySource::UfoActivity);
        assert_eq!(change, -15);
        assert_eq!(loyalty, 85);
    }

    #[test]
    fn performance_bonus_bands() {
        assert_eq!(loyalty_performance_bonus(0), 100);
        assert_eq!(loyalty_performance_bonus(100), 100);
        // ceil(-9.79 + 2.23 * ln 1000) = ceil(5.61) = 6
        assert_eq!(loyalty_performance_bonus(1000), 106);
        // ceil(0.271 * 1000^0.537) = ceil(11.07) = 12
        assert_eq!(loyalty_performance_bonus(-1000), 88);
    }
}
