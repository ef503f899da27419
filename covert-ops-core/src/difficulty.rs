use serde::{Deserialize, Serialize};

use crate::constants::{BASE_CRITICAL_FAIL_MARGIN, BASE_DEATH_ODDS, BASE_WOUND_ODDS};

/// Campaign difficulty tiers, most forgiving first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Experienced,
    #[default]
    Veteran,
    Genius,
    Superhuman,
}

/// Difficulty-scaled odds used by outcome resolution and casualty simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyOdds {
    pub critical_fail_margin: i32,
    pub wound_odds: i32,
    pub death_odds: i32,
}

impl Difficulty {
    pub const ALL: [Self; 5] = [
        Self::Beginner,
        Self::Experienced,
        Self::Veteran,
        Self::Genius,
        Self::Superhuman,
    ];

    /// Tier index, 0 for beginner through 4 for superhuman.
    #[must_use]
    pub const fn coefficient(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn odds(self) -> DifficultyOdds {
        let (margin, wound, death) = match self {
            Self::Beginner => (5, -5, -8),
            Self::Experienced => (2, -2, -4),
            Self::Veteran => (0, 0, 0),
            Self::Genius => (-2, 5, 2),
            Self::Superhuman => (-5, 10, 10),
        };
        DifficultyOdds {
            critical_fail_margin: BASE_CRITICAL_FAIL_MARGIN + margin,
            wound_odds: BASE_WOUND_ODDS + wound,
            death_odds: BASE_DEATH_ODDS + death,
        }
    }

    /// Danger of an engaged operation after the difficulty adjustment.
    #[must_use]
    pub fn adjust_danger(self, danger: i32) -> i32 {
        match self {
            Self::Beginner => danger - 1,
            Self::Experienced => danger,
            Self::Veteran => danger + 1,
            Self::Genius => danger + 3,
            Self::Superhuman => (danger * 2).max(danger + 4),
        }
    }

    /// Upper bound of the experience budget cut applied to engaged squads.
    #[must_use]
    pub const fn engaged_experience_penalty(self) -> i32 {
        match self {
            Self::Superhuman => 3,
            _ => 0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Experienced => "experienced",
            Self::Veteran => "veteran",
            Self::Genius => "genius",
            Self::Superhuman => "superhuman",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn veteran_uses_base_odds() {
        assert_eq!(
            Difficulty::Veteran.odds(),
            DifficultyOdds {
                critical_fail_margin: 45,
                wound_odds: 20,
                death_odds: 10,
            }
        );
    }

    #[test]
    fn odds_get_harsher_with_tier() {
        let margins: Vec<i32> = Difficulty::ALL
            .iter()
            .map(|d| d.odds().critical_fail_margin)
            .collect();
        assert_eq!(margins, vec![50, 47, 45, 43, 40]);
        assert_eq!(Difficulty::Superhuman.odds().wound_odds, 30);
        assert_eq!(Difficulty::Beginner.odds().death_odds, 2);
    }

    #[test]
    fn superhuman_danger_at_least_doubles() {
        assert_eq!(Difficulty::Superhuman.adjust_danger(2), 6);
        assert_eq!(Difficulty::Superhuman.adjust_danger(6), 12);
        assert_eq!(Difficulty::Beginner.adjust_danger(1), 0);
        assert_eq!(Difficulty::Superhuman.coefficient(), 4);
    }
}
