//! Centralized balance and tuning constants for covert operation resolution.
//!
//! These values define the deterministic math for the strategic layer.
//! Keeping them together ensures that balance can only be adjusted via
//! code changes reviewed in version control, rather than through external
//! rules assets.

// Outcome resolution -------------------------------------------------------
pub(crate) const BASE_CRITICAL_FAIL_MARGIN: i32 = 45;
pub(crate) const BASE_WOUND_ODDS: i32 = 20;
pub(crate) const BASE_DEATH_ODDS: i32 = 10;
pub(crate) const CRITICAL_FAILURE_SCORE_PENALTY: i32 = 300;
pub(crate) const CRITICAL_TRAP_BONUS: i32 = 35;
pub(crate) const OUTCOME_ROLL_MAX: i32 = 99;

// Mission placement --------------------------------------------------------
pub(crate) const MAX_PLACEMENT_ATTEMPTS: u32 = 50;
pub(crate) const MONTH_FALLBACK_AFTER_ATTEMPTS: u32 = 35;
pub(crate) const ANCHOR_BASE_ATTEMPTS: u32 = 2;
pub(crate) const ALIEN_MISSION_ID_KEY: &str = "ALIEN_MISSIONS";

// Background simulation ----------------------------------------------------
pub(crate) const COST_UNITS_PER_EXPERIENCE_TIER: i32 = 20;
pub(crate) const LATE_GAME_MONTH: u32 = 24;
pub(crate) const EXPERIENCE_JITTER: i32 = 2;
pub(crate) const WOUND_DAMAGE_MIN_PER_HIT: i32 = 8;
pub(crate) const WOUND_DAMAGE_MAX_PER_HIT: i32 = 12;
pub(crate) const REACTION_DODGE_FACTOR: f64 = 0.7;
pub(crate) const PROTECTION_BASE_ROLL: i32 = 7;
pub(crate) const PROTECTION_RANK_OFFSET: i32 = 2;
pub(crate) const PROTECTION_PSI_BONUS: i32 = 3;
pub(crate) const PROTECTION_CRITICAL_PENALTY: i32 = 3;
pub(crate) const SAVED_BRAVERY_THRESHOLD: i32 = 20;
pub(crate) const SAVED_BRAVERY_CHANCE: i32 = 5;
pub(crate) const LAST_SURVIVOR_MIN_DAMAGE: f64 = 0.5;
pub(crate) const LAST_SURVIVOR_MAX_DAMAGE: f64 = 0.9;
pub(crate) const STAT_ROLL_FLOOR: i32 = -3;
pub(crate) const MAX_EXPERIENCE_REROLLS: i32 = 32;

// Calendar -----------------------------------------------------------------
pub(crate) const DAYS_PER_MONTH: u32 = 30;
pub(crate) const INITIAL_FUNDS_SCALE: i64 = 1_000;
pub(crate) const INITIAL_FUNDS_JITTER_MIN: i32 = -1_258;
pub(crate) const INITIAL_FUNDS_JITTER_MAX: i32 = 6_365;

// Report keys --------------------------------------------------------------
pub(crate) const MSG_NEW_DATA_ACQUIRED: &str = "STR_NEW_DATA_ACQUIRED";
pub(crate) const MSG_ALIEN_BASE_REVEALED: &str = "STR_REGIONAL_HQ_FOUND";
