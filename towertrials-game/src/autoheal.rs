//! Passive HP/mana regeneration from elapsed wall-clock time.
//!
//! Full heal is linear over [`AUTO_HEAL_WINDOW_SECS`], from a 0.1% floor up
//! to 100%. The calculator is pure: callers pass `now` explicitly, so
//! repeated calls with the same instant never double-apply.

use serde::{Deserialize, Serialize};

use crate::constants::{
    AUTO_HEAL_MIN_ELAPSED_SECS, AUTO_HEAL_MIN_PCT, AUTO_HEAL_PCT_SPAN, AUTO_HEAL_WINDOW_SECS,
};
use crate::numbers::{floor_f64_to_i32, u64_to_f64};
use crate::state::Character;

/// Result of one auto-heal evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealedPools {
    pub hp: i32,
    pub mana: i32,
}

impl HealedPools {
    /// Whether the evaluation changed either pool.
    #[must_use]
    pub const fn changed_from(&self, character: &Character) -> bool {
        self.hp != character.hp || self.mana != character.mana
    }
}

/// Compute the pools a character should hold at `now_ms`.
///
/// `force_full` short-circuits to both maximums (used when entering the
/// safe hub). Otherwise, no activity timestamp, already-full pools, or
/// less than one elapsed second leave the pools untouched. A `now` before
/// `last_activity` also heals nothing.
#[must_use]
pub fn calculate_auto_heal(character: &Character, now_ms: u64, force_full: bool) -> HealedPools {
    if force_full {
        return HealedPools {
            hp: character.max_hp,
            mana: character.max_mana,
        };
    }
    let unchanged = HealedPools {
        hp: character.hp,
        mana: character.mana,
    };
    let Some(last_ms) = character.last_activity_ms else {
        return unchanged;
    };
    if character.pools_full() {
        return unchanged;
    }
    let elapsed_secs = u64_to_f64(now_ms.saturating_sub(last_ms)) / 1_000.0;
    if elapsed_secs < AUTO_HEAL_MIN_ELAPSED_SECS {
        return unchanged;
    }
    let healed_pct = elapsed_secs * (AUTO_HEAL_PCT_SPAN / AUTO_HEAL_WINDOW_SECS);
    HealedPools {
        hp: heal_pool(character.hp, character.max_hp, healed_pct),
        mana: heal_pool(character.mana, character.max_mana, healed_pct),
    }
}

/// Heal one pool by `healed_pct` percentage points, never past `max` and
/// never below the current value.
fn heal_pool(current: i32, max: i32, healed_pct: f64) -> i32 {
    if max <= 0 || current >= max {
        return current;
    }
    let current_pct = (f64::from(current) / f64::from(max) * 100.0).max(AUTO_HEAL_MIN_PCT);
    let target_pct = (current_pct + healed_pct).min(100.0);
    let healed = floor_f64_to_i32(target_pct / 100.0 * f64::from(max));
    healed.clamp(current, max)
}
