//! Active spell and status effects rendered on a character or enemy.
//!
//! The client only displays these bags; server-side turn resolution
//! consumes values and decrements durations.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Effect lists are short, so four entries stay inline per group.
pub type EffectList = SmallVec<[ActiveEffect; 4]>;

/// How an effect's value applies to its target stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectValueKind {
    /// Flat additive value.
    Flat,
    /// Percentage of the target stat.
    Percentage,
}

/// One time-limited modification sourced from a spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub source_spell: String,
    pub value: i32,
    pub kind: EffectValueKind,
    /// Turns remaining before the server drops the effect.
    pub remaining_turns: u32,
}

impl ActiveEffect {
    #[must_use]
    pub fn new(source_spell: &str, value: i32, kind: EffectValueKind, remaining_turns: u32) -> Self {
        Self {
            source_spell: source_spell.to_string(),
            value,
            kind,
            remaining_turns,
        }
    }
}

/// Grouped effect bags, mirroring the wire layout the backend sends.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActiveEffects {
    #[serde(default)]
    pub buffs: EffectList,
    #[serde(default)]
    pub debuffs: EffectList,
    #[serde(default)]
    pub damage_over_time: EffectList,
    #[serde(default)]
    pub heal_over_time: EffectList,
    #[serde(default)]
    pub attribute_mods: EffectList,
}

impl ActiveEffects {
    /// Total number of effects across every group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffs.len()
            + self.debuffs.len()
            + self.damage_over_time.len()
            + self.heal_over_time.len()
            + self.attribute_mods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_counts_add_up() {
        let mut fx = ActiveEffects::default();
        assert!(fx.is_empty());
        fx.buffs
            .push(ActiveEffect::new("war_cry", 5, EffectValueKind::Flat, 3));
        fx.damage_over_time
            .push(ActiveEffect::new("poison", 2, EffectValueKind::Flat, 4));
        fx.attribute_mods
            .push(ActiveEffect::new("hex", -10, EffectValueKind::Percentage, 2));
        assert_eq!(fx.len(), 3);
        assert!(!fx.is_empty());
    }

    #[test]
    fn effects_survive_serde_round_trip() {
        let mut fx = ActiveEffects::default();
        fx.heal_over_time
            .push(ActiveEffect::new("regrowth", 8, EffectValueKind::Percentage, 5));
        let json = serde_json::to_string(&fx).expect("serialize effects");
        let back: ActiveEffects = serde_json::from_str(&json).expect("deserialize effects");
        assert_eq!(back, fx);
    }
}
