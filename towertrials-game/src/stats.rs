//! Effective stat aggregation: base derived stats plus equipment totals.
//!
//! The derived-stat formula itself lives behind the backend boundary; this
//! module owns its output shape and the additive equipment layer so the UI
//! can render "10 (+5)" style breakdowns.

use serde::{Deserialize, Serialize};

use crate::rpc::{GameBackend, RpcError};
use crate::state::Character;

/// Derived combat stats as produced by the backend formula.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedStats {
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub atk: i32,
    pub def: i32,
    pub speed: i32,
    pub critical_chance: f32,
    pub critical_damage: f32,
    pub magic_attack: i32,
    pub magic_damage_bonus: f32,
    pub double_attack_chance: f32,
}

/// Flat additive bonus totals across currently equipped items.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EquipmentBonuses {
    #[serde(default)]
    pub total_atk_bonus: i32,
    #[serde(default)]
    pub total_def_bonus: i32,
    #[serde(default)]
    pub total_mana_bonus: i32,
    #[serde(default)]
    pub total_speed_bonus: i32,
    #[serde(default)]
    pub total_hp_bonus: i32,
    #[serde(default)]
    pub total_critical_chance_bonus: f32,
    #[serde(default)]
    pub total_critical_damage_bonus: f32,
}

impl EquipmentBonuses {
    /// The graceful-degradation value used when the bonus fetch fails.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            total_atk_bonus: 0,
            total_def_bonus: 0,
            total_mana_bonus: 0,
            total_speed_bonus: 0,
            total_hp_bonus: 0,
            total_critical_chance_bonus: 0.0,
            total_critical_damage_bonus: 0.0,
        }
    }

    /// Clamp negative totals to zero. There are no cursed items in this
    /// model, so anything below zero is a corrupted payload.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let clamped = Self {
            total_atk_bonus: self.total_atk_bonus.max(0),
            total_def_bonus: self.total_def_bonus.max(0),
            total_mana_bonus: self.total_mana_bonus.max(0),
            total_speed_bonus: self.total_speed_bonus.max(0),
            total_hp_bonus: self.total_hp_bonus.max(0),
            total_critical_chance_bonus: self.total_critical_chance_bonus.max(0.0),
            total_critical_damage_bonus: self.total_critical_damage_bonus.max(0.0),
        };
        if clamped != self {
            log::warn!("negative equipment bonus totals clamped to zero: {self:?}");
        }
        clamped
    }
}

/// Base and effective stats side by side, plus the bonuses between them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatBreakdown {
    pub base: DerivedStats,
    pub equipment: EquipmentBonuses,
    pub total: DerivedStats,
}

/// Layer sanitized equipment totals on top of base derived stats.
///
/// HP and mana bonuses raise both the current and the max pool so the
/// current-value ratio is preserved until the caller re-clamps.
#[must_use]
pub fn apply_equipment(base: DerivedStats, bonuses: EquipmentBonuses) -> DerivedStats {
    let eq = bonuses.sanitized();
    DerivedStats {
        hp: base.hp + eq.total_hp_bonus,
        max_hp: base.max_hp + eq.total_hp_bonus,
        mana: base.mana + eq.total_mana_bonus,
        max_mana: base.max_mana + eq.total_mana_bonus,
        atk: base.atk + eq.total_atk_bonus,
        def: base.def + eq.total_def_bonus,
        speed: base.speed + eq.total_speed_bonus,
        critical_chance: base.critical_chance + eq.total_critical_chance_bonus,
        critical_damage: base.critical_damage + eq.total_critical_damage_bonus,
        magic_attack: base.magic_attack,
        magic_damage_bonus: base.magic_damage_bonus,
        double_attack_chance: base.double_attack_chance,
    }
}

/// Fetch base stats and equipment totals and combine them.
///
/// A failed base-stat fetch propagates; a failed equipment fetch degrades
/// to zero bonuses, since a missing equipment display is non-fatal.
///
/// # Errors
///
/// Returns the underlying [`RpcError`] when the base-stat call fails.
pub async fn stats_with_equipment<B>(
    backend: &B,
    character: &Character,
) -> Result<StatBreakdown, RpcError>
where
    B: GameBackend + ?Sized,
{
    let base = backend.get_base_stats(character.id).await?;
    let equipment = match backend.get_equipment_bonuses(character.id).await {
        Ok(bonuses) => bonuses.sanitized(),
        Err(err) => {
            log::warn!(
                "equipment bonus fetch failed for character {}: {err}; using zero bonuses",
                character.id
            );
            EquipmentBonuses::zero()
        }
    };
    Ok(StatBreakdown {
        base,
        equipment,
        total: apply_equipment(base, equipment),
    })
}
