//! Authoritative and derived character state for the Tower Trials client.
//!
//! `Character` mirrors the backend-owned record and is only ever mutated
//! through RPC calls. `GamePlayer` is a read projection composed on every
//! load from the character row plus equipment and spell fetches; it is
//! never persisted and always rebuildable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::effects::ActiveEffects;
use crate::numbers;
use crate::stats::StatBreakdown;

/// Backend row identifier for a character.
pub type CharacterId = u64;
/// Backend row identifier for an owning user.
pub type UserId = u64;

/// The six primary attributes driving the derived stat formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub vitality: i32,
    pub luck: i32,
}

impl Attributes {
    /// Sum of all six attributes.
    #[must_use]
    pub const fn total(&self) -> i32 {
        self.strength + self.dexterity + self.intelligence + self.wisdom + self.vitality + self.luck
    }
}

/// Weapon categories tracked by the mastery system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponKind {
    Sword,
    Axe,
    Dagger,
    Staff,
    Bow,
}

impl WeaponKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sword => "sword",
            Self::Axe => "axe",
            Self::Dagger => "dagger",
            Self::Staff => "staff",
            Self::Bow => "bow",
        }
    }
}

impl fmt::Display for WeaponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeaponKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sword" => Ok(Self::Sword),
            "axe" => Ok(Self::Axe),
            "dagger" => Ok(Self::Dagger),
            "staff" => Ok(Self::Staff),
            "bow" => Ok(Self::Bow),
            _ => Err(()),
        }
    }
}

/// Mastery progress for one weapon category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MasteryProgress {
    pub level: u32,
    pub experience: u64,
}

/// Authoritative character record, owned by the backend.
///
/// The client holds a read/write-through cached copy; final stat changes
/// are always computed server-side and only displayed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub user_id: UserId,
    pub name: String,
    pub level: u32,
    pub experience: u64,
    pub gold: i64,
    pub attack: i32,
    pub defense: i32,
    pub speed: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub attributes: Attributes,
    #[serde(default)]
    pub unspent_points: i32,
    #[serde(default)]
    pub mastery: Vec<(WeaponKind, MasteryProgress)>,
    pub floor: u32,
    pub highest_floor: u32,
    /// Epoch milliseconds of the last recorded activity; unset for fresh rows.
    #[serde(default)]
    pub last_activity_ms: Option<u64>,
}

impl Character {
    /// Whether both pools are already at their maximums.
    #[must_use]
    pub const fn pools_full(&self) -> bool {
        self.hp >= self.max_hp && self.mana >= self.max_mana
    }

    /// Run every combat field through the central validators. RPC payloads
    /// can arrive partially applied, and arithmetic over absent bonuses
    /// upstream must never leak a corrupted number into display state.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.max_hp = clamp_stat(numbers::validate_number(
            Some(f64::from(self.max_hp)),
            1,
            Some(1),
            None,
        ));
        self.max_mana = clamp_stat(numbers::validate_number(
            Some(f64::from(self.max_mana)),
            0,
            Some(0),
            None,
        ));
        self.hp = clamp_stat(numbers::validate_hp(
            Some(f64::from(self.hp)),
            i64::from(self.max_hp),
        ));
        self.mana = clamp_stat(numbers::validate_mana(
            Some(f64::from(self.mana)),
            i64::from(self.max_mana),
        ));
        self.attack = clamp_stat(numbers::validate_attack(Some(f64::from(self.attack))));
        self.defense = clamp_stat(numbers::validate_defense(Some(f64::from(self.defense))));
        self.speed = clamp_stat(numbers::validate_speed(Some(f64::from(self.speed))));
        self
    }
}

impl Monster {
    /// Same sanitation for enemy snapshots coming off the wire.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.max_hp = clamp_stat(numbers::validate_number(
            Some(f64::from(self.max_hp)),
            1,
            Some(1),
            None,
        ));
        self.hp = clamp_stat(numbers::validate_hp(
            Some(f64::from(self.hp)),
            i64::from(self.max_hp),
        ));
        self.attack = clamp_stat(numbers::validate_attack(Some(f64::from(self.attack))));
        self.defense = clamp_stat(numbers::validate_defense(Some(f64::from(self.defense))));
        self.speed = clamp_stat(numbers::validate_speed(Some(f64::from(self.speed))));
        self
    }
}

fn clamp_stat(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// A spell as equipped on a character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub mana_cost: i32,
    pub base_power: i32,
    pub kind: SpellKind,
}

/// Broad spell archetypes; resolution happens server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellKind {
    Attack,
    Heal,
    Buff,
    Debuff,
}

/// A consumable stack in the play inventory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumable {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub hp_restore: i32,
    #[serde(default)]
    pub mana_restore: i32,
    pub quantity: u32,
}

/// Per-turn flags carried by the play projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnFlags {
    pub is_player_turn: bool,
    pub special_cooldown: u32,
    pub defending: bool,
    pub potion_used_this_turn: bool,
}

/// Enemy snapshot for one floor, produced by the backend and cached by floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    pub id: u64,
    pub name: String,
    pub level: u32,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub speed: i32,
    pub experience_reward: u64,
    pub gold_reward: i64,
}

/// Rewards granted when a battle resolves in the player's favor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BattleRewards {
    pub experience: u64,
    pub gold: i64,
}

/// Client-composed play projection: a character enriched with equipment
/// totals, equipped spells, consumables, active effects, and turn state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePlayer {
    pub character: Character,
    pub stats: StatBreakdown,
    pub spells: Vec<Spell>,
    #[serde(default)]
    pub consumables: Vec<Consumable>,
    #[serde(default)]
    pub effects: ActiveEffects,
    #[serde(default)]
    pub turn: TurnFlags,
}

impl GamePlayer {
    /// Compose the projection from its fetched parts. Effects and turn
    /// state always start empty; the server owns their progression.
    #[must_use]
    pub fn compose(
        character: Character,
        stats: StatBreakdown,
        spells: Vec<Spell>,
        consumables: Vec<Consumable>,
    ) -> Self {
        Self {
            character,
            stats,
            spells,
            consumables,
            effects: ActiveEffects::default(),
            turn: TurnFlags::default(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> CharacterId {
        self.character.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weapon_kind_round_trips_through_str() {
        for kind in [
            WeaponKind::Sword,
            WeaponKind::Axe,
            WeaponKind::Dagger,
            WeaponKind::Staff,
            WeaponKind::Bow,
        ] {
            assert_eq!(kind.as_str().parse::<WeaponKind>(), Ok(kind));
        }
        assert!("halberd".parse::<WeaponKind>().is_err());
    }

    #[test]
    fn sanitized_repairs_corrupted_fields() {
        let mut ch = crate::backend::sample_character(1, "Glitch");
        ch.hp = -20;
        ch.attack = 0;
        ch.defense = -3;
        ch.speed = -1;
        let ch = ch.sanitized();
        assert_eq!(ch.hp, 0);
        assert_eq!(ch.attack, 1);
        assert_eq!(ch.defense, 0);
        assert_eq!(ch.speed, 1);
        assert_eq!(ch.max_hp, 100, "healthy fields pass through untouched");
    }

    #[test]
    fn monster_sanitized_keeps_pools_inside_max() {
        let mut monster = crate::backend::sample_monster(3);
        monster.hp = monster.max_hp + 50;
        monster.speed = 0;
        let monster = monster.sanitized();
        assert_eq!(monster.hp, monster.max_hp);
        assert_eq!(monster.speed, 1);
    }

    #[test]
    fn pools_full_requires_both_pools() {
        let mut ch = crate::backend::sample_character(1, "Nell");
        ch.hp = ch.max_hp;
        ch.mana = ch.max_mana - 1;
        assert!(!ch.pools_full());
        ch.mana = ch.max_mana;
        assert!(ch.pools_full());
    }
}
