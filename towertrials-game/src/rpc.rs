//! The remote procedure boundary.
//!
//! Every gameplay mutation and every authoritative read goes through
//! [`GameBackend`]. The trait is object-safe and `?Send` because the client
//! runs single-threaded and cooperative; implementations decide transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::checkpoint::Checkpoint;
use crate::state::{Character, CharacterId, Consumable, Monster, Spell, UserId};
use crate::stats::{DerivedStats, EquipmentBonuses};

/// Failure surfaced by a backend call.
///
/// `Clone` so one in-flight operation can broadcast its outcome to every
/// de-duplicated awaiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Transport-level failure: the call never reached the backend.
    #[error("network error during {call}: {message}")]
    Network {
        call: &'static str,
        message: String,
    },
    /// The backend processed and rejected the call.
    #[error("backend rejected {call}: {message}")]
    Rejected {
        call: &'static str,
        message: String,
    },
    /// Client-side pre-validation stopped the call before sending.
    #[error("invalid argument for {call}: {message}")]
    InvalidArgument {
        call: &'static str,
        message: String,
    },
    /// The requested row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
}

/// Ranking board orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    Floor,
    Level,
    Gold,
}

impl RankingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::Level => "level",
            Self::Gold => "gold",
        }
    }
}

impl fmt::Display for RankingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "floor" => Ok(Self::Floor),
            "level" => Ok(Self::Level),
            "gold" => Ok(Self::Gold),
            _ => Err(()),
        }
    }
}

/// Filter for ranked characters by liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingStatusFilter {
    #[default]
    All,
    Alive,
    Dead,
}

/// Query shape for the global ranking board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingQuery {
    pub mode: RankingMode,
    pub limit: usize,
    #[serde(default)]
    pub status: RankingStatusFilter,
    #[serde(default)]
    pub name_filter: Option<String>,
    #[serde(default)]
    pub page: usize,
}

impl RankingQuery {
    #[must_use]
    pub const fn new(mode: RankingMode, limit: usize) -> Self {
        Self {
            mode,
            limit,
            status: RankingStatusFilter::All,
            name_filter: None,
            page: 0,
        }
    }
}

/// A submitted score row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub user_id: UserId,
    pub character_id: CharacterId,
    pub character_name: String,
    pub floor: u32,
    pub level: u32,
    pub gold: i64,
    #[serde(default)]
    pub alive: bool,
}

/// One row of a ranking board response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub entry: ScoreEntry,
}

/// Aggregate statistics for one user across their characters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub characters: usize,
    pub best_floor: u32,
    pub best_level: u32,
    pub total_gold: i64,
}

/// Requested attribute point spend, validated client-side before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeDistribution {
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub vitality: i32,
    pub luck: i32,
}

impl AttributeDistribution {
    /// Points requested across all six attributes.
    #[must_use]
    pub const fn total(&self) -> i32 {
        self.strength + self.dexterity + self.intelligence + self.wisdom + self.vitality + self.luck
    }

    /// Whether any component is negative.
    #[must_use]
    pub const fn has_negative(&self) -> bool {
        self.strength < 0
            || self.dexterity < 0
            || self.intelligence < 0
            || self.wisdom < 0
            || self.vitality < 0
            || self.luck < 0
    }
}

/// Backend acknowledgement of an attribute spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDistributionResult {
    pub spent: i32,
    pub remaining: i32,
}

/// The opaque remote backend every gameplay operation talks to.
///
/// Implementations perform the actual math (combat, rewards, stat
/// formulas); the client only sequences calls and displays results.
#[async_trait(?Send)]
pub trait GameBackend {
    /// Fetch the authoritative character row.
    async fn get_character(&self, id: CharacterId) -> Result<Character, RpcError>;

    /// Run the server-side derived-stat formula for a character.
    async fn get_base_stats(&self, id: CharacterId) -> Result<DerivedStats, RpcError>;

    /// Fetch flat equipment bonus totals.
    async fn get_equipment_bonuses(&self, id: CharacterId) -> Result<EquipmentBonuses, RpcError>;

    /// Fetch the character's currently equipped spells.
    async fn get_equipped_spells(&self, id: CharacterId) -> Result<Vec<Spell>, RpcError>;

    /// Fetch the character's consumable inventory snapshot.
    async fn get_consumables(&self, id: CharacterId) -> Result<Vec<Consumable>, RpcError>;

    /// Persist new pool values. Callers must pre-validate the range.
    async fn update_hp_mana(
        &self,
        id: CharacterId,
        hp: Option<i32>,
        mana: Option<i32>,
    ) -> Result<(), RpcError>;

    /// Persist a floor change.
    async fn update_floor(&self, id: CharacterId, floor: u32) -> Result<(), RpcError>;

    /// Checkpoints the character may resume from.
    async fn get_unlocked_checkpoints(&self, id: CharacterId) -> Result<Vec<Checkpoint>, RpcError>;

    /// Spend unspent attribute points.
    async fn distribute_attribute_points(
        &self,
        id: CharacterId,
        distribution: AttributeDistribution,
    ) -> Result<AttributeDistributionResult, RpcError>;

    /// Roll or fetch the enemy for a floor.
    async fn get_monster_for_floor(&self, floor: u32) -> Result<Monster, RpcError>;

    /// Submit a score row to the ranking boards.
    async fn save_score(&self, entry: ScoreEntry) -> Result<(), RpcError>;

    /// Query the global ranking board.
    async fn global_ranking(&self, query: RankingQuery) -> Result<Vec<RankingEntry>, RpcError>;

    /// Best ranked row for one user in one mode.
    async fn user_ranking(
        &self,
        user: UserId,
        mode: RankingMode,
    ) -> Result<Option<RankingEntry>, RpcError>;

    /// Aggregate stats across one user's characters.
    async fn user_stats(&self, user: UserId) -> Result<UserStats, RpcError>;
}

/// Client-side validated wrapper for [`GameBackend::update_hp_mana`].
///
/// Pool values must be integers in `[0, 9999]`; anything else is rejected
/// here, before the call is sent.
///
/// # Errors
///
/// `InvalidArgument` for out-of-range values, otherwise whatever the
/// backend returns.
pub async fn push_hp_mana<B>(
    backend: &B,
    id: CharacterId,
    hp: Option<i32>,
    mana: Option<i32>,
) -> Result<(), RpcError>
where
    B: GameBackend + ?Sized,
{
    for (label, value) in [("hp", hp), ("mana", mana)] {
        if let Some(value) = value
            && !(0..=crate::constants::HP_MANA_RPC_MAX).contains(&i64::from(value))
        {
            return Err(RpcError::InvalidArgument {
                call: "update_hp_mana",
                message: format!(
                    "{label} {value} outside [0, {}]",
                    crate::constants::HP_MANA_RPC_MAX
                ),
            });
        }
    }
    backend.update_hp_mana(id, hp, mana).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, sample_character};
    use futures::executor::block_on;

    #[test]
    fn ranking_mode_round_trips_through_str() {
        for mode in [RankingMode::Floor, RankingMode::Level, RankingMode::Gold] {
            assert_eq!(mode.as_str().parse::<RankingMode>(), Ok(mode));
        }
        assert!("fame".parse::<RankingMode>().is_err());
    }

    #[test]
    fn distribution_totals_and_negativity() {
        let dist = AttributeDistribution {
            strength: 2,
            vitality: 3,
            ..AttributeDistribution::default()
        };
        assert_eq!(dist.total(), 5);
        assert!(!dist.has_negative());
        let bad = AttributeDistribution {
            luck: -1,
            ..AttributeDistribution::default()
        };
        assert!(bad.has_negative());
    }

    #[test]
    fn pool_updates_outside_bounds_never_reach_the_backend() {
        let backend = MemoryBackend::new(1);
        backend.insert_character(sample_character(1, "Tess"));
        for (hp, mana) in [(Some(-1), None), (Some(10_000), None), (None, Some(-5))] {
            let err = block_on(push_hp_mana(&backend, 1, hp, mana)).unwrap_err();
            assert!(matches!(err, RpcError::InvalidArgument { .. }));
        }
        assert_eq!(backend.call_count("update_hp_mana"), 0);
        block_on(push_hp_mana(&backend, 1, Some(80), Some(40))).expect("in-range update");
        assert_eq!(backend.call_count("update_hp_mana"), 1);
    }
}
