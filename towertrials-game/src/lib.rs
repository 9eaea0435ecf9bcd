//! Tower Trials Client Core
//!
//! Platform-agnostic client logic for the Tower Trials browser RPG: the
//! state synchronization and caching layer between an opaque RPC backend
//! and whatever front end renders the store. Gameplay math (combat, reward
//! rolls, stat formulas) lives behind the [`GameBackend`] boundary; this
//! crate sequences calls, reconciles authoritative state with displayed
//! state, and keeps the overlapping caches coherent.

pub mod autoheal;
pub mod backend;
pub mod cache;
pub mod checkpoint;
pub mod constants;
pub mod effects;
pub mod numbers;
pub mod rpc;
pub mod session;
pub mod state;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use autoheal::{HealedPools, calculate_auto_heal};
pub use backend::{
    MemoryBackend, sample_character, sample_consumables, sample_monster, sample_spells,
};
pub use cache::{Clock, GameCaches, ManualClock, SystemClock, TtlCache};
pub use checkpoint::{
    Checkpoint, CheckpointError, is_valid_checkpoint_floor, reset_progress,
    start_from_checkpoint, unlocked_checkpoints,
};
pub use effects::{ActiveEffect, ActiveEffects, EffectValueKind};
pub use rpc::{
    AttributeDistribution, AttributeDistributionResult, GameBackend, RankingEntry, RankingMode,
    RankingQuery, RankingStatusFilter, RpcError, ScoreEntry, UserStats, push_hp_mana,
};
pub use session::{BattleOutcome, GameError, GameSession, LoadPolicy};
pub use state::{
    Attributes, BattleRewards, Character, CharacterId, Consumable, GamePlayer, MasteryProgress,
    Monster, Spell, SpellKind, TurnFlags, UserId, WeaponKind,
};
pub use stats::{
    DerivedStats, EquipmentBonuses, StatBreakdown, apply_equipment, stats_with_equipment,
};
pub use store::{GameMode, GameStore, StoreError};
