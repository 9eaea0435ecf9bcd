//! Centralized tuning constants for the Tower Trials client core.
//!
//! These values define the deterministic math for auto-heal, cache
//! lifetimes, and RPC bounds. Keeping them together ensures gameplay
//! tuning can only change via reviewed code, not scattered literals.

// Auto-heal ----------------------------------------------------------------
/// Wall-clock window over which a character heals from empty to full.
pub const AUTO_HEAL_WINDOW_SECS: f64 = 7_200.0;
/// Percentage span covered by the heal window (0.1% floor up to 100%).
pub const AUTO_HEAL_PCT_SPAN: f64 = 99.9;
/// Floor applied to the current pool percentage so 0 HP still heals.
pub const AUTO_HEAL_MIN_PCT: f64 = 0.1;
/// Elapsed spans shorter than this heal nothing.
pub const AUTO_HEAL_MIN_ELAPSED_SECS: f64 = 1.0;

// Cache lifetimes ----------------------------------------------------------
/// Character snapshots stay fresh for one minute unless invalidated.
pub const CHARACTER_CACHE_TTL_MS: u64 = 60_000;
/// Monster rolls are floor-scoped and expire quickly.
pub const MONSTER_CACHE_TTL_MS: u64 = 30_000;
/// Minimum interval between effective clear-all sweeps.
pub const CACHE_CLEAR_THROTTLE_MS: u64 = 1_000;

// RPC bounds ---------------------------------------------------------------
/// Upper bound accepted by the hp/mana update call; enforced client-side.
pub const HP_MANA_RPC_MAX: i64 = 9_999;

// Checkpoint schedule ------------------------------------------------------
/// Every character can always restart from the tower entrance.
pub const CHECKPOINT_ENTRANCE_FLOOR: u32 = 1;
/// First earned checkpoint.
pub const CHECKPOINT_EARLY_FLOOR: u32 = 5;
/// Regular checkpoints repeat at this stride from `CHECKPOINT_REGULAR_START`.
pub const CHECKPOINT_REGULAR_START: u32 = 20;
pub const CHECKPOINT_REGULAR_STRIDE: u32 = 10;
