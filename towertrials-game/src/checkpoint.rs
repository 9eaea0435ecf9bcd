//! Checkpoint schedule and floor progression.
//!
//! Checkpoints are never stored; the schedule derives deterministically
//! from a character's highest reached floor. A checkpoint start is a safe
//! zone reset: floor update first, then a forced full heal, and the heal
//! must never run when the floor update fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    CHECKPOINT_EARLY_FLOOR, CHECKPOINT_ENTRANCE_FLOOR, CHECKPOINT_REGULAR_START,
    CHECKPOINT_REGULAR_STRIDE,
};
use crate::rpc::{GameBackend, RpcError};
use crate::state::Character;

/// A floor a character may resume from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub floor: u32,
    pub description: String,
}

impl Checkpoint {
    #[must_use]
    pub fn at(floor: u32) -> Self {
        let description = if floor == CHECKPOINT_ENTRANCE_FLOOR {
            "Tower entrance".to_string()
        } else {
            format!("Floor {floor} checkpoint")
        };
        Self { floor, description }
    }
}

/// Progression failures. RPC errors pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    /// The target is not a checkpoint floor, or not yet unlocked.
    #[error("floor {floor} is not an unlocked checkpoint")]
    InvalidCheckpoint { floor: u32 },
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Whether a floor number is on the checkpoint schedule at all.
#[must_use]
pub const fn is_valid_checkpoint_floor(floor: u32) -> bool {
    floor == CHECKPOINT_ENTRANCE_FLOOR
        || floor == CHECKPOINT_EARLY_FLOOR
        || (floor >= CHECKPOINT_REGULAR_START && floor % CHECKPOINT_REGULAR_STRIDE == 0)
}

/// Compute the unlocked schedule for a character's highest floor: the
/// entrance always, floor 5 once reached, then every multiple of 10 from
/// 20 up to the highest floor.
#[must_use]
pub fn unlocked_checkpoints(highest_floor: u32) -> Vec<Checkpoint> {
    let mut checkpoints = vec![Checkpoint::at(CHECKPOINT_ENTRANCE_FLOOR)];
    if highest_floor >= CHECKPOINT_EARLY_FLOOR {
        checkpoints.push(Checkpoint::at(CHECKPOINT_EARLY_FLOOR));
    }
    let mut floor = CHECKPOINT_REGULAR_START;
    while floor <= highest_floor {
        checkpoints.push(Checkpoint::at(floor));
        floor += CHECKPOINT_REGULAR_STRIDE;
    }
    checkpoints
}

/// Move a character to an unlocked checkpoint and fully heal them.
///
/// Validation happens before any RPC; an invalid or locked target mutates
/// nothing. The floor update and the heal execute strictly in order, so a
/// failed floor update leaves the pools untouched.
///
/// # Errors
///
/// `InvalidCheckpoint` for off-schedule or locked floors, otherwise the
/// underlying [`RpcError`].
pub async fn start_from_checkpoint<B>(
    backend: &B,
    character: &Character,
    target_floor: u32,
) -> Result<(), CheckpointError>
where
    B: GameBackend + ?Sized,
{
    if !is_valid_checkpoint_floor(target_floor) || target_floor > character.highest_floor {
        return Err(CheckpointError::InvalidCheckpoint {
            floor: target_floor,
        });
    }
    backend.update_floor(character.id, target_floor).await?;
    backend
        .update_hp_mana(character.id, Some(character.max_hp), Some(character.max_mana))
        .await?;
    log::info!(
        "character {} resumed from checkpoint floor {target_floor}",
        character.id
    );
    Ok(())
}

/// Death transition: back to the tower entrance with a full heal.
///
/// # Errors
///
/// Returns the underlying [`RpcError`] when either call fails.
pub async fn reset_progress<B>(backend: &B, character: &Character) -> Result<(), CheckpointError>
where
    B: GameBackend + ?Sized,
{
    backend
        .update_floor(character.id, CHECKPOINT_ENTRANCE_FLOOR)
        .await?;
    backend
        .update_hp_mana(character.id, Some(character.max_hp), Some(character.max_mana))
        .await?;
    log::info!("character {} reset to the tower entrance", character.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_membership_matches_the_rule() {
        for floor in 0..200 {
            let expected = floor == 1 || floor == 5 || (floor >= 20 && floor % 10 == 0);
            assert_eq!(
                is_valid_checkpoint_floor(floor),
                expected,
                "floor {floor} misclassified"
            );
        }
    }

    #[test]
    fn highest_23_unlocks_exactly_three() {
        let floors: Vec<u32> = unlocked_checkpoints(23).iter().map(|c| c.floor).collect();
        assert_eq!(floors, vec![1, 5, 20]);
    }

    #[test]
    fn fresh_character_only_has_the_entrance() {
        let checkpoints = unlocked_checkpoints(1);
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].floor, 1);
        assert_eq!(checkpoints[0].description, "Tower entrance");
    }

    #[test]
    fn deep_runs_unlock_every_tenth_floor() {
        let floors: Vec<u32> = unlocked_checkpoints(55).iter().map(|c| c.floor).collect();
        assert_eq!(floors, vec![1, 5, 20, 30, 40, 50]);
    }

    #[test]
    fn floor_four_is_not_a_checkpoint_yet() {
        let floors: Vec<u32> = unlocked_checkpoints(4).iter().map(|c| c.floor).collect();
        assert_eq!(floors, vec![1]);
    }
}
