//! Checkpoint schedule, transition atomicity, and death resets.

use std::rc::Rc;

use towertrials_game::{
    BattleOutcome, CheckpointError, Clock, GameBackend, GameError, GameMode, GameSession,
    ManualClock, MemoryBackend, sample_character,
};

fn harness_at_floor(highest: u32) -> GameSession<MemoryBackend> {
    let backend = MemoryBackend::new(5);
    let mut character = sample_character(1, "Ivy");
    character.floor = highest;
    character.highest_floor = highest;
    backend.insert_character(character);
    GameSession::with_clock(backend, Rc::new(ManualClock::starting_at(0)) as Rc<dyn Clock>)
}

#[tokio::test]
async fn unlocked_checkpoints_follow_the_schedule() {
    let session = harness_at_floor(23);
    let checkpoints = session.unlocked_checkpoints(1).await.expect("fetch");
    let floors: Vec<u32> = checkpoints.iter().map(|c| c.floor).collect();
    assert_eq!(floors, vec![1, 5, 20]);
}

#[tokio::test]
async fn fresh_character_only_sees_the_entrance() {
    let session = harness_at_floor(1);
    let checkpoints = session.unlocked_checkpoints(1).await.expect("fetch");
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(checkpoints[0].floor, 1);
}

#[tokio::test]
async fn locked_checkpoint_is_rejected_without_rpc() {
    let session = harness_at_floor(23);
    let err = session.start_from_checkpoint(1, 30).await.unwrap_err();
    assert_eq!(
        err,
        GameError::Checkpoint(CheckpointError::InvalidCheckpoint { floor: 30 })
    );
    assert_eq!(session.backend().call_count("update_floor"), 0);
    assert_eq!(session.backend().call_count("update_hp_mana"), 0);
}

#[tokio::test]
async fn off_schedule_floor_is_rejected_even_when_reached() {
    let session = harness_at_floor(23);
    for bad_floor in [0, 4, 15, 23] {
        let err = session.start_from_checkpoint(1, bad_floor).await.unwrap_err();
        assert!(
            matches!(
                err,
                GameError::Checkpoint(CheckpointError::InvalidCheckpoint { .. })
            ),
            "floor {bad_floor} must be rejected"
        );
    }
    assert_eq!(session.backend().call_count("update_floor"), 0);
}

#[tokio::test]
async fn failed_floor_update_suppresses_the_heal() {
    let session = harness_at_floor(23);
    session.backend().set_floor_outage(true);
    let err = session.start_from_checkpoint(1, 20).await.unwrap_err();
    assert!(matches!(err, GameError::Checkpoint(CheckpointError::Rpc(_))));
    assert_eq!(session.backend().call_count("update_floor"), 1);
    assert_eq!(
        session.backend().call_count("update_hp_mana"),
        0,
        "the heal must never run after a failed floor update"
    );
    let row = session.backend().character_row(1).expect("row");
    assert_eq!(row.floor, 23, "no partial mutation");
}

#[tokio::test]
async fn checkpoint_start_moves_heals_and_enters_hub() {
    let session = harness_at_floor(23);
    session
        .backend()
        .update_hp_mana(1, Some(2), Some(0))
        .await
        .expect("wound the character");
    session.start_from_checkpoint(1, 20).await.expect("restart");
    let row = session.backend().character_row(1).expect("row");
    assert_eq!(row.floor, 20);
    assert_eq!(row.hp, row.max_hp);
    assert_eq!(row.mana, row.max_mana);
    assert_eq!(row.highest_floor, 23, "restarting lower keeps the record");
    let store = session.snapshot();
    assert_eq!(store.mode, GameMode::Hub);
    assert_eq!(store.current_floor, 20);
}

#[tokio::test]
async fn death_without_retry_resets_to_the_entrance_and_menu() {
    let session = harness_at_floor(23);
    session.select_character(1).await.expect("select");
    session
        .finish_battle(1, BattleOutcome::Defeat { retry_from: None })
        .await
        .expect("defeat");
    let row = session.backend().character_row(1).expect("row");
    assert_eq!(row.floor, 1);
    assert_eq!(row.hp, row.max_hp);
    let store = session.snapshot();
    assert_eq!(store.mode, GameMode::Menu);
    assert!(store.player.is_none());
}

#[tokio::test]
async fn death_with_retry_resumes_from_the_checkpoint() {
    let session = harness_at_floor(23);
    session.select_character(1).await.expect("select");
    session
        .finish_battle(1, BattleOutcome::Defeat { retry_from: Some(20) })
        .await
        .expect("retry");
    let row = session.backend().character_row(1).expect("row");
    assert_eq!(row.floor, 20);
    assert_eq!(row.hp, row.max_hp);
    let store = session.snapshot();
    assert_eq!(store.mode, GameMode::Hub);
    assert_eq!(store.current_floor, 20);
}

#[tokio::test]
async fn climbing_tracks_floor_and_record() {
    let session = harness_at_floor(1);
    session.select_character(1).await.expect("select");
    for expected in 2..=6 {
        session.advance_floor(1).await.expect("climb");
        assert_eq!(session.snapshot().current_floor, expected);
    }
    let row = session.backend().character_row(1).expect("row");
    assert_eq!(row.floor, 6);
    assert_eq!(row.highest_floor, 6);
    let floors: Vec<u32> = session
        .unlocked_checkpoints(1)
        .await
        .expect("fetch")
        .iter()
        .map(|c| c.floor)
        .collect();
    assert_eq!(floors, vec![1, 5], "floor 5 unlocked on the way up");
}

#[tokio::test]
async fn attribute_spend_refreshes_the_projection() {
    let session = harness_at_floor(1);
    {
        let backend = session.backend();
        let mut row = backend.character_row(1).expect("row");
        row.unspent_points = 5;
        backend.insert_character(row);
    }
    session.select_character(1).await.expect("select");
    let before = session
        .snapshot()
        .player
        .expect("player")
        .stats
        .base
        .atk;
    let result = session
        .distribute_attributes(
            1,
            towertrials_game::AttributeDistribution {
                strength: 3,
                ..Default::default()
            },
        )
        .await
        .expect("spend");
    assert_eq!(result.spent, 3);
    assert_eq!(result.remaining, 2);
    let player = session.snapshot().player.expect("player");
    assert_eq!(player.character.unspent_points, 2);
    assert!(
        player.stats.base.atk > before,
        "strength must feed the derived attack"
    );
}

#[tokio::test]
async fn overdraw_is_rejected_before_rpc() {
    let session = harness_at_floor(1);
    session.select_character(1).await.expect("select");
    let err = session
        .distribute_attributes(
            1,
            towertrials_game::AttributeDistribution {
                vitality: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Validation(_)));
    assert_eq!(session.backend().call_count("distribute_attribute_points"), 0);
}
