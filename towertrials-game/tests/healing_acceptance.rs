//! Auto-heal behavior driven through the full session path.

use std::rc::Rc;

use towertrials_game::{
    Clock, GameBackend, GameSession, ManualClock, MemoryBackend, calculate_auto_heal,
    sample_character,
};

const HOUR_MS: u64 = 3_600_000;

fn wounded_harness(last_activity_ms: Option<u64>) -> (GameSession<MemoryBackend>, Rc<ManualClock>) {
    let backend = MemoryBackend::new(3);
    let mut character = sample_character(1, "Fen");
    character.max_hp = 200;
    character.max_mana = 100;
    character.hp = 20;
    character.mana = 10;
    character.last_activity_ms = last_activity_ms;
    backend.insert_character(character);
    let clock = Rc::new(ManualClock::starting_at(last_activity_ms.unwrap_or(0)));
    let session = GameSession::with_clock(backend, Rc::clone(&clock) as Rc<dyn Clock>);
    (session, clock)
}

#[tokio::test]
async fn idle_time_heals_on_select_and_persists() {
    let (session, clock) = wounded_harness(Some(HOUR_MS));
    clock.advance(HOUR_MS);
    session.select_character(1).await.expect("select");
    let row = session.backend().character_row(1).expect("row");
    assert!(row.hp > 20, "an idle hour must heal");
    assert!(row.hp < row.max_hp, "one hour is half the window");
    let displayed = session.snapshot().player.expect("player").character.hp;
    assert_eq!(displayed, row.hp, "displayed pools match the persisted row");
}

#[tokio::test]
async fn select_twice_at_the_same_instant_pushes_once() {
    let (session, clock) = wounded_harness(Some(HOUR_MS));
    clock.advance(HOUR_MS);
    session.select_character(1).await.expect("first select");
    let pushes = session.backend().call_count("update_hp_mana");
    session.select_character(1).await.expect("second select");
    assert_eq!(
        session.backend().call_count("update_hp_mana"),
        pushes,
        "same-instant reload must not double-apply healing"
    );
}

#[tokio::test]
async fn full_window_idle_restores_everything() {
    let (session, clock) = wounded_harness(Some(0));
    {
        let backend = session.backend();
        backend.update_hp_mana(1, Some(1), Some(1)).await.expect("wound");
        backend.set_last_activity(1, Some(0));
    }
    clock.set(7_200_000);
    session.select_character(1).await.expect("select");
    let row = session.backend().character_row(1).expect("row");
    assert_eq!(row.hp, row.max_hp);
    assert_eq!(row.mana, row.max_mana);
}

#[tokio::test]
async fn hub_return_forces_full_pools_regardless_of_idle_time() {
    let (session, clock) = wounded_harness(Some(HOUR_MS));
    clock.advance(1); // no meaningful idle credit
    session.select_character(1).await.expect("select");
    session.return_to_hub(1).await.expect("hub");
    let row = session.backend().character_row(1).expect("row");
    assert_eq!(row.hp, row.max_hp);
    assert_eq!(row.mana, row.max_mana);
}

#[tokio::test]
async fn no_activity_timestamp_means_no_idle_credit() {
    let (session, clock) = wounded_harness(None);
    clock.advance(10 * HOUR_MS);
    session.select_character(1).await.expect("select");
    let row = session.backend().character_row(1).expect("row");
    assert_eq!(row.hp, 20);
    assert_eq!(row.mana, 10);
}

#[test]
fn session_and_pure_calculator_agree() {
    let mut character = sample_character(9, "Wren");
    character.max_hp = 300;
    character.hp = 30;
    character.max_mana = 150;
    character.mana = 15;
    character.last_activity_ms = Some(0);
    for offset_ms in [1_000u64, HOUR_MS, 2 * HOUR_MS, 5 * HOUR_MS] {
        let pools = calculate_auto_heal(&character, offset_ms, false);
        assert!(pools.hp >= character.hp);
        assert!(pools.hp <= character.max_hp);
        assert!(pools.mana >= character.mana);
        assert!(pools.mana <= character.max_mana);
    }
    let full = calculate_auto_heal(&character, 2 * HOUR_MS, false);
    assert_eq!(full.hp, character.max_hp);
    assert_eq!(full.mana, character.max_mana);
}
