//! Named scenarios exercised by the harness.
//!
//! Each scenario drives the public session API the way the UI would and
//! returns human-readable notes on success, or bails with context on the
//! first broken expectation.

use anyhow::{Context, Result, bail, ensure};

use towertrials_game::{
    BattleOutcome, BattleRewards, Clock, GameBackend, GameError, GameMode, RankingMode,
    RankingQuery,
};

use crate::harness::Harness;

const HOUR_MS: u64 = 3_600_000;

/// The scenario catalog, in the order `--scenarios all` runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Smoke,
    Grind,
    Checkpoint,
    Outage,
    IdleHeal,
    Dedup,
}

impl Scenario {
    pub const ALL: [Self; 6] = [
        Self::Smoke,
        Self::Grind,
        Self::Checkpoint,
        Self::Outage,
        Self::IdleHeal,
        Self::Dedup,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::Grind => "grind",
            Self::Checkpoint => "checkpoint",
            Self::Outage => "outage",
            Self::IdleHeal => "idle-heal",
            Self::Dedup => "dedup",
        }
    }

    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Smoke => "select a character and verify the hub commit",
            Self::Grind => "climb floors through battles and check rankings",
            Self::Checkpoint => "die deep in the tower and resume from a checkpoint",
            Self::Outage => "degrade gracefully through backend outages",
            Self::IdleHeal => "credit idle regeneration exactly once",
            Self::Dedup => "overlapping battle inits share one RPC sequence",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == name)
            .with_context(|| format!("unknown scenario '{name}'"))
    }

    /// Run the scenario against a fresh world.
    pub async fn run(self, harness: &Harness) -> Result<Vec<String>> {
        match self {
            Self::Smoke => smoke(harness).await,
            Self::Grind => grind(harness).await,
            Self::Checkpoint => checkpoint(harness).await,
            Self::Outage => outage(harness).await,
            Self::IdleHeal => idle_heal(harness).await,
            Self::Dedup => dedup(harness).await,
        }
    }
}

async fn smoke(harness: &Harness) -> Result<Vec<String>> {
    let session = &harness.session;
    session.select_character(1).await.context("select")?;
    let store = session.snapshot();
    ensure!(store.mode == GameMode::Hub, "expected hub, got {}", store.mode);
    let player = store.player.context("player missing after select")?;
    ensure!(player.spells.len() == 2, "spell book incomplete");
    ensure!(!player.consumables.is_empty(), "potion belt missing");
    ensure!(
        player.stats.total.atk >= player.stats.base.atk,
        "equipment must never reduce stats"
    );
    Ok(vec![format!(
        "hub entered on floor {} with {} hp",
        store.current_floor, player.character.hp
    )])
}

async fn grind(harness: &Harness) -> Result<Vec<String>> {
    let session = &harness.session;
    session.select_character(1).await.context("select")?;
    let mut battles = 0_u32;
    for _ in 0..25 {
        session.enter_battle(1).await.context("battle init")?;
        let store = session.snapshot();
        ensure!(store.mode == GameMode::Battle, "battle mode expected");
        ensure!(store.current_enemy.is_some(), "battle without an enemy");
        session
            .finish_battle(
                1,
                BattleOutcome::Victory(BattleRewards {
                    experience: 20,
                    gold: 10,
                }),
            )
            .await
            .context("victory commit")?;
        session.advance_floor(1).await.context("climb")?;
        battles += 1;
        harness.clock.advance(90_000);
    }
    let row = session
        .backend()
        .character_row(1)
        .context("character row")?;
    ensure!(row.floor == 26, "expected floor 26, got {}", row.floor);
    let checkpoints: Vec<u32> = session
        .unlocked_checkpoints(1)
        .await
        .context("checkpoints")?
        .iter()
        .map(|c| c.floor)
        .collect();
    ensure!(
        checkpoints == vec![1, 5, 20],
        "unexpected checkpoint set {checkpoints:?}"
    );
    let board = session
        .global_ranking(RankingQuery::new(RankingMode::Floor, 10))
        .await
        .context("ranking board")?;
    ensure!(board.len() == 1 && board[0].rank == 1, "board misordered");
    Ok(vec![
        format!("{battles} battles won, now on floor {}", row.floor),
        format!("checkpoints unlocked: {checkpoints:?}"),
    ])
}

async fn checkpoint(harness: &Harness) -> Result<Vec<String>> {
    let session = &harness.session;
    {
        let backend = session.backend();
        let mut row = backend.character_row(1).context("row")?;
        row.floor = 23;
        row.highest_floor = 23;
        backend.insert_character(row);
    }
    session.select_character(1).await.context("select")?;

    match session.start_from_checkpoint(1, 30).await {
        Err(GameError::Checkpoint(_)) => {}
        other => bail!("locked checkpoint accepted: {other:?}"),
    }

    session
        .finish_battle(1, BattleOutcome::Defeat { retry_from: Some(20) })
        .await
        .context("retry from checkpoint")?;
    let row = session.backend().character_row(1).context("row")?;
    ensure!(row.floor == 20, "retry landed on floor {}", row.floor);
    ensure!(row.hp == row.max_hp, "checkpoint retry must fully heal");
    ensure!(row.highest_floor == 23, "record lost on retry");

    session
        .finish_battle(1, BattleOutcome::Defeat { retry_from: None })
        .await
        .context("final death")?;
    let row = session.backend().character_row(1).context("row")?;
    ensure!(row.floor == 1, "reset must land on the entrance");
    ensure!(
        session.snapshot().mode == GameMode::Menu,
        "death without retry drops to the menu"
    );
    Ok(vec![
        "locked checkpoint rejected, retry and reset verified".to_string(),
    ])
}

async fn outage(harness: &Harness) -> Result<Vec<String>> {
    let session = &harness.session;
    session.backend().set_equipment_outage(true);
    session.select_character(1).await.context("select in outage")?;
    let player = session.snapshot().player.context("player")?;
    ensure!(
        player.stats.total == player.stats.base,
        "equipment outage must degrade to zero bonuses"
    );
    session.backend().set_equipment_outage(false);

    {
        let backend = session.backend();
        let mut row = backend.character_row(1).context("row")?;
        row.highest_floor = 23;
        backend.insert_character(row);
    }
    let heals_before = session.backend().call_count("update_hp_mana");
    session.backend().set_floor_outage(true);
    match session.start_from_checkpoint(1, 20).await {
        Err(GameError::Checkpoint(_)) => {}
        other => bail!("floor outage not surfaced: {other:?}"),
    }
    ensure!(
        session.backend().call_count("update_hp_mana") == heals_before,
        "heal issued despite failed floor update"
    );
    session.backend().set_floor_outage(false);
    Ok(vec!["zero-bonus fallback and checkpoint atomicity held".to_string()])
}

async fn idle_heal(harness: &Harness) -> Result<Vec<String>> {
    let session = &harness.session;
    {
        let backend = session.backend();
        let mut row = backend.character_row(1).context("row")?;
        row.hp = 10;
        row.mana = 5;
        row.last_activity_ms = Some(harness.clock.now_ms());
        backend.insert_character(row);
    }
    harness.clock.advance(HOUR_MS);
    session.select_character(1).await.context("select")?;
    let row = session.backend().character_row(1).context("row")?;
    ensure!(row.hp > 10, "an idle hour must heal");
    ensure!(row.hp < row.max_hp, "one hour is only half the window");

    let pushes = session.backend().call_count("update_hp_mana");
    session.select_character(1).await.context("reload")?;
    ensure!(
        session.backend().call_count("update_hp_mana") == pushes,
        "same-instant reload double-applied healing"
    );

    session.return_to_hub(1).await.context("hub reset")?;
    let row = session.backend().character_row(1).context("row")?;
    ensure!(row.hp == row.max_hp && row.mana == row.max_mana, "hub must fully heal");
    Ok(vec![format!("idle hour healed to {} hp, hub reset to full", row.max_hp)])
}

async fn dedup(harness: &Harness) -> Result<Vec<String>> {
    let session = &harness.session;
    session.select_character(1).await.context("select")?;
    let fetches = session.backend().call_count("get_character");
    let rolls = session.backend().call_count("get_monster_for_floor");
    let (first, second) = tokio::join!(session.enter_battle(1), session.enter_battle(1));
    first.context("first init")?;
    second.context("second init")?;
    ensure!(
        session.backend().call_count("get_character") == fetches + 1,
        "overlapping inits ran two fetch sequences"
    );
    ensure!(
        session.backend().call_count("get_monster_for_floor") == rolls + 1,
        "overlapping inits rolled two monsters"
    );
    ensure!(session.snapshot().mode == GameMode::Battle, "battle not committed");
    Ok(vec!["two overlapping inits shared one sequence".to_string()])
}
