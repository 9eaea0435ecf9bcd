//! Orchestration layer sequencing caches, RPC calls, and store commits.
//!
//! Every user action maps to one session operation that runs strictly in
//! program order: invalidate, fetch, aggregate, commit. Overlapping
//! invocations of the same logical operation are de-duplicated through a
//! per-key map of shared in-flight futures, so concurrent callers await
//! one RPC sequence and one store commit instead of racing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use thiserror::Error;

use crate::autoheal::calculate_auto_heal;
use crate::cache::{Clock, GameCaches, SystemClock};
use crate::checkpoint::{self, Checkpoint, CheckpointError};
use crate::rpc::{
    AttributeDistribution, AttributeDistributionResult, GameBackend, RankingEntry, RankingMode,
    RankingQuery, RpcError, ScoreEntry, UserStats, push_hp_mana,
};
use crate::state::{BattleRewards, Character, CharacterId, GamePlayer};
use crate::stats::stats_with_equipment;
use crate::store::{GameStore, StoreError};

/// Session-level failure, converted to a user-facing message at the UI
/// boundary. `Clone` so de-duplicated awaiters all receive the outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Rejected before any RPC was issued.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// How a character load treats idle-time healing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    pub apply_auto_heal: bool,
    pub force_full_heal: bool,
}

impl LoadPolicy {
    /// Character selection: credit idle regeneration, nothing more.
    pub const SELECT: Self = Self {
        apply_auto_heal: true,
        force_full_heal: false,
    };
    /// Hub entry: the hub is a safe zone, pools reset to full.
    pub const HUB_RESET: Self = Self {
        apply_auto_heal: true,
        force_full_heal: true,
    };
    /// Battle refresh: display whatever the backend holds right now.
    pub const RAW: Self = Self {
        apply_auto_heal: false,
        force_full_heal: false,
    };
}

/// How a battle ended, as reported by the combat flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleOutcome {
    Victory(BattleRewards),
    Fled,
    /// Death; `retry_from` names an unlocked checkpoint floor, or `None`
    /// to reset progress to the tower entrance and drop to the menu.
    Defeat { retry_from: Option<u32> },
}

/// Key identifying one logical operation for in-flight de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum OpKey {
    LoadCharacter(CharacterId),
    EnterBattle(CharacterId),
    ReturnToHub(CharacterId),
    FinishBattle(CharacterId),
    Checkpoint(CharacterId),
    AdvanceFloor(CharacterId),
    UseConsumable(CharacterId),
    DistributeAttributes(CharacterId),
}

type SharedOp = Shared<LocalBoxFuture<'static, Result<(), GameError>>>;

struct SessionInner<B> {
    backend: B,
    clock: Rc<dyn Clock>,
    caches: GameCaches,
    store: RefCell<GameStore>,
    inflight: RefCell<HashMap<OpKey, SharedOp>>,
}

/// One browser session's orchestration handle.
///
/// Cheap to clone; clones share the backend, caches, and store.
pub struct GameSession<B: GameBackend + 'static> {
    inner: Rc<SessionInner<B>>,
}

impl<B: GameBackend + 'static> Clone for GameSession<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<B: GameBackend + 'static> GameSession<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_clock(backend, Rc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(backend: B, clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                backend,
                caches: GameCaches::new(Rc::clone(&clock)),
                clock,
                store: RefCell::new(GameStore::new()),
                inflight: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The backend handle, mainly for harness assertions.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Clone of the current store state.
    #[must_use]
    pub fn snapshot(&self) -> GameStore {
        self.inner.store.borrow().clone()
    }

    /// Read the store in place without cloning.
    pub fn with_store<R>(&self, f: impl FnOnce(&GameStore) -> R) -> R {
        f(&self.inner.store.borrow())
    }

    /// Throttled clear of every game cache. Returns whether it ran.
    pub fn clear_caches(&self) -> bool {
        self.inner.caches.clear_all()
    }

    /// Select a character from the menu and enter the hub, crediting idle
    /// auto-heal along the way.
    ///
    /// # Errors
    ///
    /// Any [`GameError`] from the fetch/aggregate sequence; the store is
    /// untouched on failure.
    pub async fn select_character(&self, id: CharacterId) -> Result<(), GameError> {
        let inner = Rc::clone(&self.inner);
        self.deduplicated(OpKey::LoadCharacter(id), move || {
            load_into_hub(inner, id, LoadPolicy::SELECT)
        })
        .await
    }

    /// Start a fight on the character's current floor.
    ///
    /// Invalidate the character cache, refetch fresh pools, resolve the
    /// floor's monster through its cache, then commit the battle
    /// transition in one step.
    ///
    /// # Errors
    ///
    /// Any [`GameError`] from the sequence. A missing monster surfaces as
    /// a loud [`StoreError::MissingEnemy`], never a silent broken screen.
    pub async fn enter_battle(&self, id: CharacterId) -> Result<(), GameError> {
        let inner = Rc::clone(&self.inner);
        self.deduplicated(OpKey::EnterBattle(id), move || enter_battle_op(inner, id))
            .await
    }

    /// Leave battle or event for the safe hub: pools reset to full.
    ///
    /// # Errors
    ///
    /// Any [`GameError`] from the reload sequence.
    pub async fn return_to_hub(&self, id: CharacterId) -> Result<(), GameError> {
        let inner = Rc::clone(&self.inner);
        self.deduplicated(OpKey::ReturnToHub(id), move || {
            load_into_hub(inner, id, LoadPolicy::HUB_RESET)
        })
        .await
    }

    /// Commit a battle result: rewards and ranking on victory, checkpoint
    /// retry or full reset on defeat.
    ///
    /// # Errors
    ///
    /// Any [`GameError`] from the commit sequence.
    pub async fn finish_battle(
        &self,
        id: CharacterId,
        outcome: BattleOutcome,
    ) -> Result<(), GameError> {
        let inner = Rc::clone(&self.inner);
        self.deduplicated(OpKey::FinishBattle(id), move || {
            finish_battle_op(inner, id, outcome)
        })
        .await
    }

    /// Resume play from an unlocked checkpoint floor.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::InvalidCheckpoint`] before any RPC for
    /// off-schedule or locked targets, otherwise the underlying failure.
    pub async fn start_from_checkpoint(
        &self,
        id: CharacterId,
        target_floor: u32,
    ) -> Result<(), GameError> {
        let inner = Rc::clone(&self.inner);
        self.deduplicated(OpKey::Checkpoint(id), move || {
            checkpoint_op(inner, id, Some(target_floor))
        })
        .await
    }

    /// Death transition: back to the tower entrance, then the menu.
    ///
    /// # Errors
    ///
    /// Any [`GameError`] from the reset sequence.
    pub async fn reset_progress(&self, id: CharacterId) -> Result<(), GameError> {
        let inner = Rc::clone(&self.inner);
        self.deduplicated(OpKey::Checkpoint(id), move || checkpoint_op(inner, id, None))
            .await
    }

    /// Step onto the next floor after clearing the current one.
    ///
    /// # Errors
    ///
    /// Any [`GameError`] from the floor update or the projection refresh.
    pub async fn advance_floor(&self, id: CharacterId) -> Result<(), GameError> {
        let inner = Rc::clone(&self.inner);
        self.deduplicated(OpKey::AdvanceFloor(id), move || advance_floor_op(inner, id))
            .await
    }

    /// Drink a potion or similar: clamp the pool delta client-side, push
    /// it, and update the displayed player.
    ///
    /// # Errors
    ///
    /// `Validation` when the item is missing, exhausted, or already used
    /// this turn; otherwise the underlying [`GameError`].
    pub async fn use_consumable(
        &self,
        id: CharacterId,
        consumable_id: u64,
    ) -> Result<(), GameError> {
        let inner = Rc::clone(&self.inner);
        self.deduplicated(OpKey::UseConsumable(id), move || {
            use_consumable_op(inner, id, consumable_id)
        })
        .await
    }

    /// Spend unspent attribute points and refresh the projection.
    ///
    /// # Errors
    ///
    /// `Validation` before any RPC when the request is negative, empty, or
    /// overdraws the unspent pool; otherwise the underlying [`GameError`].
    pub async fn distribute_attributes(
        &self,
        id: CharacterId,
        distribution: AttributeDistribution,
    ) -> Result<AttributeDistributionResult, GameError> {
        if distribution.has_negative() {
            return Err(GameError::Validation(
                "attribute points cannot be negative".to_string(),
            ));
        }
        let requested = distribution.total();
        if requested <= 0 {
            return Err(GameError::Validation(
                "no attribute points requested".to_string(),
            ));
        }
        let unspent = self.with_store(|store| {
            store
                .player
                .as_ref()
                .map(|player| player.character.unspent_points)
        });
        if let Some(unspent) = unspent
            && requested > unspent
        {
            return Err(GameError::Validation(format!(
                "requested {requested} points with {unspent} unspent"
            )));
        }
        let result = self
            .inner
            .backend
            .distribute_attribute_points(id, distribution)
            .await?;
        let inner = Rc::clone(&self.inner);
        self.deduplicated(OpKey::DistributeAttributes(id), move || {
            refresh_player_op(inner, id)
        })
        .await?;
        Ok(result)
    }

    /// Checkpoints the character may currently resume from.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`RpcError`] on fetch failure.
    pub async fn unlocked_checkpoints(&self, id: CharacterId) -> Result<Vec<Checkpoint>, GameError> {
        Ok(self.inner.backend.get_unlocked_checkpoints(id).await?)
    }

    /// Query the global ranking board.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`RpcError`] on fetch failure.
    pub async fn global_ranking(&self, query: RankingQuery) -> Result<Vec<RankingEntry>, GameError> {
        Ok(self.inner.backend.global_ranking(query).await?)
    }

    /// Best ranked row for one user in one mode.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`RpcError`] on fetch failure.
    pub async fn user_ranking(
        &self,
        user: u64,
        mode: RankingMode,
    ) -> Result<Option<RankingEntry>, GameError> {
        Ok(self.inner.backend.user_ranking(user, mode).await?)
    }

    /// Aggregate stats across one user's characters.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`RpcError`] on fetch failure.
    pub async fn user_stats(&self, user: u64) -> Result<UserStats, GameError> {
        Ok(self.inner.backend.user_stats(user).await?)
    }

    /// Run `make()` unless the same key is already in flight, in which
    /// case await the existing shared future instead.
    async fn deduplicated<F, Fut>(&self, key: OpKey, make: F) -> Result<(), GameError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), GameError>> + 'static,
    {
        let joined = self.inner.inflight.borrow().get(&key).cloned();
        if let Some(shared) = joined {
            log::debug!("joining in-flight operation {key:?}");
            return shared.await;
        }
        let shared: SharedOp = make().boxed_local().shared();
        self.inner
            .inflight
            .borrow_mut()
            .insert(key.clone(), shared.clone());
        let result = shared.await;
        self.inner.inflight.borrow_mut().remove(&key);
        result
    }
}

/// Fetch a character through the cache, apply the load policy's healing,
/// and write any healed pools back through the validated RPC wrapper.
async fn fetch_character_for_play<B: GameBackend>(
    inner: &SessionInner<B>,
    id: CharacterId,
    policy: LoadPolicy,
) -> Result<Character, GameError> {
    let mut character = match inner.caches.characters.get(&id) {
        Some(cached) => cached,
        None => {
            let fetched = inner.backend.get_character(id).await?.sanitized();
            inner.caches.characters.set(id, fetched.clone());
            fetched
        }
    };
    if policy.apply_auto_heal || policy.force_full_heal {
        let now_ms = inner.clock.now_ms();
        let pools = calculate_auto_heal(&character, now_ms, policy.force_full_heal);
        if pools.changed_from(&character) {
            push_hp_mana(&inner.backend, id, Some(pools.hp), Some(pools.mana)).await?;
            character.hp = pools.hp;
            character.mana = pools.mana;
            // The push counts as activity; without the bump a reload at the
            // same instant would credit the idle span a second time.
            character.last_activity_ms = Some(now_ms);
            inner.caches.characters.set(id, character.clone());
        }
    }
    Ok(character)
}

/// Compose the play projection for a character: stats, spells, turn state.
async fn compose_player<B: GameBackend>(
    inner: &SessionInner<B>,
    character: Character,
) -> Result<GamePlayer, GameError> {
    let stats = stats_with_equipment(&inner.backend, &character).await?;
    let spells = inner.backend.get_equipped_spells(character.id).await?;
    let consumables = inner.backend.get_consumables(character.id).await?;
    Ok(GamePlayer::compose(character, stats, spells, consumables))
}

async fn load_into_hub<B: GameBackend>(
    inner: Rc<SessionInner<B>>,
    id: CharacterId,
    policy: LoadPolicy,
) -> Result<(), GameError> {
    let character = fetch_character_for_play(&inner, id, policy).await?;
    let player = compose_player(&inner, character).await?;
    log::info!("character {id} entered the hub on floor {}", player.character.floor);
    inner.store.borrow_mut().enter_hub(player);
    Ok(())
}

async fn enter_battle_op<B: GameBackend>(
    inner: Rc<SessionInner<B>>,
    id: CharacterId,
) -> Result<(), GameError> {
    inner.caches.characters.invalidate(&id);
    let character = fetch_character_for_play(&inner, id, LoadPolicy::RAW).await?;
    let floor = character.floor;
    let player = compose_player(&inner, character).await?;
    let monster = match inner.caches.monsters.get(&floor) {
        Some(cached) => cached,
        None => {
            let rolled = inner.backend.get_monster_for_floor(floor).await?.sanitized();
            inner.caches.monsters.set(floor, rolled.clone());
            rolled
        }
    };
    let player_goes_first = player.stats.total.speed >= monster.speed;
    log::info!("character {id} engages {} on floor {floor}", monster.name);
    let mut store = inner.store.borrow_mut();
    store.enter_hub(player);
    store.enter_battle(Some(monster), player_goes_first)?;
    Ok(())
}

async fn finish_battle_op<B: GameBackend>(
    inner: Rc<SessionInner<B>>,
    id: CharacterId,
    outcome: BattleOutcome,
) -> Result<(), GameError> {
    match outcome {
        BattleOutcome::Victory(rewards) => {
            inner.caches.characters.invalidate(&id);
            let character = fetch_character_for_play(&inner, id, LoadPolicy::HUB_RESET).await?;
            let entry = ScoreEntry {
                user_id: character.user_id,
                character_id: character.id,
                character_name: character.name.clone(),
                floor: character.highest_floor,
                level: character.level,
                gold: character.gold,
                alive: true,
            };
            inner.backend.save_score(entry).await?;
            let player = compose_player(&inner, character).await?;
            let mut store = inner.store.borrow_mut();
            store.enter_hub(player);
            store.battle_rewards = Some(rewards);
            store.set_message("Victory!");
            Ok(())
        }
        BattleOutcome::Fled => {
            inner.caches.characters.invalidate(&id);
            let character = fetch_character_for_play(&inner, id, LoadPolicy::RAW).await?;
            let player = compose_player(&inner, character).await?;
            let mut store = inner.store.borrow_mut();
            store.enter_hub(player);
            store.flee_successful = true;
            store.set_message("You slipped away.");
            Ok(())
        }
        BattleOutcome::Defeat { retry_from } => match retry_from {
            Some(floor) => checkpoint_restart(&inner, id, floor).await,
            None => {
                let character = inner.backend.get_character(id).await?;
                checkpoint::reset_progress(&inner.backend, &character).await?;
                inner.caches.characters.invalidate(&id);
                let mut store = inner.store.borrow_mut();
                store.to_menu();
                store.set_message("You fell. The tower resets.");
                Ok(())
            }
        },
    }
}

async fn checkpoint_op<B: GameBackend>(
    inner: Rc<SessionInner<B>>,
    id: CharacterId,
    target_floor: Option<u32>,
) -> Result<(), GameError> {
    match target_floor {
        Some(floor) => checkpoint_restart(&inner, id, floor).await,
        None => {
            let character = inner.backend.get_character(id).await?;
            checkpoint::reset_progress(&inner.backend, &character).await?;
            inner.caches.characters.invalidate(&id);
            inner.store.borrow_mut().to_menu();
            Ok(())
        }
    }
}

async fn checkpoint_restart<B: GameBackend>(
    inner: &SessionInner<B>,
    id: CharacterId,
    floor: u32,
) -> Result<(), GameError> {
    let character = inner.backend.get_character(id).await?;
    checkpoint::start_from_checkpoint(&inner.backend, &character, floor).await?;
    inner.caches.characters.invalidate(&id);
    let refreshed = fetch_character_for_play(inner, id, LoadPolicy::RAW).await?;
    let player = compose_player(inner, refreshed).await?;
    let mut store = inner.store.borrow_mut();
    store.enter_hub(player);
    store.set_message(format!("Resumed from floor {floor}"));
    Ok(())
}

async fn advance_floor_op<B: GameBackend>(
    inner: Rc<SessionInner<B>>,
    id: CharacterId,
) -> Result<(), GameError> {
    let character = inner.backend.get_character(id).await?;
    let next = character.floor.saturating_add(1);
    inner.backend.update_floor(id, next).await?;
    log::info!("character {id} climbs to floor {next}");
    refresh_player_op(inner, id).await
}

async fn use_consumable_op<B: GameBackend>(
    inner: Rc<SessionInner<B>>,
    id: CharacterId,
    consumable_id: u64,
) -> Result<(), GameError> {
    // Validate against the displayed player before touching the network.
    let (hp_restore, mana_restore, hp, mana, max_hp, max_mana) = {
        let store = inner.store.borrow();
        let player = store.player.as_ref().ok_or(StoreError::NoPlayer)?;
        if player.turn.potion_used_this_turn {
            return Err(GameError::Validation(
                "a potion was already used this turn".to_string(),
            ));
        }
        let item = player
            .consumables
            .iter()
            .find(|item| item.id == consumable_id)
            .ok_or_else(|| GameError::Validation(format!("no consumable {consumable_id}")))?;
        if item.quantity == 0 {
            return Err(GameError::Validation(format!("{} is spent", item.name)));
        }
        let ch = &player.character;
        (
            item.hp_restore,
            item.mana_restore,
            ch.hp,
            ch.mana,
            ch.max_hp,
            ch.max_mana,
        )
    };
    let new_hp = crate::numbers::validate_hp(
        Some(f64::from(hp) + f64::from(hp_restore)),
        i64::from(max_hp),
    );
    let new_mana = crate::numbers::validate_mana(
        Some(f64::from(mana) + f64::from(mana_restore)),
        i64::from(max_mana),
    );
    let new_hp = i32::try_from(new_hp).unwrap_or(max_hp);
    let new_mana = i32::try_from(new_mana).unwrap_or(max_mana);
    push_hp_mana(&inner.backend, id, Some(new_hp), Some(new_mana)).await?;
    inner.caches.characters.invalidate(&id);
    let mut store = inner.store.borrow_mut();
    if let Some(player) = store.player.as_mut() {
        player.character.hp = new_hp;
        player.character.mana = new_mana;
        player.turn.potion_used_this_turn = true;
        if let Some(item) = player
            .consumables
            .iter_mut()
            .find(|item| item.id == consumable_id)
        {
            item.quantity -= 1;
        }
    }
    Ok(())
}

/// Reload the projection in place without changing mode; used after
/// attribute spends while the player stays in the hub.
async fn refresh_player_op<B: GameBackend>(
    inner: Rc<SessionInner<B>>,
    id: CharacterId,
) -> Result<(), GameError> {
    inner.caches.characters.invalidate(&id);
    let character = fetch_character_for_play(&inner, id, LoadPolicy::RAW).await?;
    let player = compose_player(&inner, character).await?;
    let mut store = inner.store.borrow_mut();
    store.current_floor = player.character.floor;
    store.player = Some(player);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, sample_character};
    use crate::cache::ManualClock;
    use crate::store::GameMode;

    fn session() -> GameSession<MemoryBackend> {
        let backend = MemoryBackend::new(7);
        backend.insert_character(sample_character(1, "Tess"));
        GameSession::with_clock(backend, Rc::new(ManualClock::starting_at(1_000_000)))
    }

    #[tokio::test]
    async fn select_then_snapshot_lands_in_hub() {
        let session = session();
        session.select_character(1).await.expect("select");
        let store = session.snapshot();
        assert_eq!(store.mode, GameMode::Hub);
        assert_eq!(store.player.as_ref().map(GamePlayer::id), Some(1));
    }

    #[tokio::test]
    async fn negative_distribution_is_rejected_before_rpc() {
        let session = session();
        session.select_character(1).await.expect("select");
        let err = session
            .distribute_attributes(
                1,
                AttributeDistribution {
                    strength: -1,
                    ..AttributeDistribution::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
        assert_eq!(session.backend().call_count("distribute_attribute_points"), 0);
    }

    #[tokio::test]
    async fn overlapping_battle_inits_share_one_sequence() {
        let session = session();
        session.select_character(1).await.expect("select");
        let fetches_before = session.backend().call_count("get_character");
        let (first, second) = futures::join!(session.enter_battle(1), session.enter_battle(1));
        first.expect("first battle init");
        second.expect("second battle init");
        assert_eq!(
            session.backend().call_count("get_character") - fetches_before,
            1,
            "second call must join the in-flight sequence"
        );
        assert_eq!(session.backend().call_count("get_monster_for_floor"), 1);
        assert_eq!(session.snapshot().mode, GameMode::Battle);
    }

    #[tokio::test]
    async fn sequential_battles_are_not_deduplicated() {
        let session = session();
        session.select_character(1).await.expect("select");
        session.enter_battle(1).await.expect("first");
        session.return_to_hub(1).await.expect("hub");
        session.enter_battle(1).await.expect("second");
        assert!(session.backend().call_count("get_monster_for_floor") >= 1);
        assert_eq!(session.snapshot().mode, GameMode::Battle);
    }
}
