//! Deterministic in-memory backend for tests and the headless harness.
//!
//! Implements every RPC the client sequences, with the server-side math
//! kept intentionally simple: a linear attribute formula, ChaCha20-seeded
//! monster rolls per floor, and vector-backed ranking boards. Outage
//! switches and per-call counters make failure paths and call ordering
//! observable from tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::checkpoint::{Checkpoint, unlocked_checkpoints};
use crate::rpc::{
    AttributeDistribution, AttributeDistributionResult, GameBackend, RankingEntry, RankingMode,
    RankingQuery, RankingStatusFilter, RpcError, ScoreEntry, UserStats,
};
use crate::state::{
    Attributes, Character, CharacterId, Consumable, Monster, Spell, SpellKind, UserId,
};
use crate::stats::{DerivedStats, EquipmentBonuses};

const MONSTER_NAMES: [&str; 6] = [
    "Rustling Slime",
    "Vault Spider",
    "Hollow Knight",
    "Stair Lurker",
    "Gilded Wraith",
    "Floor Warden",
];

/// Suspends exactly once before resolving, so every RPC behaves like a
/// real network call with a suspension point under a cooperative executor.
struct SuspendOnce {
    polled: bool,
}

impl Future for SuspendOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.polled {
            Poll::Ready(())
        } else {
            self.polled = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

fn network_hop() -> SuspendOnce {
    SuspendOnce { polled: false }
}

/// A plausible level-1 character row for tests and demos.
#[must_use]
pub fn sample_character(id: CharacterId, name: &str) -> Character {
    Character {
        id,
        user_id: id,
        name: name.to_string(),
        level: 1,
        experience: 0,
        gold: 50,
        attack: 10,
        defense: 5,
        speed: 8,
        hp: 100,
        max_hp: 100,
        mana: 50,
        max_mana: 50,
        attributes: Attributes {
            strength: 5,
            dexterity: 5,
            intelligence: 5,
            wisdom: 5,
            vitality: 5,
            luck: 5,
        },
        unspent_points: 0,
        mastery: Vec::new(),
        floor: 1,
        highest_floor: 1,
        last_activity_ms: None,
    }
}

/// A deterministic monster for a floor, bypassing the RNG jitter.
#[must_use]
pub fn sample_monster(floor: u32) -> Monster {
    let level = floor.max(1);
    let scale = i32::try_from(level).unwrap_or(i32::MAX);
    Monster {
        id: u64::from(floor),
        name: MONSTER_NAMES[(floor as usize) % MONSTER_NAMES.len()].to_string(),
        level,
        hp: 40 + scale * 12,
        max_hp: 40 + scale * 12,
        attack: 6 + scale * 3,
        defense: 2 + scale * 2,
        speed: 5 + scale,
        experience_reward: u64::from(level) * 15,
        gold_reward: i64::from(level) * 8,
    }
}

/// In-memory reference implementation of [`GameBackend`].
pub struct MemoryBackend {
    seed: u64,
    /// When set, mutations stamp `last_activity` the way the real server
    /// does as a side effect of activity.
    clock: Option<std::rc::Rc<dyn crate::cache::Clock>>,
    characters: RefCell<HashMap<CharacterId, Character>>,
    equipment: RefCell<HashMap<CharacterId, EquipmentBonuses>>,
    spells: RefCell<HashMap<CharacterId, Vec<Spell>>>,
    consumables: RefCell<HashMap<CharacterId, Vec<Consumable>>>,
    scores: RefCell<Vec<ScoreEntry>>,
    calls: RefCell<HashMap<&'static str, usize>>,
    equipment_outage: Cell<bool>,
    floor_outage: Cell<bool>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            clock: None,
            characters: RefCell::new(HashMap::new()),
            equipment: RefCell::new(HashMap::new()),
            spells: RefCell::new(HashMap::new()),
            consumables: RefCell::new(HashMap::new()),
            scores: RefCell::new(Vec::new()),
            calls: RefCell::new(HashMap::new()),
            equipment_outage: Cell::new(false),
            floor_outage: Cell::new(false),
        }
    }

    #[must_use]
    pub fn with_clock(seed: u64, clock: std::rc::Rc<dyn crate::cache::Clock>) -> Self {
        let mut backend = Self::new(seed);
        backend.clock = Some(clock);
        backend
    }

    fn stamp_activity(&self, character: &mut Character) {
        if let Some(clock) = &self.clock {
            character.last_activity_ms = Some(clock.now_ms());
        }
    }

    pub fn insert_character(&self, character: Character) {
        self.characters.borrow_mut().insert(character.id, character);
    }

    pub fn set_equipment(&self, id: CharacterId, bonuses: EquipmentBonuses) {
        self.equipment.borrow_mut().insert(id, bonuses);
    }

    pub fn set_spells(&self, id: CharacterId, spells: Vec<Spell>) {
        self.spells.borrow_mut().insert(id, spells);
    }

    pub fn set_consumables(&self, id: CharacterId, consumables: Vec<Consumable>) {
        self.consumables.borrow_mut().insert(id, consumables);
    }

    /// Simulate the equipment endpoint going down.
    pub fn set_equipment_outage(&self, down: bool) {
        self.equipment_outage.set(down);
    }

    /// Simulate the floor-update endpoint going down.
    pub fn set_floor_outage(&self, down: bool) {
        self.floor_outage.set(down);
    }

    /// Overwrite a character's activity timestamp (normally server-driven).
    pub fn set_last_activity(&self, id: CharacterId, last_activity_ms: Option<u64>) {
        if let Some(ch) = self.characters.borrow_mut().get_mut(&id) {
            ch.last_activity_ms = last_activity_ms;
        }
    }

    /// How often a named RPC was invoked (outage rejections included,
    /// client-side pre-validation failures not).
    #[must_use]
    pub fn call_count(&self, name: &'static str) -> usize {
        self.calls.borrow().get(name).copied().unwrap_or(0)
    }

    /// Current authoritative row, for assertions.
    #[must_use]
    pub fn character_row(&self, id: CharacterId) -> Option<Character> {
        self.characters.borrow().get(&id).cloned()
    }

    fn record_call(&self, name: &'static str) {
        *self.calls.borrow_mut().entry(name).or_insert(0) += 1;
    }

    fn character_or_not_found(&self, id: CharacterId) -> Result<Character, RpcError> {
        self.characters
            .borrow()
            .get(&id)
            .cloned()
            .ok_or(RpcError::NotFound {
                entity: "character",
                id,
            })
    }

    /// The reference derived-stat formula: linear in attributes and level.
    fn derive_stats(character: &Character) -> DerivedStats {
        let attrs = character.attributes;
        let level = i32::try_from(character.level).unwrap_or(i32::MAX);
        DerivedStats {
            hp: character.hp,
            max_hp: character.max_hp,
            mana: character.mana,
            max_mana: character.max_mana,
            atk: character.attack + attrs.strength * 2 + level,
            def: character.defense + attrs.vitality + level / 2,
            speed: character.speed + attrs.dexterity,
            critical_chance: 0.05 + attrs.luck as f32 * 0.005,
            critical_damage: 1.5 + attrs.luck as f32 * 0.01,
            magic_attack: attrs.intelligence * 2 + attrs.wisdom,
            magic_damage_bonus: attrs.wisdom as f32 * 0.01,
            double_attack_chance: attrs.dexterity as f32 * 0.002,
        }
    }

    fn ranking_key(entry: &ScoreEntry, mode: RankingMode) -> i64 {
        match mode {
            RankingMode::Floor => i64::from(entry.floor),
            RankingMode::Level => i64::from(entry.level),
            RankingMode::Gold => entry.gold,
        }
    }

    fn ranked_rows(&self, query: &RankingQuery) -> Vec<RankingEntry> {
        let mut rows: Vec<ScoreEntry> = self
            .scores
            .borrow()
            .iter()
            .filter(|entry| match query.status {
                RankingStatusFilter::All => true,
                RankingStatusFilter::Alive => entry.alive,
                RankingStatusFilter::Dead => !entry.alive,
            })
            .filter(|entry| {
                query.name_filter.as_deref().is_none_or(|needle| {
                    entry
                        .character_name
                        .to_lowercase()
                        .contains(&needle.to_lowercase())
                })
            })
            .cloned()
            .collect();
        rows.sort_by_key(|entry| std::cmp::Reverse(Self::ranking_key(entry, query.mode)));
        rows.into_iter()
            .enumerate()
            .map(|(index, entry)| RankingEntry {
                rank: index + 1,
                entry,
            })
            .skip(query.page.saturating_mul(query.limit))
            .take(query.limit)
            .collect()
    }
}

#[async_trait(?Send)]
impl GameBackend for MemoryBackend {
    async fn get_character(&self, id: CharacterId) -> Result<Character, RpcError> {
        network_hop().await;
        self.record_call("get_character");
        self.character_or_not_found(id)
    }

    async fn get_base_stats(&self, id: CharacterId) -> Result<DerivedStats, RpcError> {
        network_hop().await;
        self.record_call("get_base_stats");
        let character = self.character_or_not_found(id)?;
        Ok(Self::derive_stats(&character))
    }

    async fn get_equipment_bonuses(&self, id: CharacterId) -> Result<EquipmentBonuses, RpcError> {
        network_hop().await;
        self.record_call("get_equipment_bonuses");
        if self.equipment_outage.get() {
            return Err(RpcError::Network {
                call: "get_equipment_bonuses",
                message: "equipment service unavailable".to_string(),
            });
        }
        self.character_or_not_found(id)?;
        Ok(self
            .equipment
            .borrow()
            .get(&id)
            .copied()
            .unwrap_or(EquipmentBonuses::zero()))
    }

    async fn get_equipped_spells(&self, id: CharacterId) -> Result<Vec<Spell>, RpcError> {
        network_hop().await;
        self.record_call("get_equipped_spells");
        self.character_or_not_found(id)?;
        Ok(self.spells.borrow().get(&id).cloned().unwrap_or_default())
    }

    async fn get_consumables(&self, id: CharacterId) -> Result<Vec<Consumable>, RpcError> {
        network_hop().await;
        self.record_call("get_consumables");
        self.character_or_not_found(id)?;
        Ok(self
            .consumables
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_hp_mana(
        &self,
        id: CharacterId,
        hp: Option<i32>,
        mana: Option<i32>,
    ) -> Result<(), RpcError> {
        network_hop().await;
        self.record_call("update_hp_mana");
        let mut characters = self.characters.borrow_mut();
        let character = characters.get_mut(&id).ok_or(RpcError::NotFound {
            entity: "character",
            id,
        })?;
        if let Some(hp) = hp {
            character.hp = hp.clamp(0, character.max_hp);
        }
        if let Some(mana) = mana {
            character.mana = mana.clamp(0, character.max_mana);
        }
        self.stamp_activity(character);
        Ok(())
    }

    async fn update_floor(&self, id: CharacterId, floor: u32) -> Result<(), RpcError> {
        network_hop().await;
        self.record_call("update_floor");
        if self.floor_outage.get() {
            return Err(RpcError::Network {
                call: "update_floor",
                message: "floor service unavailable".to_string(),
            });
        }
        if floor == 0 {
            return Err(RpcError::Rejected {
                call: "update_floor",
                message: "floors start at 1".to_string(),
            });
        }
        let mut characters = self.characters.borrow_mut();
        let character = characters.get_mut(&id).ok_or(RpcError::NotFound {
            entity: "character",
            id,
        })?;
        character.floor = floor;
        character.highest_floor = character.highest_floor.max(floor);
        self.stamp_activity(character);
        Ok(())
    }

    async fn get_unlocked_checkpoints(&self, id: CharacterId) -> Result<Vec<Checkpoint>, RpcError> {
        network_hop().await;
        self.record_call("get_unlocked_checkpoints");
        let character = self.character_or_not_found(id)?;
        Ok(unlocked_checkpoints(character.highest_floor))
    }

    async fn distribute_attribute_points(
        &self,
        id: CharacterId,
        distribution: AttributeDistribution,
    ) -> Result<AttributeDistributionResult, RpcError> {
        network_hop().await;
        self.record_call("distribute_attribute_points");
        let mut characters = self.characters.borrow_mut();
        let character = characters.get_mut(&id).ok_or(RpcError::NotFound {
            entity: "character",
            id,
        })?;
        let spent = distribution.total();
        if distribution.has_negative() || spent <= 0 {
            return Err(RpcError::Rejected {
                call: "distribute_attribute_points",
                message: "distribution must be positive".to_string(),
            });
        }
        if spent > character.unspent_points {
            return Err(RpcError::Rejected {
                call: "distribute_attribute_points",
                message: format!(
                    "requested {spent} points with {} unspent",
                    character.unspent_points
                ),
            });
        }
        character.attributes.strength += distribution.strength;
        character.attributes.dexterity += distribution.dexterity;
        character.attributes.intelligence += distribution.intelligence;
        character.attributes.wisdom += distribution.wisdom;
        character.attributes.vitality += distribution.vitality;
        character.attributes.luck += distribution.luck;
        character.unspent_points -= spent;
        Ok(AttributeDistributionResult {
            spent,
            remaining: character.unspent_points,
        })
    }

    async fn get_monster_for_floor(&self, floor: u32) -> Result<Monster, RpcError> {
        network_hop().await;
        self.record_call("get_monster_for_floor");
        if floor == 0 {
            return Err(RpcError::Rejected {
                call: "get_monster_for_floor",
                message: "floors start at 1".to_string(),
            });
        }
        let mut rng =
            ChaCha20Rng::seed_from_u64(self.seed.wrapping_add(u64::from(floor).wrapping_mul(31)));
        let mut monster = sample_monster(floor);
        monster.id = rng.r#gen::<u32>().into();
        monster.hp += rng.gen_range(0..=monster.level as i32 * 4);
        monster.max_hp = monster.hp;
        monster.attack += rng.gen_range(0..=2);
        monster.speed += rng.gen_range(0..=2);
        Ok(monster)
    }

    async fn save_score(&self, entry: ScoreEntry) -> Result<(), RpcError> {
        network_hop().await;
        self.record_call("save_score");
        let mut scores = self.scores.borrow_mut();
        if let Some(existing) = scores
            .iter_mut()
            .find(|row| row.character_id == entry.character_id)
        {
            *existing = entry;
        } else {
            scores.push(entry);
        }
        Ok(())
    }

    async fn global_ranking(&self, query: RankingQuery) -> Result<Vec<RankingEntry>, RpcError> {
        network_hop().await;
        self.record_call("global_ranking");
        Ok(self.ranked_rows(&query))
    }

    async fn user_ranking(
        &self,
        user: UserId,
        mode: RankingMode,
    ) -> Result<Option<RankingEntry>, RpcError> {
        network_hop().await;
        self.record_call("user_ranking");
        let query = RankingQuery::new(mode, usize::MAX);
        Ok(self
            .ranked_rows(&query)
            .into_iter()
            .find(|row| row.entry.user_id == user))
    }

    async fn user_stats(&self, user: UserId) -> Result<UserStats, RpcError> {
        network_hop().await;
        self.record_call("user_stats");
        let scores = self.scores.borrow();
        let mut stats = UserStats::default();
        for entry in scores.iter().filter(|row| row.user_id == user) {
            stats.characters += 1;
            stats.best_floor = stats.best_floor.max(entry.floor);
            stats.best_level = stats.best_level.max(entry.level);
            stats.total_gold += entry.gold;
        }
        Ok(stats)
    }
}

/// A small spell book used by the harness and tests.
#[must_use]
pub fn sample_spells() -> Vec<Spell> {
    vec![
        Spell {
            id: 1,
            name: "Ember Bolt".to_string(),
            description: "A sputtering dart of flame.".to_string(),
            mana_cost: 6,
            base_power: 14,
            kind: SpellKind::Attack,
        },
        Spell {
            id: 2,
            name: "Mend".to_string(),
            description: "Closes shallow wounds.".to_string(),
            mana_cost: 8,
            base_power: 20,
            kind: SpellKind::Heal,
        },
    ]
}

/// A starter belt of consumables used by the harness and tests.
#[must_use]
pub fn sample_consumables() -> Vec<Consumable> {
    vec![
        Consumable {
            id: 10,
            name: "Minor Healing Potion".to_string(),
            hp_restore: 50,
            mana_restore: 0,
            quantity: 3,
        },
        Consumable {
            id: 11,
            name: "Mana Draught".to_string(),
            hp_restore: 0,
            mana_restore: 30,
            quantity: 2,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn backend_with(id: CharacterId) -> MemoryBackend {
        let backend = MemoryBackend::new(42);
        backend.insert_character(sample_character(id, "Tess"));
        backend
    }

    #[test]
    fn monster_rolls_are_deterministic_per_seed_and_floor() {
        let backend = backend_with(1);
        let first = block_on(backend.get_monster_for_floor(7)).expect("roll");
        let second = block_on(backend.get_monster_for_floor(7)).expect("roll");
        assert_eq!(first, second);
        let other_floor = block_on(backend.get_monster_for_floor(8)).expect("roll");
        assert_ne!(first, other_floor);
    }

    #[test]
    fn floor_update_tracks_highest() {
        let backend = backend_with(1);
        block_on(backend.update_floor(1, 9)).expect("climb");
        block_on(backend.update_floor(1, 3)).expect("descend");
        let row = backend.character_row(1).expect("row");
        assert_eq!(row.floor, 3);
        assert_eq!(row.highest_floor, 9);
    }

    #[test]
    fn attribute_spend_is_bounded_by_unspent_points() {
        let backend = backend_with(1);
        let mut row = backend.character_row(1).expect("row");
        row.unspent_points = 4;
        backend.insert_character(row);
        let overdraw = AttributeDistribution {
            strength: 5,
            ..AttributeDistribution::default()
        };
        assert!(block_on(backend.distribute_attribute_points(1, overdraw)).is_err());
        let spend = AttributeDistribution {
            strength: 3,
            luck: 1,
            ..AttributeDistribution::default()
        };
        let result = block_on(backend.distribute_attribute_points(1, spend)).expect("spend");
        assert_eq!(result.spent, 4);
        assert_eq!(result.remaining, 0);
        let row = backend.character_row(1).expect("row");
        assert_eq!(row.attributes.strength, 8);
        assert_eq!(row.attributes.luck, 6);
    }

    #[test]
    fn rankings_sort_filter_and_paginate() {
        let backend = MemoryBackend::new(1);
        for (id, floor, gold, alive) in [(1, 12, 900, true), (2, 30, 100, false), (3, 21, 400, true)]
        {
            block_on(backend.save_score(ScoreEntry {
                user_id: id,
                character_id: id,
                character_name: format!("Hero{id}"),
                floor,
                level: floor / 2,
                gold,
                alive,
            }))
            .expect("save");
        }
        let by_floor =
            block_on(backend.global_ranking(RankingQuery::new(RankingMode::Floor, 10)))
                .expect("board");
        let floors: Vec<u32> = by_floor.iter().map(|row| row.entry.floor).collect();
        assert_eq!(floors, vec![30, 21, 12]);
        assert_eq!(by_floor[0].rank, 1);

        let alive_only = block_on(backend.global_ranking(RankingQuery {
            status: RankingStatusFilter::Alive,
            ..RankingQuery::new(RankingMode::Gold, 10)
        }))
        .expect("board");
        let gold: Vec<i64> = alive_only.iter().map(|row| row.entry.gold).collect();
        assert_eq!(gold, vec![900, 400]);

        let page_two = block_on(backend.global_ranking(RankingQuery {
            page: 1,
            ..RankingQuery::new(RankingMode::Floor, 2)
        }))
        .expect("board");
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].rank, 3);
    }

    #[test]
    fn save_score_upserts_by_character() {
        let backend = MemoryBackend::new(1);
        let mut entry = ScoreEntry {
            user_id: 1,
            character_id: 1,
            character_name: "Hero".to_string(),
            floor: 5,
            level: 3,
            gold: 10,
            alive: true,
        };
        block_on(backend.save_score(entry.clone())).expect("save");
        entry.floor = 9;
        block_on(backend.save_score(entry)).expect("save");
        let stats = block_on(backend.user_stats(1)).expect("stats");
        assert_eq!(stats.characters, 1);
        assert_eq!(stats.best_floor, 9);
    }
}
