//! Single source of truth for the current play session.
//!
//! Only the orchestration session writes here; views read snapshots. The
//! one loud invariant: battle mode without an enemy is a programming error
//! and is rejected instead of rendering a broken screen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::state::{BattleRewards, GamePlayer, Monster};

/// Top-level session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Character selection, nothing loaded.
    #[default]
    Menu,
    /// The safe zone between floor attempts.
    Hub,
    /// An active fight on the current floor.
    Battle,
    /// A special floor event.
    Event,
}

impl GameMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Hub => "hub",
            Self::Battle => "battle",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "menu" => Ok(Self::Menu),
            "hub" => Ok(Self::Hub),
            "battle" => Ok(Self::Battle),
            "event" => Ok(Self::Event),
            _ => Err(()),
        }
    }
}

/// Store invariant violations. These abort the calling operation early
/// rather than committing inconsistent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("battle mode requires an enemy")]
    MissingEnemy,
    #[error("no character is loaded for play")]
    NoPlayer,
}

/// Session state read by every view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStore {
    pub mode: GameMode,
    pub player: Option<GamePlayer>,
    pub current_floor: u32,
    pub current_enemy: Option<Monster>,
    pub is_player_turn: bool,
    #[serde(default)]
    pub game_message: Option<String>,
    #[serde(default)]
    pub battle_rewards: Option<BattleRewards>,
    #[serde(default)]
    pub selected_spell: Option<u64>,
    #[serde(default)]
    pub flee_successful: bool,
    #[serde(default)]
    pub character_deleted: bool,
}

impl GameStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a freshly loaded character and move to the hub.
    pub fn enter_hub(&mut self, player: GamePlayer) {
        self.current_floor = player.character.floor;
        self.player = Some(player);
        self.mode = GameMode::Hub;
        self.current_enemy = None;
        self.battle_rewards = None;
        self.selected_spell = None;
        self.flee_successful = false;
        self.is_player_turn = false;
    }

    /// Transition into battle. `None` for the enemy is an invariant
    /// violation and commits nothing.
    ///
    /// # Errors
    ///
    /// `MissingEnemy` when no enemy was produced, `NoPlayer` when no
    /// character is loaded.
    pub fn enter_battle(
        &mut self,
        enemy: Option<Monster>,
        player_goes_first: bool,
    ) -> Result<(), StoreError> {
        let Some(enemy) = enemy else {
            return Err(StoreError::MissingEnemy);
        };
        if self.player.is_none() {
            return Err(StoreError::NoPlayer);
        }
        self.current_enemy = Some(enemy);
        self.mode = GameMode::Battle;
        self.is_player_turn = player_goes_first;
        self.battle_rewards = None;
        self.flee_successful = false;
        Ok(())
    }

    /// Transition into a special floor event.
    ///
    /// # Errors
    ///
    /// `NoPlayer` when no character is loaded.
    pub fn enter_event(&mut self) -> Result<(), StoreError> {
        if self.player.is_none() {
            return Err(StoreError::NoPlayer);
        }
        self.mode = GameMode::Event;
        self.current_enemy = None;
        Ok(())
    }

    /// Leave battle or event back to the safe hub, keeping the player.
    pub fn return_to_hub(&mut self) {
        self.mode = GameMode::Hub;
        self.current_enemy = None;
        self.is_player_turn = false;
        self.selected_spell = None;
    }

    /// Drop the session back to the character menu.
    pub fn to_menu(&mut self) {
        *self = Self {
            character_deleted: self.character_deleted,
            ..Self::default()
        };
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.game_message = Some(message.into());
    }

    pub fn clear_message(&mut self) {
        self.game_message = None;
    }
}
