//! Deterministic harness wiring a client session to the in-memory backend.

use std::rc::Rc;

use towertrials_game::{
    Clock, GameSession, ManualClock, MemoryBackend, sample_character, sample_consumables,
    sample_spells,
};

/// A fixed origin keeps reports and idle-heal math stable across runs.
pub const EPOCH_MS: u64 = 1_750_000_000_000;

/// One scenario run's environment: a session over a seeded backend plus
/// the hand-cranked clock both sides share.
pub struct Harness {
    pub session: GameSession<MemoryBackend>,
    pub clock: Rc<ManualClock>,
}

impl Harness {
    /// Build a fresh world for one seed: one default character, a spell
    /// book, and a potion belt.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let clock = Rc::new(ManualClock::starting_at(EPOCH_MS));
        let backend = MemoryBackend::with_clock(seed, Rc::clone(&clock) as Rc<dyn Clock>);
        backend.insert_character(sample_character(1, "Harness Hero"));
        backend.set_spells(1, sample_spells());
        backend.set_consumables(1, sample_consumables());
        let session = GameSession::with_clock(backend, Rc::clone(&clock) as Rc<dyn Clock>);
        Self { session, clock }
    }
}

/// Outcome record for one scenario/seed pair.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub seed: u64,
    pub passed: bool,
    pub duration_ms: u128,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Top-level JSON report written with `--report`.
#[derive(Debug, serde::Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioReport>,
}

impl RunReport {
    #[must_use]
    pub fn from_results(results: Vec<ScenarioReport>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
        }
    }
}
