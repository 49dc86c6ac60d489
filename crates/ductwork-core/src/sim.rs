//! Engine configuration and per-step state.

use crate::fixed::{Fixed64, Millis, Ticks};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing and cosmetic parameters of the engine. Every field has a
/// default, so a config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock length of one host tick.
    pub tick_duration_ms: Millis,
    /// Ticks after start before the first polling pass.
    pub start_delay_ticks: Ticks,
    /// Upper bound on the polling interval, used when every variant is slower.
    pub default_interval_ticks: u32,
    pub drop: DropConfig,
    pub debug: DebugConfig,
    pub rng_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_duration_ms: 50,
            start_delay_ticks: 20,
            default_interval_ticks: 10,
            drop: DropConfig::default(),
            debug: DebugConfig::default(),
            rng_seed: 0x5EED_D0C7,
        }
    }
}

/// Shape of items dropped out of an open pipe end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropConfig {
    /// Outward speed in blocks per tick. Items dropped downward get none.
    pub base_speed: f64,
    /// Width of the uniform random jitter added to each velocity axis.
    pub spread: f64,
    /// How far past the block center the item spawns.
    pub exit_offset: f64,
    /// Spawn height inside the block for sideways pipes.
    pub horizontal_height: f64,
    /// Spawn height inside the block for vertical pipes.
    pub vertical_height: f64,
    /// Extra lowering for downward pipes so the item clears the head.
    pub down_nudge: f64,
}

impl Default for DropConfig {
    fn default() -> Self {
        Self {
            base_speed: 0.25,
            spread: 0.05,
            exit_offset: 0.6,
            horizontal_height: 0.25,
            vertical_height: 0.5,
            down_nudge: 0.05,
        }
    }
}

/// Periodic highlighting of every indexed pipe, for finding desyncs by eye.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub highlight_pipes: bool,
    /// Ticks between two highlight passes. Zero is treated as one.
    pub highlight_interval_ticks: Ticks,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            highlight_pipes: false,
            highlight_interval_ticks: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable state tracked by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Host ticks seen since the engine started. Incremented once per step.
    pub tick: Ticks,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Step report
// ---------------------------------------------------------------------------

/// Summary of one `PipeEngine::step`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub tick: Ticks,
    /// Whether this tick ran a polling pass.
    pub polled: bool,
    /// Nodes whose interval had elapsed.
    pub serviced: usize,
    pub moved: usize,
    pub dropped: usize,
    /// Nodes dropped from the index because their block was gone.
    pub stale: usize,
    /// Deferred tasks that ran this tick.
    pub deferred: usize,
    /// Pipes handed to the host's highlight hook.
    pub highlighted: usize,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of engine state, used to compare index
/// contents across restarts and rescans.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_host_timing() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.tick_duration_ms, 50);
        assert_eq!(cfg.start_delay_ticks, 20);
        assert_eq!(cfg.default_interval_ticks, 10);
        assert_eq!(cfg.drop.base_speed, 0.25);
        assert_eq!(cfg.drop.spread, 0.05);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{ "start_delay_ticks": 0, "drop": { "spread": 0.0 } }"#)
                .unwrap();
        assert_eq!(cfg.start_delay_ticks, 0);
        assert_eq!(cfg.tick_duration_ms, 50);
        assert_eq!(cfg.drop.spread, 0.0);
        assert_eq!(cfg.drop.base_speed, 0.25);
    }

    #[test]
    fn sim_state_starts_at_zero() {
        assert_eq!(SimState::new().tick, 0);
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_i32(-7);

        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_i32(-7);

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);

        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);

        assert_ne!(h1.finish(), h2.finish());
    }
}
