//! Runtime configuration for the match registry and engine processes.
//!
//! Loading these values from a file is left to the host; the structs derive
//! `Deserialize` with field defaults so any serde format works.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::engine_bridge::EngineStrength;

/// Configuration for the arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// How to launch and talk to the external engine.
    pub engine: EngineConfig,
    /// How long a challenge waits for an answer. Default: 30s.
    pub challenge_timeout: Duration,
    /// Strength used when a challenge against the computer names none.
    /// Default: 500 ms per move, no Elo limit.
    pub default_strength: EngineStrength,
    /// Pause before asking the engine for a move, so computer replies are not
    /// instantaneous. Default: 0.
    pub cpu_move_delay: Duration,
    /// Capacity of the match event broadcast channel. Default: 256.
    pub event_capacity: usize,
    /// How many finished matches keep their final snapshot so late callers
    /// can still read the result. Oldest are dropped first. Default: 128.
    pub finished_retention: usize,
    /// Whether a failed engine request forfeits the computer's game instead of
    /// waiting for a retry. Default: false.
    pub forfeit_on_engine_failure: bool,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            challenge_timeout: Duration::from_secs(30),
            default_strength: EngineStrength::default(),
            cpu_move_delay: Duration::ZERO,
            event_capacity: 256,
            finished_retention: 128,
            forfeit_on_engine_failure: false,
        }
    }
}

/// External UCI engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable to spawn. Default: `stockfish` from `PATH`.
    pub program: PathBuf,
    /// Extra command-line arguments.
    pub args: Vec<String>,
    /// Value for the `Threads` option. Default: 1.
    pub threads: u16,
    /// Value for the `Hash` option in megabytes. Default: 16.
    pub hash_mb: u32,
    /// Limit for the `uci`/`uciok` and `isready`/`readyok` exchanges. Default: 5s.
    pub handshake_timeout: Duration,
    /// Added to the search budget to form the request deadline. Default: 2s.
    pub response_grace: Duration,
    /// Search budget for `go depth` requests, which carry no time of their
    /// own. Default: 30s.
    pub depth_search_limit: Duration,
    /// How long `quit` may take before the process is killed. Default: 1s.
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("stockfish"),
            args: Vec::new(),
            threads: 1,
            hash_mb: 16,
            handshake_timeout: Duration::from_secs(5),
            response_grace: Duration::from_secs(2),
            depth_search_limit: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

impl ArbiterConfig {
    /// Reject values that would make the registry unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_capacity == 0 {
            return Err("event_capacity must be >= 1".to_owned());
        }
        if self.challenge_timeout.is_zero() {
            return Err("challenge_timeout must be non-zero".to_owned());
        }
        if self.engine.program.as_os_str().is_empty() {
            return Err("engine.program must not be empty".to_owned());
        }
        if self.engine.depth_search_limit.is_zero() {
            return Err("engine.depth_search_limit must be non-zero".to_owned());
        }
        if self.engine.threads == 0 {
            return Err("engine.threads must be >= 1".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ArbiterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.challenge_timeout, Duration::from_secs(30));
        assert_eq!(config.default_strength.movetime_ms, 500);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: ArbiterConfig =
            serde_json::from_str(r#"{"event_capacity": 8, "engine": {"threads": 2}}"#).expect("config should parse");
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.engine.threads, 2);
        assert_eq!(config.engine.hash_mb, 16);
        assert_eq!(config.challenge_timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = ArbiterConfig {
            event_capacity: 0,
            ..ArbiterConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
