//! Process configuration, layered the way `hocon`-backed configs are layered elsewhere in this
//! codebase: a HOCON file supplies defaults, environment variables prefixed `NOVARIA_` override
//! individual fields on top of it.

use crate::error::SimError;
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimConfig {
	pub tick_rate_hz: f64,
	pub chunk_side: u16,
	pub udp_bind: SocketAddr,
	pub udp_peer: Option<SocketAddr>,
	pub script_memory_budget_bytes: usize,
	pub script_instruction_budget_per_call: u32,

	pub max_pending_commands: u32,
	pub max_pending_remote_chunk_payloads: u32,
	pub heartbeat_timeout_ticks: u64,
	pub connect_probe_interval_ticks: u64,
	pub max_connect_probe_interval_ticks: u64,
	pub connect_timeout_ticks: u64,
	pub heartbeat_send_interval_ticks: u64,

	pub max_pending_local_commands: u32,
	pub auto_reconnect_retry_interval_ticks: u64,
	pub session_state_event_min_interval_ticks: u64,
}

impl Default for SimConfig {
	fn default() -> Self {
		Self {
			tick_rate_hz: 60.0,
			chunk_side: 32,
			udp_bind: "0.0.0.0:0".parse().expect("static address parses"),
			udp_peer: None,
			script_memory_budget_bytes: 8 * 1024 * 1024,
			script_instruction_budget_per_call: 10_000_000,

			max_pending_commands: 1024,
			max_pending_remote_chunk_payloads: 1024,
			heartbeat_timeout_ticks: 180,
			connect_probe_interval_ticks: 30,
			max_connect_probe_interval_ticks: 240,
			connect_timeout_ticks: 600,
			heartbeat_send_interval_ticks: 30,

			max_pending_local_commands: 1024,
			auto_reconnect_retry_interval_ticks: 120,
			session_state_event_min_interval_ticks: 15,
		}
	}
}

impl SimConfig {
	/// Loads defaults, overlays an optional HOCON file, then overlays `NOVARIA_`-prefixed
	/// environment variables naming each field.
	pub fn from_env_and_file(path: Option<&Path>) -> Result<Self, SimError> {
		let mut config = match path {
			Some(path) => {
				let text = std::fs::read_to_string(path)
					.map_err(|error| SimError::Config(format!("reading {path:?}: {error}")))?;
				hocon::de::from_str(&text)
					.map_err(|error| SimError::Config(format!("parsing {path:?}: {error}")))?
			}
			None => Self::default(),
		};

		if let Ok(value) = env::var("NOVARIA_UDP_BIND") {
			config.udp_bind =
				value.parse().map_err(|_| SimError::Config(format!("invalid NOVARIA_UDP_BIND: {value}")))?;
		}
		if let Ok(value) = env::var("NOVARIA_UDP_PEER") {
			config.udp_peer = Some(
				value.parse().map_err(|_| SimError::Config(format!("invalid NOVARIA_UDP_PEER: {value}")))?,
			);
		}
		if let Ok(value) = env::var("NOVARIA_TICK_RATE_HZ") {
			config.tick_rate_hz = value
				.parse()
				.map_err(|_| SimError::Config(format!("invalid NOVARIA_TICK_RATE_HZ: {value}")))?;
		}

		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_the_original_tick_constants() {
		let config = SimConfig::default();
		assert_eq!(config.heartbeat_timeout_ticks, 180);
		assert_eq!(config.connect_timeout_ticks, 600);
		assert_eq!(config.max_connect_probe_interval_ticks, 240);
	}
}
