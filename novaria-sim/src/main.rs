use anyhow::Result;
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{info, warn};
use novaria_sim::{AuthorityMode, Kernel};
use novaria_shared::SimConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, ValueEnum)]
enum ClArgsAuthorityMode {
	Authority,
	Replica,
}

#[derive(Parser)]
#[command(version)]
struct ClArgs {
	/// Path to a HOCON config file overlaying the built-in defaults.
	#[arg(long)]
	config: Option<PathBuf>,

	/// Socket address to bind the UDP peer transport to, overriding the config value.
	#[arg(long)]
	bind: Option<SocketAddr>,

	/// Peer socket address to connect to, overriding the config value.
	#[arg(long)]
	peer: Option<SocketAddr>,

	/// Whether this process owns the authoritative simulation or mirrors a remote one.
	#[arg(long, value_enum, default_value_t = ClArgsAuthorityMode::Authority)]
	mode: ClArgsAuthorityMode,
}

fn main() -> Result<()> {
	let cl_args = ClArgs::parse();

	env_logger::init_from_env(Env::default().default_filter_or(if cfg!(debug_assertions) { "debug" } else { "info" }));

	info!("Novaria (Simulation Core) v{}", env!("CARGO_PKG_VERSION"));

	let mut config = SimConfig::from_env_and_file(cl_args.config.as_deref())?;
	if let Some(bind) = cl_args.bind {
		config.udp_bind = bind;
	}
	if let Some(peer) = cl_args.peer {
		config.udp_peer = Some(peer);
	}

	let authority_mode = match cl_args.mode {
		ClArgsAuthorityMode::Authority => AuthorityMode::Authority,
		ClArgsAuthorityMode::Replica => AuthorityMode::Replica,
	};

	let tick_rate_hz = config.tick_rate_hz;
	let mut kernel = Kernel::init(config, authority_mode)?;

	info!("bound UDP transport, running at {tick_rate_hz} ticks/second");

	let target_tick_time = Duration::from_secs_f64(1.0 / tick_rate_hz);
	let mut last_tick_start = Instant::now();

	loop {
		let tick_start = Instant::now();
		let delta = (tick_start - last_tick_start).as_secs_f64();
		last_tick_start = tick_start;

		kernel.update(delta);

		let tick_duration = Instant::now() - tick_start;
		match target_tick_time.checked_sub(tick_duration) {
			Some(time_until_next_tick) => thread::sleep(time_until_next_tick),
			None => warn!("tick took {tick_duration:.0?}, exceeding {target_tick_time:.0?} target"),
		}
	}
}
