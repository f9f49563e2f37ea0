//! Single-threaded orchestrator: the one public `update(fixed_delta_seconds)` entry point that
//! drives every subsystem through the fixed ten-phase pipeline, once per call.

use crate::ecs::{DropSpawnRequest, EcsRuntime, PickupProbeRequest, ProjectileSpawnRequest};
use crate::motion::{self, MotionSettings, MotionState};
use crate::ruleset::GameplayRuleset;
use crate::transport::{SessionState, UdpPeerTransport};
use novaria_script::{simrpc, ScriptHost, ScriptModuleSource};
use novaria_shared::command::*;
use novaria_shared::error::SimError;
use novaria_shared::materials;
use novaria_shared::wire::varint::{read_varint, read_varuint};
use novaria_shared::wire::PlayerCommand;
use novaria_shared::world::WorldService;
use novaria_shared::SimConfig;
use rustc_hash::FxHashMap;

fn place_kind_material(place_kind: simrpc::PlaceKind) -> u16 {
	match place_kind {
		simrpc::PlaceKind::None => materials::AIR,
		simrpc::PlaceKind::Dirt => materials::DIRT,
		simrpc::PlaceKind::Stone => materials::STONE,
		simrpc::PlaceKind::Torch => materials::TORCH,
		simrpc::PlaceKind::Workbench => materials::WORKBENCH,
	}
}

/// Scale used to carry `f32` motion-input values over the integer-only wire codec.
const FIXED_POINT_SCALE: f64 = 1000.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthorityMode {
	Authority,
	Replica,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct KernelDiagnostics {
	pub dropped_local_command_count: u64,
	pub dropped_malformed_command_count: u64,
	pub dropped_malformed_snapshot_count: u64,
}

pub struct Kernel {
	config: SimConfig,
	tick_index: u64,
	authority_mode: AuthorityMode,

	world: WorldService,
	ecs: EcsRuntime,
	ruleset: GameplayRuleset,
	transport: UdpPeerTransport,
	script: ScriptHost,

	players: FxHashMap<u32, MotionState>,
	motion_settings: MotionSettings,

	local_commands: Vec<PlayerCommand>,
	next_auto_reconnect_tick: u64,
	last_session_state: SessionState,
	pending_session_event_tick: u64,

	diagnostics: KernelDiagnostics,
}

impl Kernel {
	/// Best-effort initialization: `world → transport → script → ecs → ruleset`. Transport bind
	/// is the only fallible stage; on failure nothing partially initialized is left behind.
	pub fn init(config: SimConfig, authority_mode: AuthorityMode) -> Result<Self, SimError> {
		let world = WorldService::new();
		let transport = UdpPeerTransport::bind(config.udp_bind, config.udp_peer).map_err(SimError::TransportIo)?;
		let script = ScriptHost::new(config.script_memory_budget_bytes, config.script_instruction_budget_per_call);
		let ecs = EcsRuntime::new();
		let ruleset = GameplayRuleset::new();

		Ok(Self {
			config,
			tick_index: 0,
			authority_mode,
			world,
			ecs,
			ruleset,
			transport,
			script,
			players: FxHashMap::default(),
			motion_settings: MotionSettings::default(),
			local_commands: Vec::new(),
			next_auto_reconnect_tick: 0,
			last_session_state: SessionState::Disconnected,
			pending_session_event_tick: 0,
			diagnostics: KernelDiagnostics::default(),
		})
	}

	pub fn tick_index(&self) -> u64 {
		self.tick_index
	}

	pub fn world(&self) -> &WorldService {
		&self.world
	}

	pub fn world_mut(&mut self) -> &mut WorldService {
		&mut self.world
	}

	pub fn ruleset(&self) -> &GameplayRuleset {
		&self.ruleset
	}

	pub fn transport(&self) -> &UdpPeerTransport {
		&self.transport
	}

	pub fn diagnostics(&self) -> KernelDiagnostics {
		self.diagnostics
	}

	/// Installs the gameplay script modules backing `action_primary`/`craft_recipe` simrpc calls.
	/// Validation is atomic: a bad module leaves the previously loaded set untouched.
	pub fn set_script_modules(&mut self, sources: Vec<ScriptModuleSource>) -> Result<(), SimError> {
		self.script.set_script_modules(sources)
	}

	pub fn submit_local_command(&mut self, command: PlayerCommand) {
		if self.local_commands.len() >= self.config.max_pending_local_commands as usize {
			self.diagnostics.dropped_local_command_count += 1;
			return;
		}
		self.local_commands.push(command);
	}

	pub fn update(&mut self, fixed_delta_seconds: f64) {
		let tick_index = self.tick_index;

		// 2. Auto-reconnect.
		if self.transport.session_state() == SessionState::Disconnected && tick_index >= self.next_auto_reconnect_tick
		{
			self.transport.request_connect(tick_index);
			self.next_auto_reconnect_tick = tick_index + self.config.auto_reconnect_retry_interval_ticks;
		}

		// 3. Transport tick.
		self.transport.tick(tick_index);

		// 4. Flush local commands.
		for command in self.local_commands.drain(..) {
			self.transport.submit_local_command(command);
		}

		// 5. Dispatch remote commands.
		for command in self.transport.consume_remote_commands() {
			self.dispatch_command(tick_index, fixed_delta_seconds, &command);
		}

		// 6. Apply remote chunk payloads.
		for snapshot in self.transport.consume_remote_chunk_payloads() {
			self.world.apply_snapshot(&snapshot);
		}

		// 7. ECS tick.
		let tick_context = novaria_shared::TickContext { tick_index, fixed_delta_seconds };
		self.ecs.tick(&tick_context);

		// 8. Ruleset process.
		let combat_events = self.ecs.consume_combat_events();
		self.ruleset.process_combat_events(&combat_events);
		let gameplay_events = self.ecs.consume_gameplay_events();
		self.ruleset.process_gameplay_events(&gameplay_events);

		// 9. Publish dirty chunks.
		let dirty = self.world.consume_dirty();
		let mut snapshots = Vec::with_capacity(dirty.len());
		for coord in dirty {
			if let Ok(snapshot) = self.world.build_snapshot(coord) {
				snapshots.push(snapshot);
			}
		}
		self.transport.publish_world_snapshot(tick_index, &snapshots);

		// 10. Queue net-session event.
		let current_state = self.transport.session_state();
		if current_state != self.last_session_state && tick_index >= self.pending_session_event_tick {
			self.last_session_state = current_state;
			self.pending_session_event_tick = tick_index + self.config.session_state_event_min_interval_ticks;
			self.script.dispatch_event("net.session", &format!("state={current_state:?};tick={tick_index}"));
		}

		self.tick_index += 1;
	}

	fn dispatch_command(&mut self, tick_index: u64, fixed_delta_seconds: f64, command: &PlayerCommand) {
		let handled = match command.command_id {
			JUMP => self.dispatch_jump(command),
			ATTACK => self.dispatch_attack(command),
			PLAYER_MOTION_INPUT => self.dispatch_motion_input(command, fixed_delta_seconds),

			WORLD_SET_TILE => self.dispatch_world_set_tile(command),
			WORLD_LOAD_CHUNK => self.dispatch_world_load_chunk(command),
			WORLD_UNLOAD_CHUNK => self.dispatch_world_unload_chunk(command),

			GAMEPLAY_COLLECT_RESOURCE => self.dispatch_collect_resource(tick_index, command),
			GAMEPLAY_SPAWN_DROP => self.dispatch_spawn_drop(command),
			GAMEPLAY_PICKUP_PROBE => self.dispatch_pickup_probe(command),
			GAMEPLAY_INTERACTION => self.dispatch_interaction(command),
			GAMEPLAY_ACTION_PRIMARY => self.dispatch_action_primary(command),
			GAMEPLAY_CRAFT_RECIPE => self.dispatch_craft_recipe(tick_index, command),
			GAMEPLAY_ATTACK_ENEMY => {
				self.ruleset.execute_attack_enemy(tick_index);
				true
			}
			GAMEPLAY_ATTACK_BOSS => {
				self.ruleset.execute_attack_boss(tick_index);
				true
			}

			COMBAT_FIRE_PROJECTILE => self.dispatch_fire_projectile(command),

			_ => false,
		};

		if !handled {
			self.diagnostics.dropped_malformed_command_count += 1;
		}
	}

	fn player_motion(&mut self, player_id: u32) -> &mut MotionState {
		self.players.entry(player_id).or_insert_with(MotionState::spawn)
	}

	fn dispatch_jump(&mut self, command: &PlayerCommand) -> bool {
		if self.authority_mode != AuthorityMode::Authority {
			return true;
		}
		if !command.payload.is_empty() {
			return false;
		}
		let settings = self.motion_settings;
		let dt = 1.0 / self.config.tick_rate_hz;
		let state = self.players.entry(command.player_id).or_insert_with(MotionState::spawn);
		motion::step(state, &settings, &self.world, 0.0, true, dt);
		true
	}

	fn dispatch_attack(&mut self, command: &PlayerCommand) -> bool {
		if self.authority_mode != AuthorityMode::Authority {
			return true;
		}
		if !command.payload.is_empty() {
			return false;
		}
		let state = *self.player_motion(command.player_id);
		self.ecs.queue_projectile_spawn(ProjectileSpawnRequest {
			x: state.x as f64,
			y: state.y as f64,
			vx: 0.0,
			vy: 0.0,
			radius: 0.6,
			faction_id: 1,
			ticks_remaining: 1,
			damage: 1,
		});
		true
	}

	fn dispatch_motion_input(&mut self, command: &PlayerCommand, dt: f64) -> bool {
		if self.authority_mode != AuthorityMode::Authority {
			return true;
		}
		let Ok(payload) = novaria_shared::command::PlayerMotionInputPayload::decode(&command.payload) else {
			return false;
		};
		let settings = self.motion_settings;
		let state = self.players.entry(command.player_id).or_insert_with(MotionState::spawn);
		motion::step(state, &settings, &self.world, payload.move_axis as f32, payload.jump_pressed, dt);
		true
	}

	fn dispatch_world_set_tile(&mut self, command: &PlayerCommand) -> bool {
		let mut cursor = 0;
		let Ok(x) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(y) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(material) = read_varuint(&command.payload, &mut cursor) else { return false };
		if cursor != command.payload.len() || material > u16::MAX as u64 {
			return false;
		}
		self.world.apply_tile_mutation(x as i32, y as i32, material as u16);
		true
	}

	fn dispatch_world_load_chunk(&mut self, command: &PlayerCommand) -> bool {
		let Some(coord) = decode_chunk_coord(&command.payload) else { return false };
		self.world.load_chunk(coord);
		true
	}

	fn dispatch_world_unload_chunk(&mut self, command: &PlayerCommand) -> bool {
		let Some(coord) = decode_chunk_coord(&command.payload) else { return false };
		self.world.unload_chunk(coord);
		true
	}

	fn dispatch_collect_resource(&mut self, tick_index: u64, command: &PlayerCommand) -> bool {
		let mut cursor = 0;
		let Ok(resource_id) = read_varuint(&command.payload, &mut cursor) else { return false };
		let Ok(amount) = read_varuint(&command.payload, &mut cursor) else { return false };
		if cursor != command.payload.len() {
			return false;
		}
		self.ruleset.collect_resource(resource_id as u32, amount as u32, tick_index);
		true
	}

	fn dispatch_spawn_drop(&mut self, command: &PlayerCommand) -> bool {
		let mut cursor = 0;
		let Ok(tile_x) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(tile_y) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(material_id) = read_varuint(&command.payload, &mut cursor) else { return false };
		let Ok(amount) = read_varuint(&command.payload, &mut cursor) else { return false };
		if cursor != command.payload.len() || material_id > u16::MAX as u64 {
			return false;
		}
		self.ecs.queue_drop_spawn(DropSpawnRequest {
			tile_x: tile_x as i32,
			tile_y: tile_y as i32,
			material_id: material_id as u16,
			amount: amount as u32,
		});
		true
	}

	fn dispatch_pickup_probe(&mut self, command: &PlayerCommand) -> bool {
		let mut cursor = 0;
		let Ok(tile_x) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(tile_y) = read_varint(&command.payload, &mut cursor) else { return false };
		if cursor != command.payload.len() {
			return false;
		}
		self.ecs.queue_pickup_probe(PickupProbeRequest {
			player_id: command.player_id,
			tile_x: tile_x as i32,
			tile_y: tile_y as i32,
		});
		true
	}

	fn dispatch_interaction(&mut self, command: &PlayerCommand) -> bool {
		let mut cursor = 0;
		let Ok(target_tile_x) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(target_tile_y) = read_varint(&command.payload, &mut cursor) else { return false };
		if cursor != command.payload.len() {
			return false;
		}
		self.ruleset.execute_interaction(command.player_id, target_tile_x as i32, target_tile_y as i32);
		true
	}

	fn dispatch_action_primary(&mut self, command: &PlayerCommand) -> bool {
		let Ok(request) = simrpc::try_decode_action_primary_request(&command.payload) else { return false };
		let target_material_before = self.world.try_read_tile(request.target_tile_x, request.target_tile_y);
		let response = self.ruleset.execute_action_primary(&mut self.script, &request);

		match response.result {
			simrpc::ActionPrimaryResult::Reject => {}
			simrpc::ActionPrimaryResult::Place => {
				let material = place_kind_material(response.place_kind);
				self.world.apply_tile_mutation(request.target_tile_x, request.target_tile_y, material);
			}
			simrpc::ActionPrimaryResult::Harvest => {
				self.world.apply_tile_mutation(request.target_tile_x, request.target_tile_y, materials::AIR);
				if let Some(material_id) = target_material_before.filter(|&id| id != materials::AIR) {
					self.ecs.queue_drop_spawn(DropSpawnRequest {
						tile_x: request.target_tile_x,
						tile_y: request.target_tile_y,
						material_id,
						amount: 1,
					});
				}
			}
		}
		true
	}

	fn dispatch_craft_recipe(&mut self, tick_index: u64, command: &PlayerCommand) -> bool {
		let Ok(request) = simrpc::try_decode_craft_recipe_request(&command.payload) else { return false };
		self.ruleset.execute_craft_recipe(&mut self.script, &request, tick_index);
		true
	}

	fn dispatch_fire_projectile(&mut self, command: &PlayerCommand) -> bool {
		let mut cursor = 0;
		let Ok(x_milli) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(y_milli) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(vx_milli) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(vy_milli) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(radius_milli) = read_varuint(&command.payload, &mut cursor) else { return false };
		let Ok(damage) = read_varint(&command.payload, &mut cursor) else { return false };
		let Ok(ticks_remaining) = read_varuint(&command.payload, &mut cursor) else { return false };
		if cursor != command.payload.len() || ticks_remaining > u16::MAX as u64 {
			return false;
		}
		self.ecs.queue_projectile_spawn(ProjectileSpawnRequest {
			x: x_milli as f64 / FIXED_POINT_SCALE,
			y: y_milli as f64 / FIXED_POINT_SCALE,
			vx: vx_milli as f64 / FIXED_POINT_SCALE,
			vy: vy_milli as f64 / FIXED_POINT_SCALE,
			radius: radius_milli as f64 / FIXED_POINT_SCALE,
			faction_id: command.player_id,
			ticks_remaining: ticks_remaining as u16,
			damage: damage as i32,
		});
		true
	}
}

fn decode_chunk_coord(payload: &[u8]) -> Option<novaria_shared::world::ChunkCoord> {
	let mut cursor = 0;
	let cx = read_varint(payload, &mut cursor).ok()?;
	let cy = read_varint(payload, &mut cursor).ok()?;
	if cursor != payload.len() {
		return None;
	}
	Some(novaria_shared::world::ChunkCoord { cx: cx as i32, cy: cy as i32 })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_config() -> SimConfig {
		SimConfig { udp_bind: "127.0.0.1:0".parse().unwrap(), udp_peer: None, ..SimConfig::default() }
	}

	#[test]
	fn tick_index_is_monotone_across_updates() {
		let mut kernel = Kernel::init(test_config(), AuthorityMode::Authority).unwrap();
		for expected in 0..5u64 {
			assert_eq!(kernel.tick_index(), expected);
			kernel.update(1.0 / 60.0);
		}
	}

	#[test]
	fn world_set_tile_command_mutates_world() {
		let mut kernel = Kernel::init(test_config(), AuthorityMode::Authority).unwrap();
		kernel.submit_local_command(PlayerCommand {
			player_id: 1,
			command_id: WORLD_SET_TILE,
			payload: {
				let mut payload = Vec::new();
				novaria_shared::wire::varint::write_varint(&mut payload, 5);
				novaria_shared::wire::varint::write_varint(&mut payload, 5);
				novaria_shared::wire::varint::write_varuint(&mut payload, novaria_shared::materials::STONE as u64);
				payload
			},
		});
		kernel.update(1.0 / 60.0);
		assert_eq!(kernel.world().try_read_tile(5, 5), Some(novaria_shared::materials::STONE));
	}

	#[test]
	fn malformed_command_payload_is_dropped_not_panicking() {
		let mut kernel = Kernel::init(test_config(), AuthorityMode::Authority).unwrap();
		kernel.submit_local_command(PlayerCommand { player_id: 1, command_id: WORLD_SET_TILE, payload: vec![0xff] });
		kernel.update(1.0 / 60.0);
		assert_eq!(kernel.diagnostics.dropped_malformed_command_count, 1);
	}
}
