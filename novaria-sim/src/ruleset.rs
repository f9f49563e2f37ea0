//! Progression invariants and script-bridged rule evaluation.

use crate::ecs::{CombatEvent, GameplayEvent};
use novaria_script::simrpc;
use novaria_script::ScriptHost;
use novaria_shared::error::SimError;

pub const WORKBENCH_WOOD_COST: u32 = 10;
pub const WOOD_SWORD_WOOD_COST: u32 = 7;
pub const BOSS_MAX_HEALTH: i32 = 60;
pub const BOSS_DAMAGE_PER_ATTACK: i32 = 10;
pub const KILL_THRESHOLD: u32 = 3;

const GAMEPLAY_RULES_MODULE: &str = "gameplay_rules";

#[derive(Clone, Debug)]
pub struct MilestoneEvent {
	pub name: String,
	pub payload: String,
}

#[derive(Clone, Debug)]
pub struct PendingPickup {
	pub player_id: u32,
	pub tile_x: i32,
	pub tile_y: i32,
	pub material_id: u16,
	pub amount: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GameplayState {
	pub wood_count: u32,
	pub stone_count: u32,
	pub workbench_built: bool,
	pub sword_crafted: bool,
	pub enemy_kill_count: u32,
	pub boss_health: i32,
	pub boss_defeated: bool,
	pub playable_loop_complete: bool,
}

pub struct GameplayRuleset {
	state: GameplayState,
	events: Vec<MilestoneEvent>,
	pending_pickups: Vec<PendingPickup>,
}

impl Default for GameplayRuleset {
	fn default() -> Self {
		Self::new()
	}
}

impl GameplayRuleset {
	pub fn new() -> Self {
		Self {
			state: GameplayState { boss_health: BOSS_MAX_HEALTH, ..GameplayState::default() },
			events: Vec::new(),
			pending_pickups: Vec::new(),
		}
	}

	pub fn state(&self) -> GameplayState {
		self.state
	}

	fn emit(&mut self, tick_index: u64, milestone: &str) {
		self.events.push(MilestoneEvent {
			name: "gameplay.progress".into(),
			payload: format!("milestone={milestone};tick={tick_index}"),
		});
		self.reevaluate_playable_loop_complete(tick_index);
	}

	fn reevaluate_playable_loop_complete(&mut self, tick_index: u64) {
		let was_complete = self.state.playable_loop_complete;
		let is_complete = self.state.workbench_built
			&& self.state.sword_crafted
			&& self.state.enemy_kill_count >= KILL_THRESHOLD
			&& self.state.boss_defeated;
		self.state.playable_loop_complete = was_complete || is_complete;
		if !was_complete && self.state.playable_loop_complete {
			self.events.push(MilestoneEvent {
				name: "gameplay.progress".into(),
				payload: format!("milestone=playable_loop_complete;tick={tick_index}"),
			});
		}
	}

	pub fn collect_resource(&mut self, resource_id: u32, amount: u32, tick_index: u64) {
		let milestone = match resource_id {
			novaria_shared::command::RESOURCE_WOOD => {
				self.state.wood_count += amount;
				"collect_wood"
			}
			novaria_shared::command::RESOURCE_STONE => {
				self.state.stone_count += amount;
				"collect_stone"
			}
			_ => return,
		};
		self.emit(tick_index, milestone);
	}

	pub fn mark_workbench_built(&mut self, tick_index: u64) {
		if self.state.workbench_built {
			return;
		}
		self.state.workbench_built = true;
		self.emit(tick_index, "workbench_built");
	}

	pub fn mark_sword_crafted(&mut self, tick_index: u64) {
		if self.state.sword_crafted {
			return;
		}
		self.state.sword_crafted = true;
		self.emit(tick_index, "sword_crafted");
	}

	pub fn execute_interaction(&mut self, player_id: u32, target_tile_x: i32, target_tile_y: i32) {
		self.events.push(MilestoneEvent {
			name: "gameplay.interaction".into(),
			payload: format!("player_id={player_id};target_x={target_tile_x};target_y={target_tile_y}"),
		});
	}

	pub fn execute_attack_enemy(&mut self, tick_index: u64) -> bool {
		if !self.state.sword_crafted {
			return false;
		}
		self.state.enemy_kill_count += 1;
		self.emit(tick_index, "kill_enemy");
		true
	}

	pub fn execute_attack_boss(&mut self, tick_index: u64) -> bool {
		if !(self.state.sword_crafted && self.state.enemy_kill_count >= KILL_THRESHOLD && !self.state.boss_defeated) {
			return false;
		}
		self.state.boss_health = (self.state.boss_health - BOSS_DAMAGE_PER_ATTACK).max(0);
		if self.state.boss_health == 0 {
			self.state.boss_defeated = true;
			self.emit(tick_index, "defeat_boss");
		} else {
			self.emit(tick_index, "attack_boss");
		}
		true
	}

	pub fn process_combat_events(&mut self, events: &[CombatEvent]) {
		for event in events {
			let CombatEvent::HostileDefeated { reward_kill_count } = event;
			self.state.enemy_kill_count += reward_kill_count;
		}
	}

	pub fn process_gameplay_events(&mut self, events: &[GameplayEvent]) {
		for event in events {
			let GameplayEvent::PickupResolved { player_id, tile_x, tile_y, material_id, amount } = *event;
			self.events.push(MilestoneEvent {
				name: "gameplay.pickup".into(),
				payload: format!("player_id={player_id};x={tile_x};y={tile_y};material={material_id};amount={amount}"),
			});
			self.pending_pickups.push(PendingPickup { player_id, tile_x, tile_y, material_id, amount });
		}
	}

	pub fn consume_milestone_events(&mut self) -> Vec<MilestoneEvent> {
		std::mem::take(&mut self.events)
	}

	pub fn consume_pending_pickups(&mut self) -> Vec<PendingPickup> {
		std::mem::take(&mut self.pending_pickups)
	}

	/// Bridges an `ActionPrimary` gameplay command through simrpc; falls back to `Reject` on any
	/// script failure, never propagating an error to the kernel.
	pub fn execute_action_primary(
		&mut self,
		script: &mut ScriptHost,
		request: &simrpc::ActionPrimaryRequest,
	) -> simrpc::ActionPrimaryResponse {
		let encoded = simrpc::encode_action_primary_request(request);
		match script.try_call_module_function(GAMEPLAY_RULES_MODULE, "action_primary", &encoded) {
			Ok(bytes) => simrpc::try_decode_action_primary_response(&bytes).unwrap_or(reject_action_primary()),
			Err(error) => {
				log::warn!("action_primary script call failed: {error}");
				reject_action_primary()
			}
		}
	}

	/// Applies `wood`/`stone` deltas and milestone flags from a `Craft` result to progression
	/// state. Other inventory deltas (dirt, coal, torch, workbench, wood_sword) describe
	/// client-side inventory only and have no counterpart in [`GameplayState`].
	pub fn execute_craft_recipe(
		&mut self,
		script: &mut ScriptHost,
		request: &simrpc::CraftRecipeRequest,
		tick_index: u64,
	) -> simrpc::CraftRecipeResponse {
		let encoded = simrpc::encode_craft_recipe_request(request);
		let response = match script.try_call_module_function(GAMEPLAY_RULES_MODULE, "craft_recipe", &encoded) {
			Ok(bytes) => simrpc::try_decode_craft_recipe_response(&bytes).unwrap_or(reject_craft_recipe()),
			Err(error) => {
				log::warn!("craft_recipe script call failed: {error}");
				reject_craft_recipe()
			}
		};

		if response.result == simrpc::CraftRecipeResult::Craft {
			self.state.wood_count = (self.state.wood_count as i64 + response.wood_delta as i64).max(0) as u32;
			self.state.stone_count = (self.state.stone_count as i64 + response.stone_delta as i64).max(0) as u32;
			if response.mark_workbench_built {
				self.mark_workbench_built(tick_index);
			}
			if response.mark_sword_crafted {
				self.mark_sword_crafted(tick_index);
			}
		}

		response
	}

	/// Restores persisted progression state, clamping `boss_health` and re-deriving the two
	/// latched booleans so a true value is never lost to a stale restore.
	pub fn restore(&mut self, snapshot: GameplayState) -> Result<(), SimError> {
		let boss_health = snapshot.boss_health.clamp(0, BOSS_MAX_HEALTH);
		let boss_defeated = snapshot.boss_defeated || boss_health == 0;
		self.state = GameplayState { boss_health, boss_defeated, ..snapshot };
		self.state.playable_loop_complete =
			self.state.playable_loop_complete || snapshot.playable_loop_complete;
		self.reevaluate_playable_loop_complete(0);
		Ok(())
	}
}

fn reject_action_primary() -> simrpc::ActionPrimaryResponse {
	simrpc::ActionPrimaryResponse {
		result: simrpc::ActionPrimaryResult::Reject,
		place_kind: simrpc::PlaceKind::None,
		required_ticks: 0,
	}
}

fn reject_craft_recipe() -> simrpc::CraftRecipeResponse {
	simrpc::CraftRecipeResponse {
		result: simrpc::CraftRecipeResult::Reject,
		dirt_delta: 0,
		stone_delta: 0,
		wood_delta: 0,
		coal_delta: 0,
		torch_delta: 0,
		workbench_delta: 0,
		wood_sword_delta: 0,
		crafted_kind: simrpc::CraftedKind::None,
		mark_workbench_built: false,
		mark_sword_crafted: false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn collecting_wood_then_stone_emits_distinct_milestones() {
		let mut ruleset = GameplayRuleset::new();
		ruleset.collect_resource(novaria_shared::command::RESOURCE_WOOD, 5, 1);
		ruleset.collect_resource(novaria_shared::command::RESOURCE_STONE, 2, 2);

		let events = ruleset.consume_milestone_events();
		assert!(events.iter().any(|e| e.payload.contains("collect_wood")));
		assert!(events.iter().any(|e| e.payload.contains("collect_stone")));
	}

	#[test]
	fn attack_enemy_requires_sword() {
		let mut ruleset = GameplayRuleset::new();
		assert!(!ruleset.execute_attack_enemy(1));
		ruleset.mark_sword_crafted(1);
		assert!(ruleset.execute_attack_enemy(2));
		assert_eq!(ruleset.state().enemy_kill_count, 1);
	}

	#[test]
	fn boss_defeat_requires_kill_threshold_and_latches_once() {
		let mut ruleset = GameplayRuleset::new();
		ruleset.mark_sword_crafted(0);
		for _ in 0..KILL_THRESHOLD {
			ruleset.execute_attack_enemy(0);
		}
		assert!(!ruleset.state().boss_defeated);

		for _ in 0..(BOSS_MAX_HEALTH / BOSS_DAMAGE_PER_ATTACK) {
			ruleset.execute_attack_boss(0);
		}
		assert!(ruleset.state().boss_defeated);
		assert_eq!(ruleset.state().boss_health, 0);
	}

	#[test]
	fn restore_never_loses_a_true_playable_loop_complete() {
		let mut ruleset = GameplayRuleset::new();
		let snapshot = GameplayState { playable_loop_complete: true, boss_health: 60, ..GameplayState::default() };
		ruleset.restore(snapshot).unwrap();
		assert!(ruleset.state().playable_loop_complete);
	}

	#[test]
	fn restore_clamps_boss_health_and_derives_defeated() {
		let mut ruleset = GameplayRuleset::new();
		let snapshot = GameplayState { boss_health: -5, ..GameplayState::default() };
		ruleset.restore(snapshot).unwrap();
		assert_eq!(ruleset.state().boss_health, 0);
		assert!(ruleset.state().boss_defeated);
	}
}
