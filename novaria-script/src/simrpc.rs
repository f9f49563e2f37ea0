//! simrpc: the binary request/response protocol used to delegate authoritative rule decisions
//! (harvest/place, crafting) to the sandboxed script plane.
//!
//! Every request and response is prefixed by `(u8 version=1, u8 command)` and must be fully
//! consumed on decode — trailing bytes reject the message.

use novaria_shared::error::SimError;
use novaria_shared::wire::varint::{read_varint, read_varuint, write_varint, write_varuint};

pub const VERSION: u8 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
	Validate = 0,
	GameplayActionPrimary = 1,
	GameplayCraftRecipe = 2,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionPrimaryResult {
	Reject = 0,
	Harvest = 1,
	Place = 2,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlaceKind {
	None = 0,
	Dirt = 1,
	Stone = 2,
	Torch = 3,
	Workbench = 4,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CraftRecipeResult {
	Reject = 0,
	Craft = 1,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CraftedKind {
	None = 0,
	Workbench = 1,
	Torch = 2,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ValidateResponse {
	pub ok: bool,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ActionPrimaryRequest {
	pub player_id: u32,
	pub player_tile_x: i32,
	pub player_tile_y: i32,
	pub target_tile_x: i32,
	pub target_tile_y: i32,
	pub hotbar_row: u8,
	pub hotbar_slot: u8,

	pub dirt_count: u32,
	pub stone_count: u32,
	pub wood_count: u32,
	pub coal_count: u32,
	pub torch_count: u32,
	pub workbench_count: u32,
	pub wood_sword_count: u32,
	pub has_pickaxe_tool: bool,
	pub has_axe_tool: bool,

	pub target_is_air: bool,
	pub harvest_ticks: u32,
	pub harvestable_by_pickaxe: bool,
	pub harvestable_by_axe: bool,
	pub harvestable_by_sword: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActionPrimaryResponse {
	pub result: ActionPrimaryResult,
	pub place_kind: PlaceKind,
	pub required_ticks: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CraftRecipeRequest {
	pub player_id: u32,
	pub player_tile_x: i32,
	pub player_tile_y: i32,
	pub recipe_index: u8,
	pub workbench_reachable: bool,

	pub dirt_count: u32,
	pub stone_count: u32,
	pub wood_count: u32,
	pub coal_count: u32,
	pub torch_count: u32,
	pub workbench_count: u32,
	pub wood_sword_count: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CraftRecipeResponse {
	pub result: CraftRecipeResult,
	pub dirt_delta: i32,
	pub stone_delta: i32,
	pub wood_delta: i32,
	pub coal_delta: i32,
	pub torch_delta: i32,
	pub workbench_delta: i32,
	pub wood_sword_delta: i32,
	pub crafted_kind: CraftedKind,
	pub mark_workbench_built: bool,
	pub mark_sword_crafted: bool,
}

fn bounded_u32(value: u64) -> Result<u32, SimError> {
	u32::try_from(value).map_err(|_| SimError::InvalidCommandPayload)
}

fn bounded_i32(value: i64) -> Result<i32, SimError> {
	i32::try_from(value).map_err(|_| SimError::InvalidCommandPayload)
}

fn read_u8(bytes: &[u8], cursor: &mut usize) -> Result<u8, SimError> {
	let byte = *bytes.get(*cursor).ok_or(SimError::InvalidCommandPayload)?;
	*cursor += 1;
	Ok(byte)
}

fn read_flag(bytes: &[u8], cursor: &mut usize) -> Result<bool, SimError> {
	Ok(read_u8(bytes, cursor)? != 0)
}

fn ensure_consumed(bytes: &[u8], cursor: usize) -> Result<(), SimError> {
	if cursor != bytes.len() {
		return Err(SimError::InvalidCommandPayload);
	}
	Ok(())
}

fn ensure_header(bytes: &[u8], cursor: &mut usize, expected: Command) -> Result<(), SimError> {
	let version = read_u8(bytes, cursor)?;
	let command = read_u8(bytes, cursor)?;
	if version != VERSION || command != expected as u8 {
		return Err(SimError::InvalidCommandPayload);
	}
	Ok(())
}

fn write_header(out: &mut Vec<u8>, command: Command) {
	out.push(VERSION);
	out.push(command as u8);
}

pub fn encode_validate_request() -> Vec<u8> {
	let mut out = Vec::new();
	write_header(&mut out, Command::Validate);
	out
}

pub fn try_decode_validate_response(payload: &[u8]) -> Result<ValidateResponse, SimError> {
	let mut cursor = 0;
	ensure_header(payload, &mut cursor, Command::Validate)?;
	let ok = read_flag(payload, &mut cursor)?;
	ensure_consumed(payload, cursor)?;
	Ok(ValidateResponse { ok })
}

pub fn encode_validate_response(ok: bool) -> Vec<u8> {
	let mut out = Vec::new();
	write_header(&mut out, Command::Validate);
	out.push(u8::from(ok));
	out
}

pub fn encode_action_primary_request(request: &ActionPrimaryRequest) -> Vec<u8> {
	let mut out = Vec::new();
	write_header(&mut out, Command::GameplayActionPrimary);
	write_varuint(&mut out, request.player_id as u64);
	write_varint(&mut out, request.player_tile_x as i64);
	write_varint(&mut out, request.player_tile_y as i64);
	write_varint(&mut out, request.target_tile_x as i64);
	write_varint(&mut out, request.target_tile_y as i64);
	out.push(request.hotbar_row);
	out.push(request.hotbar_slot);
	write_varuint(&mut out, request.dirt_count as u64);
	write_varuint(&mut out, request.stone_count as u64);
	write_varuint(&mut out, request.wood_count as u64);
	write_varuint(&mut out, request.coal_count as u64);
	write_varuint(&mut out, request.torch_count as u64);
	write_varuint(&mut out, request.workbench_count as u64);
	write_varuint(&mut out, request.wood_sword_count as u64);
	out.push(u8::from(request.has_pickaxe_tool));
	out.push(u8::from(request.has_axe_tool));
	out.push(u8::from(request.target_is_air));
	write_varuint(&mut out, request.harvest_ticks as u64);
	let mut harvest_flags = 0u8;
	if request.harvestable_by_pickaxe {
		harvest_flags |= 1;
	}
	if request.harvestable_by_axe {
		harvest_flags |= 2;
	}
	if request.harvestable_by_sword {
		harvest_flags |= 4;
	}
	out.push(harvest_flags);
	out
}

pub fn try_decode_action_primary_request(
	payload: &[u8],
) -> Result<ActionPrimaryRequest, SimError> {
	let mut cursor = 0;
	ensure_header(payload, &mut cursor, Command::GameplayActionPrimary)?;

	let player_id = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let player_tile_x = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let player_tile_y = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let target_tile_x = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let target_tile_y = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let hotbar_row = read_u8(payload, &mut cursor)?;
	let hotbar_slot = read_u8(payload, &mut cursor)?;
	let dirt_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let stone_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let wood_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let coal_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let torch_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let workbench_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let wood_sword_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let has_pickaxe_tool = read_flag(payload, &mut cursor)?;
	let has_axe_tool = read_flag(payload, &mut cursor)?;
	let target_is_air = read_flag(payload, &mut cursor)?;
	let harvest_ticks = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let harvest_flags = read_u8(payload, &mut cursor)?;
	if harvest_flags & !0x07 != 0 {
		return Err(SimError::InvalidCommandPayload);
	}
	ensure_consumed(payload, cursor)?;

	Ok(ActionPrimaryRequest {
		player_id,
		player_tile_x,
		player_tile_y,
		target_tile_x,
		target_tile_y,
		hotbar_row,
		hotbar_slot,
		dirt_count,
		stone_count,
		wood_count,
		coal_count,
		torch_count,
		workbench_count,
		wood_sword_count,
		has_pickaxe_tool,
		has_axe_tool,
		target_is_air,
		harvest_ticks,
		harvestable_by_pickaxe: harvest_flags & 1 != 0,
		harvestable_by_axe: harvest_flags & 2 != 0,
		harvestable_by_sword: harvest_flags & 4 != 0,
	})
}

pub fn encode_action_primary_response(response: &ActionPrimaryResponse) -> Vec<u8> {
	let mut out = Vec::new();
	write_header(&mut out, Command::GameplayActionPrimary);
	out.push(response.result as u8);
	out.push(response.place_kind as u8);
	write_varuint(&mut out, response.required_ticks as u64);
	out
}

pub fn try_decode_action_primary_response(
	payload: &[u8],
) -> Result<ActionPrimaryResponse, SimError> {
	let mut cursor = 0;
	ensure_header(payload, &mut cursor, Command::GameplayActionPrimary)?;
	let result = read_u8(payload, &mut cursor)?;
	let place_kind = read_u8(payload, &mut cursor)?;
	let required_ticks = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	ensure_consumed(payload, cursor)?;

	let result = match result {
		0 => ActionPrimaryResult::Reject,
		1 => ActionPrimaryResult::Harvest,
		2 => ActionPrimaryResult::Place,
		_ => return Err(SimError::InvalidCommandPayload),
	};
	let place_kind = match place_kind {
		0 => PlaceKind::None,
		1 => PlaceKind::Dirt,
		2 => PlaceKind::Stone,
		3 => PlaceKind::Torch,
		4 => PlaceKind::Workbench,
		_ => return Err(SimError::InvalidCommandPayload),
	};

	Ok(ActionPrimaryResponse { result, place_kind, required_ticks })
}

pub fn encode_craft_recipe_request(request: &CraftRecipeRequest) -> Vec<u8> {
	let mut out = Vec::new();
	write_header(&mut out, Command::GameplayCraftRecipe);
	write_varuint(&mut out, request.player_id as u64);
	write_varint(&mut out, request.player_tile_x as i64);
	write_varint(&mut out, request.player_tile_y as i64);
	out.push(request.recipe_index);
	out.push(u8::from(request.workbench_reachable));
	write_varuint(&mut out, request.dirt_count as u64);
	write_varuint(&mut out, request.stone_count as u64);
	write_varuint(&mut out, request.wood_count as u64);
	write_varuint(&mut out, request.coal_count as u64);
	write_varuint(&mut out, request.torch_count as u64);
	write_varuint(&mut out, request.workbench_count as u64);
	write_varuint(&mut out, request.wood_sword_count as u64);
	out
}

pub fn try_decode_craft_recipe_request(payload: &[u8]) -> Result<CraftRecipeRequest, SimError> {
	let mut cursor = 0;
	ensure_header(payload, &mut cursor, Command::GameplayCraftRecipe)?;

	let player_id = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let player_tile_x = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let player_tile_y = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let recipe_index = read_u8(payload, &mut cursor)?;
	let workbench_reachable = read_flag(payload, &mut cursor)?;
	let dirt_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let stone_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let wood_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let coal_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let torch_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let workbench_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	let wood_sword_count = bounded_u32(read_varuint(payload, &mut cursor)?)?;
	ensure_consumed(payload, cursor)?;

	Ok(CraftRecipeRequest {
		player_id,
		player_tile_x,
		player_tile_y,
		recipe_index,
		workbench_reachable,
		dirt_count,
		stone_count,
		wood_count,
		coal_count,
		torch_count,
		workbench_count,
		wood_sword_count,
	})
}

pub fn encode_craft_recipe_response(response: &CraftRecipeResponse) -> Vec<u8> {
	let mut out = Vec::new();
	write_header(&mut out, Command::GameplayCraftRecipe);
	out.push(response.result as u8);
	write_varint(&mut out, response.dirt_delta as i64);
	write_varint(&mut out, response.stone_delta as i64);
	write_varint(&mut out, response.wood_delta as i64);
	write_varint(&mut out, response.coal_delta as i64);
	write_varint(&mut out, response.torch_delta as i64);
	write_varint(&mut out, response.workbench_delta as i64);
	write_varint(&mut out, response.wood_sword_delta as i64);
	out.push(response.crafted_kind as u8);
	let mut milestone_flags = 0u8;
	if response.mark_workbench_built {
		milestone_flags |= 1;
	}
	if response.mark_sword_crafted {
		milestone_flags |= 2;
	}
	out.push(milestone_flags);
	out
}

pub fn try_decode_craft_recipe_response(payload: &[u8]) -> Result<CraftRecipeResponse, SimError> {
	let mut cursor = 0;
	ensure_header(payload, &mut cursor, Command::GameplayCraftRecipe)?;
	let result = read_u8(payload, &mut cursor)?;
	let dirt_delta = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let stone_delta = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let wood_delta = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let coal_delta = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let torch_delta = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let workbench_delta = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let wood_sword_delta = bounded_i32(read_varint(payload, &mut cursor)?)?;
	let crafted_kind = read_u8(payload, &mut cursor)?;
	let milestone_flags = read_u8(payload, &mut cursor)?;
	ensure_consumed(payload, cursor)?;

	let result = match result {
		0 => CraftRecipeResult::Reject,
		1 => CraftRecipeResult::Craft,
		_ => return Err(SimError::InvalidCommandPayload),
	};
	let crafted_kind = match crafted_kind {
		0 => CraftedKind::None,
		1 => CraftedKind::Workbench,
		2 => CraftedKind::Torch,
		_ => return Err(SimError::InvalidCommandPayload),
	};

	Ok(CraftRecipeResponse {
		result,
		dirt_delta,
		stone_delta,
		wood_delta,
		coal_delta,
		torch_delta,
		workbench_delta,
		wood_sword_delta,
		crafted_kind,
		mark_workbench_built: milestone_flags & 1 != 0,
		mark_sword_crafted: milestone_flags & 2 != 0,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn action_primary_round_trips() {
		let request = ActionPrimaryRequest {
			player_id: 7,
			player_tile_x: -3,
			player_tile_y: 4,
			target_tile_x: -2,
			target_tile_y: 4,
			hotbar_row: 0,
			hotbar_slot: 2,
			harvestable_by_pickaxe: true,
			harvestable_by_sword: true,
			has_pickaxe_tool: true,
			..Default::default()
		};
		let encoded = encode_action_primary_request(&request);
		assert_eq!(try_decode_action_primary_request(&encoded).unwrap(), request);
	}

	#[test]
	fn craft_recipe_round_trips() {
		let response = CraftRecipeResponse {
			result: CraftRecipeResult::Craft,
			dirt_delta: 0,
			stone_delta: 0,
			wood_delta: -10,
			coal_delta: 0,
			torch_delta: 0,
			workbench_delta: 1,
			wood_sword_delta: 0,
			crafted_kind: CraftedKind::Workbench,
			mark_workbench_built: true,
			mark_sword_crafted: false,
		};
		let encoded = encode_craft_recipe_response(&response);
		assert_eq!(try_decode_craft_recipe_response(&encoded).unwrap(), response);
	}

	#[test]
	fn rejects_extra_harvest_flag_bits() {
		let mut bytes = encode_action_primary_request(&ActionPrimaryRequest::default());
		*bytes.last_mut().unwrap() = 0xff;
		assert!(try_decode_action_primary_request(&bytes).is_err());
	}

	#[test]
	fn validate_round_trips() {
		let encoded = encode_validate_response(true);
		assert_eq!(try_decode_validate_response(&encoded).unwrap(), ValidateResponse { ok: true });
	}
}
