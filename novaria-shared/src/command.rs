//! Stable command/resource identifiers carried on the wire, and the small payload encodings
//! that accompany them.

pub const JUMP: u32 = 1;
pub const ATTACK: u32 = 2;
pub const PLAYER_MOTION_INPUT: u32 = 3;

pub const WORLD_SET_TILE: u32 = 10;
pub const WORLD_LOAD_CHUNK: u32 = 11;
pub const WORLD_UNLOAD_CHUNK: u32 = 12;

pub const GAMEPLAY_COLLECT_RESOURCE: u32 = 20;
pub const GAMEPLAY_SPAWN_DROP: u32 = 21;
pub const GAMEPLAY_PICKUP_PROBE: u32 = 22;
pub const GAMEPLAY_INTERACTION: u32 = 23;
pub const GAMEPLAY_ACTION_PRIMARY: u32 = 24;
pub const GAMEPLAY_CRAFT_RECIPE: u32 = 25;
pub const GAMEPLAY_ATTACK_ENEMY: u32 = 26;
pub const GAMEPLAY_ATTACK_BOSS: u32 = 27;

pub const COMBAT_FIRE_PROJECTILE: u32 = 30;

pub const RESOURCE_WOOD: u32 = 1;
pub const RESOURCE_STONE: u32 = 2;

pub const MOTION_INPUT_FLAG_JUMP_PRESSED: u8 = 1;

/// `PlayerMotionInput` command payload: `zigzag_varint(move_axis) || u8(flags)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlayerMotionInputPayload {
	pub move_axis: i8,
	pub jump_pressed: bool,
}

impl PlayerMotionInputPayload {
	pub fn encode(self) -> Vec<u8> {
		let mut out = Vec::new();
		crate::wire::varint::write_varint(&mut out, self.move_axis as i64);
		let flags = if self.jump_pressed { MOTION_INPUT_FLAG_JUMP_PRESSED } else { 0 };
		out.push(flags);
		out
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, crate::error::SimError> {
		let mut cursor = 0;
		let move_axis = crate::wire::varint::read_varint(bytes, &mut cursor)?;
		let move_axis = i8::try_from(move_axis).map_err(|_| crate::error::SimError::InvalidCommandPayload)?;
		let flags = *bytes.get(cursor).ok_or(crate::error::SimError::InvalidCommandPayload)?;
		cursor += 1;
		if cursor != bytes.len() {
			return Err(crate::error::SimError::InvalidCommandPayload);
		}
		Ok(Self { move_axis, jump_pressed: flags & MOTION_INPUT_FLAG_JUMP_PRESSED != 0 })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn motion_input_payload_round_trips() {
		let payload = PlayerMotionInputPayload { move_axis: -1, jump_pressed: true };
		let encoded = payload.encode();
		assert_eq!(PlayerMotionInputPayload::decode(&encoded).unwrap(), payload);
	}
}
