//! Player command wire payload, carried inside `Command` envelopes.

use crate::error::SimError;
use crate::wire::varint::{read_bytes, read_varuint, write_bytes, write_varuint};

/// A value-type command submitted by a player. `command_id` is one of the stable identifiers
/// in [`crate::command`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlayerCommand {
	pub player_id: u32,
	pub command_id: u32,
	pub payload: Vec<u8>,
}

pub fn encode_player_command(command: &PlayerCommand) -> Vec<u8> {
	let mut out = Vec::with_capacity(8 + command.payload.len());
	write_varuint(&mut out, command.player_id as u64);
	write_varuint(&mut out, command.command_id as u64);
	write_bytes(&mut out, &command.payload);
	out
}

pub fn decode_player_command(bytes: &[u8]) -> Result<PlayerCommand, SimError> {
	let mut cursor = 0;
	let player_id = bounded_u32(read_varuint(bytes, &mut cursor)?)?;
	let command_id = bounded_u32(read_varuint(bytes, &mut cursor)?)?;
	let payload = read_bytes(bytes, &mut cursor)?.to_vec();

	if cursor != bytes.len() {
		return Err(SimError::InvalidCommandPayload);
	}

	Ok(PlayerCommand { player_id, command_id, payload })
}

fn bounded_u32(value: u64) -> Result<u32, SimError> {
	u32::try_from(value).map_err(|_| SimError::InvalidCommandPayload)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn player_command_round_trips() {
		let command = PlayerCommand { player_id: 7, command_id: 30, payload: vec![1, 2, 3] };
		let encoded = encode_player_command(&command);
		assert_eq!(decode_player_command(&encoded).unwrap(), command);
	}

	#[test]
	fn rejects_trailing_bytes() {
		let command = PlayerCommand { player_id: 1, command_id: 1, payload: vec![] };
		let mut encoded = encode_player_command(&command);
		encoded.push(0xff);
		assert!(decode_player_command(&encoded).is_err());
	}

	#[test]
	fn rejects_out_of_range_player_id() {
		let mut bytes = Vec::new();
		write_varuint(&mut bytes, u64::MAX);
		write_varuint(&mut bytes, 1);
		write_bytes(&mut bytes, &[]);
		assert!(decode_player_command(&bytes).is_err());
	}
}
