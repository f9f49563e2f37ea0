//! Self-describing envelope framing: `u8 version || u8 kind || varuint(len) || raw(len)`.

use crate::error::SimError;
use crate::wire::varint::{read_varuint, write_varuint};

pub const ENVELOPE_VERSION: u8 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageKind {
	Control = 1,
	Command = 2,
	ChunkSnapshot = 3,
	ChunkSnapshotBatch = 4,
}

impl MessageKind {
	fn from_u8(value: u8) -> Option<Self> {
		match value {
			1 => Some(Self::Control),
			2 => Some(Self::Command),
			3 => Some(Self::ChunkSnapshot),
			4 => Some(Self::ChunkSnapshotBatch),
			_ => None,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::Control => "Control",
			Self::Command => "Command",
			Self::ChunkSnapshot => "ChunkSnapshot",
			Self::ChunkSnapshotBatch => "ChunkSnapshotBatch",
		}
	}
}

pub fn encode_envelope(kind: MessageKind, payload: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(payload.len() + 6);
	out.push(ENVELOPE_VERSION);
	out.push(kind as u8);
	write_varuint(&mut out, payload.len() as u64);
	out.extend_from_slice(payload);
	out
}

pub struct Envelope<'a> {
	pub kind: MessageKind,
	pub payload: &'a [u8],
}

pub fn try_decode_envelope(datagram: &[u8]) -> Result<Envelope<'_>, SimError> {
	let version = *datagram.first().ok_or(SimError::InvalidEnvelope)?;
	if version != ENVELOPE_VERSION {
		return Err(SimError::InvalidEnvelope);
	}

	let kind = MessageKind::from_u8(*datagram.get(1).ok_or(SimError::InvalidEnvelope)?)
		.ok_or(SimError::InvalidEnvelope)?;

	let mut cursor = 2;
	let len = read_varuint(datagram, &mut cursor)? as usize;
	let remaining = datagram.len().checked_sub(cursor).ok_or(SimError::InvalidEnvelope)?;
	if len != remaining {
		return Err(SimError::InvalidEnvelope);
	}

	Ok(Envelope { kind, payload: &datagram[cursor..] })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decode_of_encode_is_identity_for_every_kind() {
		for kind in [
			MessageKind::Control,
			MessageKind::Command,
			MessageKind::ChunkSnapshot,
			MessageKind::ChunkSnapshotBatch,
		] {
			let payload = b"arbitrary payload bytes";
			let datagram = encode_envelope(kind, payload);
			let decoded = try_decode_envelope(&datagram).unwrap();
			assert_eq!(decoded.kind, kind);
			assert_eq!(decoded.payload, payload);
		}
	}

	#[test]
	fn rejects_wrong_version() {
		let mut datagram = encode_envelope(MessageKind::Control, b"");
		datagram[0] = 2;
		assert!(try_decode_envelope(&datagram).is_err());
	}

	#[test]
	fn rejects_unknown_kind() {
		let mut datagram = encode_envelope(MessageKind::Control, b"");
		datagram[1] = 9;
		assert!(try_decode_envelope(&datagram).is_err());
	}

	#[test]
	fn rejects_length_mismatch() {
		let mut datagram = encode_envelope(MessageKind::Control, b"abc");
		datagram.push(0xff);
		assert!(try_decode_envelope(&datagram).is_err());
	}
}
