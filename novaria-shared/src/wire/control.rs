//! Control datagram payload: a single control-type byte, no further fields.

use crate::error::SimError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlType {
	Syn = 1,
	Ack = 2,
	Heartbeat = 3,
}

impl ControlType {
	fn from_u8(value: u8) -> Option<Self> {
		match value {
			1 => Some(Self::Syn),
			2 => Some(Self::Ack),
			3 => Some(Self::Heartbeat),
			_ => None,
		}
	}
}

pub fn encode_control_payload(control_type: ControlType) -> Vec<u8> {
	vec![control_type as u8]
}

pub fn decode_control_payload(bytes: &[u8]) -> Result<ControlType, SimError> {
	if bytes.len() != 1 {
		return Err(SimError::InvalidEnvelope);
	}
	ControlType::from_u8(bytes[0]).ok_or(SimError::InvalidEnvelope)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn control_payload_round_trips() {
		for control_type in [ControlType::Syn, ControlType::Ack, ControlType::Heartbeat] {
			let encoded = encode_control_payload(control_type);
			assert_eq!(decode_control_payload(&encoded).unwrap(), control_type);
		}
	}
}
