//! The wire codec: little-endian varint and zigzag-varint primitives, the self-describing
//! envelope framing, and the concrete payload shapes carried inside it.

pub mod chunk_codec;
pub mod control;
pub mod envelope;
pub mod player_command;
pub mod varint;

pub use chunk_codec::ChunkSnapshot;
pub use control::ControlType;
pub use envelope::{encode_envelope, try_decode_envelope, Envelope, MessageKind, ENVELOPE_VERSION};
pub use player_command::PlayerCommand;
