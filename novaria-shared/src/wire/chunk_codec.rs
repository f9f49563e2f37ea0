//! Chunk snapshot and snapshot-batch wire payloads, carried inside `ChunkSnapshot` /
//! `ChunkSnapshotBatch` envelopes.

use crate::error::SimError;
use crate::wire::varint::{read_varint, read_varuint, write_varint, write_varuint};
use crate::world::ChunkCoord;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChunkSnapshot {
	pub coord: ChunkCoord,
	pub tiles: Vec<u16>,
}

pub fn encode_chunk_snapshot(snapshot: &ChunkSnapshot) -> Vec<u8> {
	let mut out = Vec::with_capacity(4 + snapshot.tiles.len() * 2);
	write_varint(&mut out, snapshot.coord.cx as i64);
	write_varint(&mut out, snapshot.coord.cy as i64);
	write_varuint(&mut out, snapshot.tiles.len() as u64);
	for tile in &snapshot.tiles {
		out.extend_from_slice(&tile.to_le_bytes());
	}
	out
}

/// Decodes one chunk snapshot starting at `cursor`, advancing it past the payload consumed.
pub fn decode_chunk_snapshot(bytes: &[u8], cursor: &mut usize) -> Result<ChunkSnapshot, SimError> {
	let cx = read_varint(bytes, cursor)? as i32;
	let cy = read_varint(bytes, cursor)? as i32;
	let tile_count = read_varuint(bytes, cursor)? as usize;

	let byte_len = tile_count.checked_mul(2).ok_or(SimError::InvalidEnvelope)?;
	let end = cursor.checked_add(byte_len).ok_or(SimError::InvalidEnvelope)?;
	let raw = bytes.get(*cursor..end).ok_or(SimError::InvalidEnvelope)?;

	let mut tiles = Vec::with_capacity(tile_count);
	for pair in raw.chunks_exact(2) {
		tiles.push(u16::from_le_bytes([pair[0], pair[1]]));
	}
	*cursor = end;

	Ok(ChunkSnapshot { coord: ChunkCoord { cx, cy }, tiles })
}

pub fn encode_chunk_snapshot_batch(snapshots: &[ChunkSnapshot]) -> Vec<u8> {
	let mut out = Vec::new();
	write_varuint(&mut out, snapshots.len() as u64);
	for snapshot in snapshots {
		out.extend_from_slice(&encode_chunk_snapshot(snapshot));
	}
	out
}

/// Splits a batch into its constituent snapshots. Any decode failure rejects the whole batch,
/// matching the "malformed batches are rejected whole" rule.
pub fn try_split_chunk_snapshot_batch(bytes: &[u8]) -> Result<Vec<ChunkSnapshot>, SimError> {
	let mut cursor = 0;
	let count = read_varuint(bytes, &mut cursor)? as usize;

	let mut snapshots = Vec::with_capacity(count);
	for _ in 0..count {
		snapshots.push(decode_chunk_snapshot(bytes, &mut cursor)?);
	}

	if cursor != bytes.len() {
		return Err(SimError::InvalidEnvelope);
	}

	Ok(snapshots)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample(cx: i32, cy: i32) -> ChunkSnapshot {
		ChunkSnapshot { coord: ChunkCoord { cx, cy }, tiles: vec![1, 2, 3, 4] }
	}

	#[test]
	fn snapshot_round_trips() {
		let snapshot = sample(-3, 7);
		let encoded = encode_chunk_snapshot(&snapshot);
		let mut cursor = 0;
		let decoded = decode_chunk_snapshot(&encoded, &mut cursor).unwrap();
		assert_eq!(decoded, snapshot);
		assert_eq!(cursor, encoded.len());
	}

	#[test]
	fn batch_round_trips() {
		let snapshots = vec![sample(0, 0), sample(1, -1), sample(5, 5)];
		let encoded = encode_chunk_snapshot_batch(&snapshots);
		let decoded = try_split_chunk_snapshot_batch(&encoded).unwrap();
		assert_eq!(decoded, snapshots);
	}

	#[test]
	fn malformed_batch_is_rejected_whole() {
		let mut encoded = encode_chunk_snapshot_batch(&[sample(0, 0), sample(1, 1)]);
		encoded.truncate(encoded.len() - 1);
		assert!(try_split_chunk_snapshot_batch(&encoded).is_err());
	}
}
