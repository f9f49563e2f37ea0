//! Chunked tile-based world storage with dirty-chunk tracking.

use crate::error::SimError;
use crate::materials::{AIR, DIRT, STONE};
use crate::wire::chunk_codec::ChunkSnapshot;
use rustc_hash::FxHashMap;

pub const CHUNK_SIDE: i32 = 32;
pub const CHUNK_TILE_COUNT: usize = (CHUNK_SIDE * CHUNK_SIDE) as usize;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ChunkCoord {
	pub cx: i32,
	pub cy: i32,
}

/// Floor division toward negative infinity, unlike Rust's truncating `/`.
fn floor_div(value: i32, divisor: i32) -> i32 {
	let quotient = value / divisor;
	let remainder = value % divisor;
	if (remainder != 0) && ((remainder < 0) != (divisor < 0)) {
		quotient - 1
	} else {
		quotient
	}
}

fn positive_mod(value: i32, modulus: i32) -> i32 {
	let remainder = value % modulus;
	if remainder < 0 {
		remainder + modulus
	} else {
		remainder
	}
}

pub fn world_to_chunk_coord(x: i32, y: i32) -> ChunkCoord {
	ChunkCoord { cx: floor_div(x, CHUNK_SIDE), cy: floor_div(y, CHUNK_SIDE) }
}

fn local_index(local_x: i32, local_y: i32) -> usize {
	(local_y * CHUNK_SIDE + local_x) as usize
}

/// `air` above y=0, `dirt` from y=0 up to (not including) y=32, `stone` at y≥32.
fn build_initial_chunk_tiles(coord: ChunkCoord) -> Vec<u16> {
	let mut tiles = vec![0u16; CHUNK_TILE_COUNT];
	for local_y in 0..CHUNK_SIDE {
		let world_y = coord.cy * CHUNK_SIDE + local_y;
		let material = if world_y >= CHUNK_SIDE {
			STONE
		} else if world_y >= 0 {
			DIRT
		} else {
			AIR
		};
		for local_x in 0..CHUNK_SIDE {
			tiles[local_index(local_x, local_y)] = material;
		}
	}
	tiles
}

#[derive(Clone, Debug)]
struct Chunk {
	tiles: Vec<u16>,
	dirty: bool,
}

impl Chunk {
	fn seeded(coord: ChunkCoord) -> Self {
		Self { tiles: build_initial_chunk_tiles(coord), dirty: false }
	}
}

#[derive(Default)]
pub struct WorldService {
	chunks: FxHashMap<ChunkCoord, Chunk>,
}

impl WorldService {
	pub fn new() -> Self {
		Self::default()
	}

	/// Idempotent; creates the chunk from its seed profile if absent.
	pub fn load_chunk(&mut self, coord: ChunkCoord) {
		self.chunks.entry(coord).or_insert_with(|| Chunk::seeded(coord));
	}

	pub fn unload_chunk(&mut self, coord: ChunkCoord) {
		self.chunks.remove(&coord);
	}

	pub fn is_chunk_loaded(&self, coord: ChunkCoord) -> bool {
		self.chunks.contains_key(&coord)
	}

	pub fn loaded_chunk_count(&self) -> usize {
		self.chunks.len()
	}

	pub fn try_read_tile(&self, x: i32, y: i32) -> Option<u16> {
		let coord = world_to_chunk_coord(x, y);
		let chunk = self.chunks.get(&coord)?;
		let local_x = positive_mod(x, CHUNK_SIDE);
		let local_y = positive_mod(y, CHUNK_SIDE);
		Some(chunk.tiles[local_index(local_x, local_y)])
	}

	/// Auto-creates the owning chunk if absent, overwrites the tile, marks the chunk dirty.
	pub fn apply_tile_mutation(&mut self, x: i32, y: i32, material: u16) {
		let coord = world_to_chunk_coord(x, y);
		let chunk = self.chunks.entry(coord).or_insert_with(|| Chunk::seeded(coord));
		let local_x = positive_mod(x, CHUNK_SIDE);
		let local_y = positive_mod(y, CHUNK_SIDE);
		chunk.tiles[local_index(local_x, local_y)] = material;
		chunk.dirty = true;
	}

	pub fn build_snapshot(&self, coord: ChunkCoord) -> Result<ChunkSnapshot, SimError> {
		let chunk = self.chunks.get(&coord).ok_or(SimError::ChunkNotFound(coord.cx, coord.cy))?;
		Ok(ChunkSnapshot { coord, tiles: chunk.tiles.clone() })
	}

	/// Replaces tile contents of the referenced chunk. Does NOT mark it dirty — replication is
	/// for locally originated changes only, and applying a remote snapshot is not one of those.
	pub fn apply_snapshot(&mut self, snapshot: &ChunkSnapshot) {
		let chunk = self
			.chunks
			.entry(snapshot.coord)
			.or_insert_with(|| Chunk::seeded(snapshot.coord));
		chunk.tiles.clone_from(&snapshot.tiles);
	}

	/// Returns coords of chunks currently dirty and atomically clears their dirty flags.
	/// Iteration order is unspecified but stable within the call.
	pub fn consume_dirty(&mut self) -> Vec<ChunkCoord> {
		let mut dirty = Vec::new();
		for (coord, chunk) in self.chunks.iter_mut() {
			if chunk.dirty {
				chunk.dirty = false;
				dirty.push(*coord);
			}
		}
		dirty
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chunk_round_trip() {
		let mut world_a = WorldService::new();
		world_a.load_chunk(ChunkCoord { cx: 0, cy: 0 });
		world_a.apply_tile_mutation(0, 0, 77);

		assert_eq!(world_a.consume_dirty(), vec![ChunkCoord { cx: 0, cy: 0 }]);

		let snapshot = world_a.build_snapshot(ChunkCoord { cx: 0, cy: 0 }).unwrap();
		assert_eq!(snapshot.tiles[0], 77);
		assert_eq!(snapshot.tiles[1], DIRT);

		let mut world_b = WorldService::new();
		world_b.apply_snapshot(&snapshot);
		assert_eq!(world_b.try_read_tile(0, 0), Some(77));
	}

	#[test]
	fn negative_coordinates_map_to_well_formed_chunks() {
		let coord = world_to_chunk_coord(-1, -1);
		assert_eq!(coord, ChunkCoord { cx: -1, cy: -1 });
	}

	#[test]
	fn seed_profile_matches_depth_bands() {
		let mut world = WorldService::new();
		world.load_chunk(ChunkCoord { cx: 0, cy: -1 });
		assert_eq!(world.try_read_tile(0, -1), Some(AIR));
		world.load_chunk(ChunkCoord { cx: 0, cy: 0 });
		assert_eq!(world.try_read_tile(0, 0), Some(DIRT));
		world.load_chunk(ChunkCoord { cx: 0, cy: 1 });
		assert_eq!(world.try_read_tile(0, 32), Some(STONE));
	}

	#[test]
	fn unload_discards_dirty_state() {
		let mut world = WorldService::new();
		world.apply_tile_mutation(5, 5, 2);
		world.unload_chunk(ChunkCoord { cx: 0, cy: 0 });
		assert!(!world.is_chunk_loaded(ChunkCoord { cx: 0, cy: 0 }));
		assert_eq!(world.consume_dirty(), Vec::<ChunkCoord>::new());
	}
}
