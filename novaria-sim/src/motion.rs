//! Swept-AABB platformer motion against the tile grid, sampled through the material catalog.
//!
//! `y` increases downward: `feet_y` is the bottom edge of the player's collision box, and rising
//! means `vy < 0`.

use novaria_shared::materials;
use novaria_shared::world::WorldService;

const COLLISION_INSET: f32 = 0.02;
const HORIZONTAL_SWEEP_ITERATIONS: u32 = 10;

#[derive(Clone, Copy, Debug)]
pub struct MotionSettings {
	pub max_speed: f32,
	pub acceleration: f32,
	pub deceleration: f32,
	pub gravity: f32,
	pub jump_speed: f32,
	pub max_fall_speed: f32,
	pub half_width: f32,
	pub height: f32,
	pub step_height: f32,
	pub ground_snap: f32,
}

impl Default for MotionSettings {
	fn default() -> Self {
		Self {
			max_speed: 3.6,
			acceleration: 18.0,
			deceleration: 24.0,
			gravity: 20.0,
			jump_speed: 7.2,
			max_fall_speed: 12.0,
			half_width: 0.35,
			height: 0.85,
			step_height: 0.35,
			ground_snap: 0.05,
		}
	}
}

#[derive(Clone, Copy, Debug)]
pub struct MotionState {
	pub x: f32,
	pub y: f32,
	pub vx: f32,
	pub vy: f32,
	pub on_ground: bool,
}

impl MotionState {
	pub fn spawn() -> Self {
		Self { x: 0.0, y: -2.0, vx: 0.0, vy: 0.0, on_ground: false }
	}
}

/// Advances `state` by one fixed tick of motion given an input axis in `[-1, 1]`.
pub fn step(state: &mut MotionState, settings: &MotionSettings, world: &WorldService, move_axis: f32, jump_pressed: bool, dt: f32) {
	update_horizontal_velocity(state, settings, move_axis, dt);

	if jump_pressed && state.on_ground {
		state.vy = -settings.jump_speed;
		state.on_ground = false;
	}

	state.vy = (state.vy + settings.gravity * dt).min(settings.max_fall_speed);

	sweep_horizontal(state, settings, world, dt);
	sweep_vertical(state, settings, world, dt);
}

fn update_horizontal_velocity(state: &mut MotionState, settings: &MotionSettings, move_axis: f32, dt: f32) {
	let target_vx = move_axis * settings.max_speed;
	if move_axis != 0.0 {
		state.vx = move_toward(state.vx, target_vx, settings.acceleration * dt);
	} else {
		state.vx = move_toward(state.vx, 0.0, settings.deceleration * dt);
	}
}

fn move_toward(current: f32, target: f32, max_delta: f32) -> f32 {
	if (target - current).abs() <= max_delta {
		target
	} else {
		current + max_delta * (target - current).signum()
	}
}

fn sweep_horizontal(state: &mut MotionState, settings: &MotionSettings, world: &WorldService, dt: f32) {
	let start_x = state.x;
	let target_x = start_x + state.vx * dt;
	if target_x == start_x {
		return;
	}

	if !is_box_blocked(world, target_x, state.y, settings) {
		state.x = target_x;
		return;
	}

	if state.on_ground && state.vy >= 0.0 {
		if let Some(floor_y) = try_step_up(world, target_x, state.y, settings) {
			state.x = target_x;
			state.y = floor_y;
			state.vy = 0.0;
			return;
		}
	}

	let mut lo = 0.0f32;
	let mut hi = 1.0f32;
	for _ in 0..HORIZONTAL_SWEEP_ITERATIONS {
		let mid = (lo + hi) * 0.5;
		let candidate_x = start_x + (target_x - start_x) * mid;
		if is_box_blocked(world, candidate_x, state.y, settings) {
			hi = mid;
		} else {
			lo = mid;
		}
	}
	state.x = start_x + (target_x - start_x) * lo;
	state.vx = 0.0;
}

fn sweep_vertical(state: &mut MotionState, settings: &MotionSettings, world: &WorldService, dt: f32) {
	let delta_y = state.vy * dt;

	if delta_y < 0.0 {
		let start_y = state.y;
		let target_y = start_y + delta_y;
		let mut lo = 0.0f32;
		let mut hi = 1.0f32;
		for _ in 0..HORIZONTAL_SWEEP_ITERATIONS {
			let mid = (lo + hi) * 0.5;
			let candidate_y = start_y + (target_y - start_y) * mid;
			if is_ceiling_blocked(world, state.x, candidate_y, settings) {
				hi = mid;
			} else {
				lo = mid;
			}
		}
		state.y = start_y + (target_y - start_y) * lo;
		if lo < 1.0 {
			state.vy = 0.0;
		}
		state.on_ground = false;
		return;
	}

	let scan_depth = delta_y.max(settings.ground_snap);
	match find_floor_within(world, state.x, state.y, scan_depth, settings) {
		Some(floor_y) => {
			state.y = floor_y;
			state.vy = 0.0;
			state.on_ground = true;
		}
		None => {
			state.y += delta_y;
			state.on_ground = false;
		}
	}
}

fn is_box_blocked(world: &WorldService, center_x: f32, feet_y: f32, settings: &MotionSettings) -> bool {
	let left = center_x - settings.half_width + COLLISION_INSET;
	let right = center_x + settings.half_width - COLLISION_INSET;
	let bottom = feet_y - COLLISION_INSET;
	let top = feet_y - settings.height + COLLISION_INSET;

	for &sample_x in &[left, right] {
		for &sample_y in &[bottom, top, (bottom + top) * 0.5] {
			if probe_solid(world, sample_x, sample_y) {
				return true;
			}
		}
	}
	false
}

fn is_ceiling_blocked(world: &WorldService, center_x: f32, feet_y: f32, settings: &MotionSettings) -> bool {
	let inset = settings.half_width - 0.03;
	let top = (feet_y - settings.height).next_up();
	for &sample_x in &[center_x - inset, center_x + inset] {
		if probe_solid(world, sample_x, top) {
			return true;
		}
	}
	false
}

fn try_step_up(world: &WorldService, target_x: f32, feet_y: f32, settings: &MotionSettings) -> Option<f32> {
	let mut best_floor: Option<f32> = None;
	for &sample_x in &[target_x - settings.half_width + COLLISION_INSET, target_x, target_x + settings.half_width - COLLISION_INSET] {
		if let Some(floor_y) = find_floor_within(world, sample_x, feet_y, settings.step_height + settings.ground_snap, settings) {
			let stepped_up = floor_y < feet_y + settings.ground_snap && feet_y - floor_y <= settings.step_height;
			if stepped_up {
				best_floor = Some(best_floor.map_or(floor_y, |current| current.min(floor_y)));
			}
		}
	}

	best_floor.filter(|&floor_y| !is_box_blocked(world, target_x, floor_y, settings))
}

fn find_floor_within(world: &WorldService, x: f32, feet_y: f32, depth: f32, settings: &MotionSettings) -> Option<f32> {
	let tile_x = x.floor() as i32;
	let local_x = x - tile_x as f32;

	let start_tile_y = (feet_y - settings.ground_snap).floor() as i32;
	let end_tile_y = (feet_y + depth).ceil() as i32;

	for tile_y in start_tile_y..=end_tile_y {
		let Some(material_id) = world.try_read_tile(tile_x, tile_y) else { continue };
		if !materials::has_floor_surface(material_id) {
			continue;
		}
		let surface_y = tile_y as f32 + materials::floor_surface_y(material_id, local_x);
		if surface_y >= feet_y - settings.ground_snap && surface_y <= feet_y + depth {
			return Some(surface_y);
		}
	}
	None
}

fn probe_solid(world: &WorldService, x: f32, y: f32) -> bool {
	let tile_x = x.floor() as i32;
	let tile_y = y.floor() as i32;
	let Some(material_id) = world.try_read_tile(tile_x, tile_y) else { return false };
	let local_x = x - tile_x as f32;
	let local_y = y - tile_y as f32;
	materials::is_solid_at(material_id, local_x, local_y)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn world_with_floor_at(floor_y: i32) -> WorldService {
		let mut world = WorldService::new();
		for x in -5..5 {
			world.apply_tile_mutation(x, floor_y, materials::STONE);
		}
		world
	}

	#[test]
	fn falling_player_lands_on_floor_and_zeros_velocity() {
		let mut state = MotionState { x: 0.0, y: -5.0, vx: 0.0, vy: 0.0, on_ground: false };
		let settings = MotionSettings::default();
		let world = world_with_floor_at(0);

		for _ in 0..300 {
			step(&mut state, &settings, &world, 0.0, false, 1.0 / 60.0);
			if state.on_ground {
				break;
			}
		}

		assert!(state.on_ground);
		assert_eq!(state.vy, 0.0);
	}

	#[test]
	fn horizontal_motion_accelerates_toward_max_speed() {
		let mut state = MotionState::spawn();
		let settings = MotionSettings::default();
		let world = WorldService::new();

		step(&mut state, &settings, &world, 1.0, false, 1.0 / 60.0);
		assert!(state.vx > 0.0);
		assert!(state.vx <= settings.max_speed);
	}

	#[test]
	fn wall_to_the_right_stops_horizontal_motion() {
		let mut state = MotionState { x: 0.0, y: 0.0, vx: 5.0, vy: 0.0, on_ground: true };
		let settings = MotionSettings::default();
		let mut world = WorldService::new();
		for y in -2..2 {
			world.apply_tile_mutation(2, y, materials::STONE);
		}

		step(&mut state, &settings, &world, 0.0, false, 1.0);
		assert!(state.x < 2.0 - settings.half_width + 0.01);
	}
}
