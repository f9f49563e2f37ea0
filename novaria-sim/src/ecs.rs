//! Entity/component runtime: projectile, drop, and hostile lifecycle, collision, damage, and
//! pickup resolution. Single-threaded, fixed phase order per tick.

use hecs::{Entity, World};
use novaria_shared::TickContext;

pub struct Transform {
	pub x: f64,
	pub y: f64,
}

pub struct Velocity {
	pub vx: f64,
	pub vy: f64,
}

pub struct Collider {
	pub radius: f64,
}

pub struct Faction {
	pub id: u32,
}

pub struct Health {
	pub value: i32,
}

pub struct Lifetime {
	pub ticks_remaining: u16,
}

/// Marks an entity as eligible for a `HostileDefeated` combat event when its health reaches zero.
pub struct HostileTarget {
	pub reward_kill_count: u32,
}

/// Identifies a projectile and the damage it deals on its first hit, before being recycled.
pub struct Projectile {
	pub damage: i32,
}

pub struct Drop {
	pub material_id: u16,
	pub amount: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct ProjectileSpawnRequest {
	pub x: f64,
	pub y: f64,
	pub vx: f64,
	pub vy: f64,
	pub radius: f64,
	pub faction_id: u32,
	pub ticks_remaining: u16,
	pub damage: i32,
}

#[derive(Clone, Copy, Debug)]
pub struct DropSpawnRequest {
	pub tile_x: i32,
	pub tile_y: i32,
	pub material_id: u16,
	pub amount: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct PickupProbeRequest {
	pub player_id: u32,
	pub tile_x: i32,
	pub tile_y: i32,
}

struct DamageRequest {
	target: Entity,
	amount: i32,
}

#[derive(Clone, Copy, Debug)]
pub enum CombatEvent {
	HostileDefeated { reward_kill_count: u32 },
}

#[derive(Clone, Copy, Debug)]
pub enum GameplayEvent {
	PickupResolved { player_id: u32, tile_x: i32, tile_y: i32, material_id: u16, amount: u32 },
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RuntimeDiagnostics {
	pub active_projectile_count: u64,
	pub active_hostile_count: u64,
	pub active_drop_count: u64,
	pub total_projectile_spawned: u64,
	pub total_projectile_recycled: u64,
	pub total_damage_instances: u64,
	pub total_hostile_defeated: u64,
	pub total_drop_spawned: u64,
	pub total_drop_picked_up: u64,
}

pub struct EcsRuntime {
	world: World,
	projectile_spawn_queue: Vec<ProjectileSpawnRequest>,
	drop_spawn_queue: Vec<DropSpawnRequest>,
	pickup_probe_queue: Vec<PickupProbeRequest>,
	damage_requests: Vec<DamageRequest>,
	combat_events: Vec<CombatEvent>,
	gameplay_events: Vec<GameplayEvent>,
	counters: RuntimeDiagnostics,
}

impl Default for EcsRuntime {
	fn default() -> Self {
		Self::new()
	}
}

impl EcsRuntime {
	pub fn new() -> Self {
		let mut world = World::new();
		world.spawn((
			Transform { x: 8.0, y: -4.0 },
			Velocity { vx: 0.0, vy: 0.0 },
			Collider { radius: 0.45 },
			Faction { id: 2 },
			Health { value: 25 },
			HostileTarget { reward_kill_count: 1 },
		));

		Self {
			world,
			projectile_spawn_queue: Vec::new(),
			drop_spawn_queue: Vec::new(),
			pickup_probe_queue: Vec::new(),
			damage_requests: Vec::new(),
			combat_events: Vec::new(),
			gameplay_events: Vec::new(),
			counters: RuntimeDiagnostics::default(),
		}
	}

	pub fn queue_projectile_spawn(&mut self, request: ProjectileSpawnRequest) {
		self.projectile_spawn_queue.push(request);
	}

	pub fn queue_drop_spawn(&mut self, request: DropSpawnRequest) {
		self.drop_spawn_queue.push(request);
	}

	pub fn queue_pickup_probe(&mut self, request: PickupProbeRequest) {
		self.pickup_probe_queue.push(request);
	}

	pub fn tick(&mut self, tick: &TickContext) {
		self.spawn_phase();
		self.movement_phase(tick.fixed_delta_seconds);
		self.collision_phase();
		self.damage_phase();
		self.pickup_probe_phase();
		self.lifetime_phase();
	}

	fn spawn_phase(&mut self) {
		for request in self.projectile_spawn_queue.drain(..) {
			self.world.spawn((
				Transform { x: request.x, y: request.y },
				Velocity { vx: request.vx, vy: request.vy },
				Collider { radius: request.radius },
				Faction { id: request.faction_id },
				Lifetime { ticks_remaining: request.ticks_remaining },
				Projectile { damage: request.damage },
			));
			self.counters.total_projectile_spawned += 1;
		}

		for request in self.drop_spawn_queue.drain(..) {
			let existing = self
				.world
				.query_mut::<(&Transform, &mut Drop)>()
				.into_iter()
				.find(|(_, (transform, drop))| {
					transform.x.floor() as i32 == request.tile_x
						&& transform.y.floor() as i32 == request.tile_y
						&& drop.material_id == request.material_id
				})
				.map(|(entity, _)| entity);

			match existing {
				Some(entity) => {
					let mut drop = self.world.get::<&mut Drop>(entity).expect("entity located by query");
					drop.amount += request.amount;
				}
				None => {
					self.world.spawn((
						Transform { x: request.tile_x as f64, y: request.tile_y as f64 },
						Drop { material_id: request.material_id, amount: request.amount },
					));
				}
			}
			self.counters.total_drop_spawned += 1;
		}
	}

	fn movement_phase(&mut self, dt: f64) {
		for (_, (transform, velocity)) in self.world.query_mut::<(&mut Transform, &Velocity)>() {
			transform.x += velocity.vx * dt;
			transform.y += velocity.vy * dt;
		}
	}

	fn collision_phase(&mut self) {
		let projectiles: Vec<(Entity, f64, f64, f64, u32, i32)> = self
			.world
			.query::<(&Transform, &Collider, &Faction, &Projectile)>()
			.iter()
			.map(|(entity, (t, c, f, p))| (entity, t.x, t.y, c.radius, f.id, p.damage))
			.collect();

		let hostiles: Vec<(Entity, f64, f64, f64, u32)> = self
			.world
			.query::<(&Transform, &Collider, &Faction, &HostileTarget)>()
			.iter()
			.map(|(entity, (t, c, f, _))| (entity, t.x, t.y, c.radius, f.id))
			.collect();

		let mut recycle: Vec<Entity> = Vec::new();
		for (projectile, px, py, pr, pf, damage) in projectiles {
			for &(hostile, hx, hy, hr, hf) in &hostiles {
				if pf == hf {
					continue;
				}
				let dx = px - hx;
				let dy = py - hy;
				let reach = pr + hr;
				if dx * dx + dy * dy <= reach * reach {
					self.damage_requests.push(DamageRequest { target: hostile, amount: damage });
					recycle.push(projectile);
					break;
				}
			}
		}

		for entity in recycle {
			let _ = self.world.despawn(entity);
			self.counters.total_projectile_recycled += 1;
		}
	}

	fn damage_phase(&mut self) {
		for request in self.damage_requests.drain(..) {
			self.counters.total_damage_instances += 1;

			let defeated = match self.world.get::<&mut Health>(request.target) {
				Ok(mut health) => {
					health.value -= request.amount;
					health.value <= 0
				}
				Err(_) => continue,
			};

			if defeated {
				let reward = self
					.world
					.get::<&HostileTarget>(request.target)
					.map(|target| target.reward_kill_count)
					.ok();
				if let Some(reward_kill_count) = reward {
					self.combat_events.push(CombatEvent::HostileDefeated { reward_kill_count });
					self.counters.total_hostile_defeated += 1;
					let _ = self.world.despawn(request.target);
				}
			}
		}
	}

	fn pickup_probe_phase(&mut self) {
		for probe in self.pickup_probe_queue.drain(..) {
			let mut matches: Vec<(Entity, u16, u32)> = self
				.world
				.query::<(&Transform, &Drop)>()
				.iter()
				.filter(|(_, (transform, _))| {
					transform.x.floor() as i32 == probe.tile_x && transform.y.floor() as i32 == probe.tile_y
				})
				.map(|(entity, (_, drop))| (entity, drop.material_id, drop.amount))
				.collect();
			matches.sort_by_key(|(entity, _, _)| entity.id());

			if let Some((entity, material_id, amount)) = matches.into_iter().next() {
				let _ = self.world.despawn(entity);
				self.gameplay_events.push(GameplayEvent::PickupResolved {
					player_id: probe.player_id,
					tile_x: probe.tile_x,
					tile_y: probe.tile_y,
					material_id,
					amount,
				});
				self.counters.total_drop_picked_up += 1;
			}
		}
	}

	fn lifetime_phase(&mut self) {
		let expired: Vec<Entity> = self
			.world
			.query_mut::<&mut Lifetime>()
			.into_iter()
			.filter_map(|(entity, lifetime)| {
				lifetime.ticks_remaining = lifetime.ticks_remaining.saturating_sub(1);
				(lifetime.ticks_remaining == 0).then_some(entity)
			})
			.collect();

		for entity in expired {
			let is_projectile = self.world.get::<&Projectile>(entity).is_ok();
			let _ = self.world.despawn(entity);
			if is_projectile {
				self.counters.total_projectile_recycled += 1;
			}
		}
	}

	pub fn consume_combat_events(&mut self) -> Vec<CombatEvent> {
		std::mem::take(&mut self.combat_events)
	}

	pub fn consume_gameplay_events(&mut self) -> Vec<GameplayEvent> {
		std::mem::take(&mut self.gameplay_events)
	}

	pub fn diagnostics_snapshot(&self) -> RuntimeDiagnostics {
		RuntimeDiagnostics {
			active_projectile_count: self.world.query::<&Projectile>().iter().count() as u64,
			active_hostile_count: self.world.query::<&HostileTarget>().iter().count() as u64,
			active_drop_count: self.world.query::<&Drop>().iter().count() as u64,
			..self.counters
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tick_context() -> TickContext {
		TickContext { tick_index: 0, fixed_delta_seconds: 1.0 / 60.0 }
	}

	#[test]
	fn projectile_kills_training_hostile_on_overlap() {
		let mut runtime = EcsRuntime::new();
		runtime.queue_projectile_spawn(ProjectileSpawnRequest {
			x: 7.0,
			y: -4.0,
			vx: 30.0,
			vy: 0.0,
			radius: 0.1,
			faction_id: 1,
			ticks_remaining: 600,
			damage: 25,
		});

		let mut defeated = false;
		for _ in 0..60 {
			runtime.tick(&tick_context());
			if runtime.consume_combat_events().iter().any(|e| matches!(e, CombatEvent::HostileDefeated { .. })) {
				defeated = true;
				break;
			}
		}
		assert!(defeated);
		assert_eq!(runtime.diagnostics_snapshot().total_hostile_defeated, 1);
	}

	#[test]
	fn pickup_probe_resolves_drop_at_tile() {
		let mut runtime = EcsRuntime::new();
		runtime.queue_drop_spawn(DropSpawnRequest { tile_x: 3, tile_y: 5, material_id: 5, amount: 2 });
		runtime.tick(&tick_context());

		runtime.queue_pickup_probe(PickupProbeRequest { player_id: 1, tile_x: 3, tile_y: 5 });
		runtime.tick(&tick_context());

		let events = runtime.consume_gameplay_events();
		assert_eq!(events.len(), 1);
		assert!(matches!(
			events[0],
			GameplayEvent::PickupResolved { player_id: 1, tile_x: 3, tile_y: 5, material_id: 5, amount: 2 }
		));
	}

	#[test]
	fn merged_drop_spawn_adds_amounts() {
		let mut runtime = EcsRuntime::new();
		runtime.queue_drop_spawn(DropSpawnRequest { tile_x: 1, tile_y: 1, material_id: 2, amount: 3 });
		runtime.tick(&tick_context());
		runtime.queue_drop_spawn(DropSpawnRequest { tile_x: 1, tile_y: 1, material_id: 2, amount: 4 });
		runtime.tick(&tick_context());

		assert_eq!(runtime.diagnostics_snapshot().active_drop_count, 1);
	}
}
