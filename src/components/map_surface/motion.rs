use std::rc::Rc;

use log::debug;
use rand::Rng;
use rand::rngs::SmallRng;

use super::error::MapError;
use super::layers::{Drawable, DrawableId, LayerKind, LayerManager, MapEngine};
use super::route_cache::RouteCache;
use super::types::{LatLng, Route};

/// Measures time between display frames. The first frame after a reset
/// reports zero so a restart never jumps.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameClock {
	last: Option<f64>,
}

impl FrameClock {
	pub fn delta(&mut self, now_ms: f64) -> f64 {
		let elapsed = self.last.map_or(0.0, |last| (now_ms - last).max(0.0));
		self.last = Some(now_ms);
		elapsed
	}

	pub fn reset(&mut self) {
		self.last = None;
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlyphPhase {
	/// Placed at its random start, not yet advanced.
	Seeded,
	Advancing,
}

/// One moving vehicle. `position` indexes fractionally into `path`.
#[derive(Clone, Debug)]
pub struct GlyphState {
	pub position: f64,
	pub marker: DrawableId,
	pub path: Rc<[LatLng]>,
	pub phase: GlyphPhase,
}

/// Advances a fractional path index and wraps to the start once it reaches
/// the last point.
pub fn advance(position: f64, elapsed_ms: f64, speed_per_ms: f64, path_len: usize) -> f64 {
	let next = position + elapsed_ms * speed_per_ms;
	if next >= path_len.saturating_sub(1) as f64 {
		0.0
	} else {
		next
	}
}

/// Point at fractional index `position`: linear between `path[i]` and
/// `path[i + 1]`, clamped to the last point.
pub fn interpolate(path: &[LatLng], position: f64) -> Option<LatLng> {
	let last = path.len().checked_sub(1)?;
	let position = position.max(0.0);
	let i = (position.floor() as usize).min(last);
	let next = (i + 1).min(last);
	let t = (position - i as f64).clamp(0.0, 1.0);
	Some(path[i].lerp(path[next], t))
}

/// Drives every glyph along its resolved path, one call per display frame.
///
/// Each start bumps the generation; a tick carrying an older generation is
/// stale and writes nothing.
pub struct MotionController {
	rng: SmallRng,
	speed_per_ms: f64,
	seed_fraction: f64,
	glyphs: Vec<GlyphState>,
	generation: u64,
	running: bool,
	clock: FrameClock,
}

impl MotionController {
	pub fn new(rng: SmallRng, speed_per_ms: f64, seed_fraction: f64) -> Self {
		Self {
			rng,
			speed_per_ms,
			seed_fraction,
			glyphs: Vec::new(),
			generation: 0,
			running: false,
			clock: FrameClock::default(),
		}
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	#[cfg(test)]
	pub fn glyphs(&self) -> &[GlyphState] {
		&self.glyphs
	}

	/// Seeds one glyph per animated route with at least two resolved points,
	/// each at a random spot in the first `seed_fraction` of its path.
	/// Returns the generation frames must present.
	pub fn start<E: MapEngine>(
		&mut self,
		routes: &[Route],
		cache: &RouteCache,
		layers: &mut LayerManager<E>,
	) -> u64 {
		self.stop(layers);
		self.running = true;

		for route in routes.iter().filter(|r| r.animate) {
			let Some(path) = cache.get(&route.id) else {
				debug!("Route {}: no geometry, not animated", route.id);
				continue;
			};
			if path.len() < 2 {
				continue;
			}
			let position = self.rng.r#gen::<f64>() * path.len() as f64 * self.seed_fraction;
			let at = interpolate(path, position).unwrap_or(path[0]);
			let marker = layers.add_to_layer(
				LayerKind::Glyphs,
				Drawable::Glyph {
					route_id: route.id.clone(),
					position: at,
					color: route.color.clone(),
				},
			);
			self.glyphs.push(GlyphState {
				position,
				marker,
				path: Rc::clone(path),
				phase: GlyphPhase::Seeded,
			});
		}

		debug!(
			"Motion generation {} started with {} glyph(s)",
			self.generation,
			self.glyphs.len()
		);
		self.generation
	}

	/// Discards every glyph and clears the glyph layer. Outstanding frames
	/// become stale.
	pub fn stop<E: MapEngine>(&mut self, layers: &mut LayerManager<E>) {
		self.generation += 1;
		self.running = false;
		self.glyphs.clear();
		self.clock.reset();
		layers.clear_layer(LayerKind::Glyphs);
	}

	/// Advances all glyphs by the measured frame delta and moves their markers.
	pub fn tick<E: MapEngine>(
		&mut self,
		generation: u64,
		now_ms: f64,
		layers: &mut LayerManager<E>,
	) -> Result<usize, MapError> {
		if !self.running || generation != self.generation {
			return Err(MapError::StaleCallback(generation));
		}
		let elapsed = self.clock.delta(now_ms);
		for glyph in &mut self.glyphs {
			// A freshly seeded glyph is shown where it was seeded for one frame.
			let step = match glyph.phase {
				GlyphPhase::Seeded => 0.0,
				GlyphPhase::Advancing => elapsed,
			};
			glyph.position = advance(glyph.position, step, self.speed_per_ms, glyph.path.len());
			glyph.phase = GlyphPhase::Advancing;
			if let Some(at) = interpolate(&glyph.path, glyph.position) {
				layers.move_glyph(glyph.marker, at);
			}
		}
		Ok(self.glyphs.len())
	}
}

#[cfg(test)]
mod tests {
	use rand::SeedableRng;

	use super::*;
	use crate::components::map_surface::layers::spy::{EngineCall, SpyEngine};
	use crate::components::map_surface::scene::MapScene;
	use crate::components::map_surface::types::RouteStatus;

	fn route(id: &str, animate: bool) -> Route {
		Route {
			id: id.into(),
			label: id.into(),
			color: "#f97316".into(),
			stops: vec![],
			status: RouteStatus::Active,
			distance_km: None,
			duration: None,
			load: None,
			animate,
		}
	}

	fn straight(n: usize) -> Vec<LatLng> {
		(0..n).map(|i| LatLng::new(0.0, 2.0 * i as f64)).collect()
	}

	fn controller(seed: u64, speed: f64, fraction: f64) -> MotionController {
		MotionController::new(SmallRng::seed_from_u64(seed), speed, fraction)
	}

	#[test]
	fn interpolates_between_neighbouring_points() {
		let path = [
			LatLng::new(0.0, 0.0),
			LatLng::new(0.0, 2.0),
			LatLng::new(0.0, 4.0),
			LatLng::new(0.0, 6.0),
		];
		assert_eq!(interpolate(&path, 2.5), Some(LatLng::new(0.0, 5.0)));
		assert_eq!(interpolate(&path, 0.0), Some(path[0]));
		assert_eq!(interpolate(&path, 3.0), Some(path[3]));
		assert_eq!(interpolate(&path, 9.7), Some(path[3]));
		assert_eq!(interpolate(&path, -1.0), Some(path[0]));
		assert_eq!(interpolate(&[], 1.0), None);
	}

	#[test]
	fn advance_wraps_at_last_point() {
		assert_eq!(advance(0.0, 7.0, 0.5, 5), 3.5);
		assert_eq!(advance(0.0, 8.0, 0.5, 5), 0.0);
		assert_eq!(advance(3.9, 1.0, 0.5, 5), 0.0);
	}

	#[test]
	fn one_full_path_length_of_elapsed_time_returns_to_start() {
		let cache: RouteCache = [("Route A".to_string(), straight(5))].into_iter().collect();
		let mut layers = LayerManager::new(SpyEngine::default());
		let mut motion = controller(1, 0.5, 0.0);

		let generation = motion.start(&[route("Route A", true)], &cache, &mut layers);
		assert_eq!(motion.glyphs()[0].position, 0.0);

		motion.tick(generation, 1000.0, &mut layers).unwrap();
		assert_eq!(motion.glyphs()[0].position, 0.0, "first frame has no delta");
		motion.tick(generation, 1004.0, &mut layers).unwrap();
		assert_eq!(motion.glyphs()[0].position, 2.0);
		motion.tick(generation, 1008.0, &mut layers).unwrap();
		assert_eq!(motion.glyphs()[0].position, 0.0);
		assert_eq!(motion.glyphs()[0].phase, GlyphPhase::Advancing);
	}

	#[test]
	fn restart_reseeds_within_the_introductory_range() {
		let cache: RouteCache = [
			("Route A".to_string(), straight(10)),
			("Route B".to_string(), straight(20)),
		]
		.into_iter()
		.collect();
		let routes = [route("Route A", true), route("Route B", true)];
		let mut layers = LayerManager::new(SpyEngine::default());
		let mut motion = controller(42, 0.003, 0.3);

		let mut seen = Vec::new();
		for _ in 0..3 {
			motion.start(&routes, &cache, &mut layers);
			for glyph in motion.glyphs() {
				let limit = 0.3 * glyph.path.len() as f64;
				assert!((0.0..limit).contains(&glyph.position), "{} outside [0, {limit})", glyph.position);
				assert_eq!(glyph.phase, GlyphPhase::Seeded);
			}
			seen.push(motion.glyphs()[0].position);
			motion.stop(&mut layers);
			assert!(motion.glyphs().is_empty());
		}
		assert!(seen[0] != seen[1] || seen[1] != seen[2], "positions repeated: {seen:?}");
	}

	#[test]
	fn unresolved_short_and_static_routes_get_no_glyph() {
		let cache: RouteCache = [
			("moving".to_string(), straight(3)),
			("single".to_string(), straight(1)),
			("parked".to_string(), straight(4)),
		]
		.into_iter()
		.collect();
		let routes = [
			route("moving", true),
			route("single", true),
			route("parked", false),
			route("unresolved", true),
		];
		let mut layers = LayerManager::new(MapScene::new(LatLng::new(0.0, 0.0), 3.0, 800.0, 420.0));
		let mut motion = controller(3, 0.003, 0.3);

		motion.start(&routes, &cache, &mut layers);
		let ids: Vec<&str> = layers
			.engine()
			.drawables(LayerKind::Glyphs)
			.filter_map(|d| match d {
				Drawable::Glyph { route_id, .. } => Some(route_id.as_str()),
				_ => None,
			})
			.collect();
		assert_eq!(ids, vec!["moving"]);
		assert_eq!(motion.glyphs().len(), 1);
		assert_eq!(layers.len(LayerKind::Glyphs), 1);
	}

	#[test]
	fn ticks_from_an_old_generation_write_nothing() {
		let cache: RouteCache = [("Route A".to_string(), straight(5))].into_iter().collect();
		let spy = SpyEngine::default();
		let mut layers = LayerManager::new(spy.clone());
		let mut motion = controller(9, 0.003, 0.3);

		let old = motion.start(&[route("Route A", true)], &cache, &mut layers);
		motion.tick(old, 0.0, &mut layers).unwrap();
		motion.stop(&mut layers);

		let before = spy.count();
		assert_eq!(
			motion.tick(old, 16.0, &mut layers),
			Err(MapError::StaleCallback(old))
		);
		assert_eq!(spy.count(), before);

		let current = motion.start(&[route("Route A", true)], &cache, &mut layers);
		assert_ne!(old, current);
		assert!(motion.tick(old, 32.0, &mut layers).is_err());
		motion.tick(current, 32.0, &mut layers).unwrap();
		assert!(matches!(spy.calls.borrow().last(), Some(EngineCall::MoveGlyph(..))));
	}
}
