use std::collections::HashSet;

use log::{debug, info, warn};
use rand::rngs::SmallRng;

use super::config::MapConfig;
use super::error::MapError;
use super::layers::{Drawable, LayerKind, LayerManager, MapEngine, PathStyle};
use super::motion::MotionController;
use super::popup::{self, Popup};
use super::route_cache::RouteCache;
use super::types::{LatLng, Node, NodeCategory, Route, RouteStatus, Selection, validate_network};

/// Everything one mounted map surface owns: the engine and its layers, the
/// motion controller, the resolved geometry and the current props.
///
/// Async geometry results and animation frames carry the generation they were
/// issued under and are dropped once it is outdated. [`MapSession::teardown`]
/// outdates both for good.
pub struct MapSession<E: MapEngine> {
	layers: LayerManager<E>,
	motion: MotionController,
	config: MapConfig,
	initial_view: (LatLng, f64),
	nodes: Vec<Node>,
	routes: Vec<Route>,
	selected: Option<Selection>,
	cache: RouteCache,
	network_generation: u64,
	animating: bool,
	disposed: bool,
}

impl<E: MapEngine> MapSession<E> {
	pub fn mount(engine: E, config: MapConfig, center: LatLng, zoom: f64, rng: SmallRng) -> Self {
		let mut layers = LayerManager::new(engine);
		let zoom = config.clamp_zoom(zoom);
		layers.engine_mut().set_view(center, zoom);
		layers.add_to_layer(
			LayerKind::Tiles,
			Drawable::Basemap {
				url_template: config.tile_url.clone(),
				subdomains: config.tile_subdomains.clone(),
			},
		);
		info!("Map mounted at ({}, {}) zoom {zoom}", center.lat, center.lng);

		Self {
			layers,
			motion: MotionController::new(rng, config.speed_per_ms, config.seed_fraction),
			config,
			initial_view: (center, zoom),
			nodes: Vec::new(),
			routes: Vec::new(),
			selected: None,
			cache: RouteCache::default(),
			network_generation: 0,
			animating: false,
			disposed: false,
		}
	}

	pub fn config(&self) -> &MapConfig {
		&self.config
	}

	pub fn engine(&self) -> &E {
		self.layers.engine()
	}

	pub fn engine_mut(&mut self) -> &mut E {
		self.layers.engine_mut()
	}

	#[cfg(test)]
	pub fn route_cache(&self) -> &RouteCache {
		&self.cache
	}

	/// Generation the running animation expects frames for.
	pub fn motion_generation(&self) -> Option<u64> {
		self.motion.is_running().then(|| self.motion.generation())
	}

	/// Replaces nodes and routes. Drops the current geometry, redraws the
	/// static layers and returns the generation the rebuilt cache must carry.
	pub fn set_network(&mut self, nodes: Vec<Node>, routes: Vec<Route>) -> u64 {
		if let Err(err) = validate_network(&nodes, &routes) {
			warn!("Inconsistent network: {err}");
		}
		self.network_generation += 1;
		if self.disposed {
			return self.network_generation;
		}
		self.nodes = nodes;
		self.routes = routes;
		self.cache = RouteCache::default();
		self.redraw_static();
		if self.animating {
			self.motion.start(&self.routes, &self.cache, &mut self.layers);
		}
		self.network_generation
	}

	/// Info card for a clicked node or route.
	pub fn popup(&self, selection: &Selection) -> Option<Popup> {
		if self.disposed {
			return None;
		}
		popup::describe(selection, &self.nodes, &self.routes)
	}

	/// Installs geometry resolved for `generation`. Results for an older network
	/// or a torn-down surface are rejected without touching the map.
	pub fn apply_route_cache(&mut self, generation: u64, cache: RouteCache) -> Result<(), MapError> {
		if self.disposed || generation != self.network_generation {
			return Err(MapError::StaleCallback(generation));
		}
		self.cache = cache;
		self.redraw_static();
		if self.animating {
			self.motion.start(&self.routes, &self.cache, &mut self.layers);
		}
		Ok(())
	}

	/// Restyles the static layers. Geometry is left as is.
	pub fn set_selected(&mut self, selected: Option<Selection>) {
		if self.disposed || self.selected == selected {
			return;
		}
		self.selected = selected;
		self.redraw_static();
	}

	/// Starts or stops the glyphs. Returns the frame generation when started.
	pub fn set_animation(&mut self, enabled: bool) -> Option<u64> {
		if self.disposed {
			return None;
		}
		self.animating = enabled;
		if enabled {
			Some(self.motion.start(&self.routes, &self.cache, &mut self.layers))
		} else {
			self.motion.stop(&mut self.layers);
			None
		}
	}

	pub fn frame(&mut self, generation: u64, now_ms: f64) -> Result<usize, MapError> {
		if self.disposed {
			return Err(MapError::StaleCallback(generation));
		}
		self.motion.tick(generation, now_ms, &mut self.layers)
	}

	pub fn reset_view(&mut self) {
		if self.disposed {
			return;
		}
		let (center, zoom) = self.initial_view;
		self.layers.engine_mut().set_view(center, zoom);
	}

	pub fn invalidate_size(&mut self, width: f64, height: f64) {
		if self.disposed {
			return;
		}
		self.layers.engine_mut().invalidate_size(width, height);
	}

	/// Stops motion, clears every layer, disposes the engine and outdates all
	/// outstanding work. Safe to call more than once.
	pub fn teardown(&mut self) {
		if self.disposed {
			return;
		}
		self.motion.stop(&mut self.layers);
		self.layers.clear_all();
		self.layers.engine_mut().dispose();
		self.network_generation += 1;
		self.animating = false;
		self.disposed = true;
		info!("Map unmounted");
	}

	fn highlighted_nodes(&self) -> HashSet<&str> {
		match &self.selected {
			Some(Selection::Route(id)) => self
				.routes
				.iter()
				.filter(|r| &r.id == id)
				.flat_map(|r| r.stops.iter().map(String::as_str))
				.collect(),
			Some(Selection::Node(id)) => HashSet::from([id.as_str()]),
			None => HashSet::new(),
		}
	}

	fn redraw_static(&mut self) {
		self.layers.clear_layer(LayerKind::Paths);
		self.layers.clear_layer(LayerKind::Markers);

		let style = self.config.route_style;
		let mut paths = Vec::new();
		for route in &self.routes {
			let Some(points) = self.cache.get(&route.id) else {
				continue;
			};
			let selected = self.selected == Some(Selection::Route(route.id.clone()));
			let dashed = style.dash_inactive && route.status != RouteStatus::Active;
			paths.push(Drawable::Path {
				route_id: route.id.clone(),
				points: points.clone(),
				style: PathStyle {
					color: route.color.clone(),
					weight: if selected {
						style.glow_weight_selected
					} else {
						style.glow_weight
					},
					opacity: style.glow_opacity,
					dashed: false,
				},
				clickable: false,
			});
			paths.push(Drawable::Path {
				route_id: route.id.clone(),
				points: points.clone(),
				style: PathStyle {
					color: route.color.clone(),
					weight: if selected {
						style.line_weight_selected
					} else {
						style.line_weight
					},
					opacity: if selected {
						style.line_opacity_selected
					} else {
						style.line_opacity
					},
					dashed,
				},
				clickable: true,
			});
		}

		let highlighted = self.highlighted_nodes();
		let mut customer_number = 0;
		let mut markers: Vec<(bool, bool, Drawable)> = self
			.nodes
			.iter()
			.map(|node| {
				let label = if self.config.number_customers && node.category == NodeCategory::Customer
				{
					customer_number += 1;
					customer_number.to_string()
				} else {
					node.category.emoji().to_string()
				};
				let lit = highlighted.contains(node.id.as_str());
				(
					lit,
					node.category == NodeCategory::Warehouse,
					Drawable::Marker {
						node_id: node.id.clone(),
						position: node.position,
						category: node.category,
						label,
						highlighted: lit,
					},
				)
			})
			.collect();
		// Later markers paint on top.
		markers.sort_by_key(|(lit, warehouse, _)| (*lit, *warehouse));

		for path in paths {
			self.layers.add_to_layer(LayerKind::Paths, path);
		}
		for (_, _, marker) in markers {
			self.layers.add_to_layer(LayerKind::Markers, marker);
		}
		debug!(
			"Static layers redrawn: {} path(s), {} marker(s)",
			self.layers.len(LayerKind::Paths),
			self.layers.len(LayerKind::Markers)
		);
	}
}

#[cfg(test)]
mod tests {
	use futures::executor::block_on;
	use rand::SeedableRng;

	use super::*;
	use crate::components::map_surface::geometry::StraightLineFetcher;
	use crate::components::map_surface::layers::spy::{EngineCall, SpyEngine};
	use crate::components::map_surface::scene::MapScene;

	const CENTER: LatLng = LatLng::new(49.1427, 9.2109);

	fn node(id: &str, lat: f64, lng: f64, category: NodeCategory) -> Node {
		Node {
			id: id.into(),
			name: id.into(),
			position: LatLng::new(lat, lng),
			category,
			demand: None,
			inventory: None,
		}
	}

	fn network() -> (Vec<Node>, Vec<Route>) {
		let nodes = vec![
			node("1", 49.1427, 9.2109, NodeCategory::Warehouse),
			node("2", 49.1912, 9.2272, NodeCategory::Customer),
			node("3", 49.0743, 9.3056, NodeCategory::Customer),
			node("4", 49.2350, 9.1019, NodeCategory::Customer),
		];
		let route = |id: &str, stops: &[&str]| Route {
			id: id.into(),
			label: format!("Truck {id}"),
			color: "#3b82f6".into(),
			stops: stops.iter().map(|s| s.to_string()).collect(),
			status: RouteStatus::Active,
			distance_km: Some(12.0),
			duration: None,
			load: Some(100),
			animate: true,
		};
		let routes = vec![route("A", &["1", "2", "1"]), route("B", &["1", "3", "1"])];
		(nodes, routes)
	}

	fn resolve(nodes: &[Node], routes: &[Route]) -> RouteCache {
		block_on(RouteCache::build(&StraightLineFetcher, nodes, routes, Default::default()))
	}

	fn mount<E: MapEngine>(engine: E) -> MapSession<E> {
		MapSession::mount(engine, MapConfig::fleet(), CENTER, 11.0, SmallRng::seed_from_u64(5))
	}

	fn scene_session() -> MapSession<MapScene> {
		mount(MapScene::new(CENTER, 11.0, 800.0, 420.0))
	}

	#[test]
	fn mount_sets_view_and_basemap() {
		let spy = SpyEngine::default();
		let _session = mount(spy.clone());
		let calls = spy.calls.borrow();
		assert_eq!(calls[0], EngineCall::SetView(CENTER, 11.0));
		assert!(matches!(calls[1], EngineCall::Insert(LayerKind::Tiles, _)));
	}

	#[test]
	fn geometry_resolved_after_unmount_never_reaches_the_map() {
		let spy = SpyEngine::default();
		let mut session = mount(spy.clone());
		let (nodes, routes) = network();
		let generation = session.set_network(nodes.clone(), routes.clone());
		session.set_animation(true);

		let fetcher = StraightLineFetcher;
		let pending = RouteCache::build(&fetcher, &nodes, &routes, Default::default());
		session.teardown();
		let writes_at_unmount = spy.count();
		assert_eq!(spy.calls.borrow().last(), Some(&EngineCall::Dispose));

		let cache = block_on(pending);
		assert_eq!(cache.len(), 2);
		assert_eq!(
			session.apply_route_cache(generation, cache),
			Err(MapError::StaleCallback(generation))
		);
		assert!(session.frame(1, 16.0).is_err());
		session.set_selected(Some(Selection::Route("A".into())));
		session.set_animation(true);
		session.reset_view();
		session.invalidate_size(100.0, 100.0);
		session.teardown();
		assert_eq!(spy.count(), writes_at_unmount);
	}

	#[test]
	fn cache_for_a_replaced_network_is_stale() {
		let mut session = scene_session();
		let (nodes, routes) = network();
		let old = session.set_network(nodes.clone(), routes.clone());
		let old_cache = resolve(&nodes, &routes);
		let current = session.set_network(nodes.clone(), routes[..1].to_vec());

		assert!(session.apply_route_cache(old, old_cache).is_err());
		assert!(session.route_cache().is_empty());

		let cache = resolve(&nodes, &routes[..1]);
		session.apply_route_cache(current, cache).unwrap();
		assert_eq!(session.engine().drawables(LayerKind::Paths).count(), 2);
	}

	#[test]
	fn selection_restyles_without_losing_geometry() {
		let mut session = scene_session();
		let (nodes, routes) = network();
		let generation = session.set_network(nodes.clone(), routes.clone());
		session.apply_route_cache(generation, resolve(&nodes, &routes)).unwrap();

		session.set_selected(Some(Selection::Route("B".into())));
		assert_eq!(session.route_cache().len(), 2);

		let scene = session.engine();
		let lit: Vec<&str> = scene
			.drawables(LayerKind::Markers)
			.filter_map(|d| match d {
				Drawable::Marker { node_id, highlighted: true, .. } => Some(node_id.as_str()),
				_ => None,
			})
			.collect();
		assert_eq!(lit.len(), 2);
		assert!(lit.contains(&"1") && lit.contains(&"3"));

		let heavy: Vec<&str> = scene
			.drawables(LayerKind::Paths)
			.filter_map(|d| match d {
				Drawable::Path { route_id, style, clickable: true, .. } if style.weight == 5.0 => {
					Some(route_id.as_str())
				}
				_ => None,
			})
			.collect();
		assert_eq!(heavy, vec!["B"]);
	}

	#[test]
	fn customers_are_numbered_in_order_and_warehouse_paints_last() {
		let mut session = scene_session();
		let (nodes, routes) = network();
		session.set_network(nodes, routes);

		let labels: Vec<(String, String)> = session
			.engine()
			.drawables(LayerKind::Markers)
			.filter_map(|d| match d {
				Drawable::Marker { node_id, label, .. } => Some((node_id.clone(), label.clone())),
				_ => None,
			})
			.collect();
		assert_eq!(
			labels,
			vec![
				("2".to_string(), "1".to_string()),
				("3".to_string(), "2".to_string()),
				("4".to_string(), "3".to_string()),
				("1".to_string(), "🏭".to_string()),
			]
		);
	}

	#[test]
	fn animation_toggles_seed_and_clear_glyphs() {
		let mut session = scene_session();
		let (nodes, routes) = network();
		let generation = session.set_network(nodes.clone(), routes.clone());

		let early = session.set_animation(true).unwrap();
		assert_eq!(session.engine().drawables(LayerKind::Glyphs).count(), 0);

		session.apply_route_cache(generation, resolve(&nodes, &routes)).unwrap();
		assert_eq!(session.engine().drawables(LayerKind::Glyphs).count(), 2);
		let running = session.motion_generation().unwrap();
		assert_ne!(early, running, "geometry arrival reseeds");
		assert_eq!(session.frame(running, 0.0), Ok(2));

		session.set_animation(false);
		assert_eq!(session.motion_generation(), None);
		assert_eq!(session.engine().drawables(LayerKind::Glyphs).count(), 0);
		assert_eq!(session.engine().drawables(LayerKind::Paths).count(), 4);
		assert!(session.frame(running, 16.0).is_err());
	}

	#[test]
	fn reset_view_restores_initial_center_and_zoom() {
		let mut session = scene_session();
		session.engine_mut().viewport.pan_by(120.0, 40.0);
		session.engine_mut().viewport.zoom = 14.0;
		session.reset_view();
		assert_eq!(session.engine().viewport.center, CENTER);
		assert_eq!(session.engine().viewport.zoom, 11.0);
	}

	#[test]
	fn flow_preset_styles_and_dashes_inactive_routes() {
		let mut session = MapSession::mount(
			MapScene::new(CENTER, 7.0, 800.0, 420.0),
			MapConfig::supply_chain(),
			CENTER,
			7.0,
			SmallRng::seed_from_u64(5),
		);
		let (nodes, _) = network();
		let routes = vec![
			Route::flow("1", "2", 450, RouteStatus::Active),
			Route::flow("3", "1", 320, RouteStatus::Delayed),
		];
		let generation = session.set_network(nodes.clone(), routes.clone());
		session.apply_route_cache(generation, resolve(&nodes, &routes)).unwrap();

		let styles: Vec<(bool, PathStyle)> = session
			.engine()
			.drawables(LayerKind::Paths)
			.filter_map(|d| match d {
				Drawable::Path { style, clickable, .. } => Some((*clickable, style.clone())),
				_ => None,
			})
			.collect();
		let weights: Vec<(bool, f64, f64, bool)> = styles
			.iter()
			.map(|(clickable, s)| (*clickable, s.weight, s.opacity, s.dashed))
			.collect();
		assert_eq!(
			weights,
			vec![
				(false, 10.0, 0.2, false),
				(true, 4.0, 0.8, false),
				(false, 10.0, 0.2, false),
				(true, 4.0, 0.8, true),
			]
		);
	}

	#[test]
	fn popups_describe_the_current_network_until_unmount() {
		let mut session = scene_session();
		let (nodes, routes) = network();
		session.set_network(nodes, routes);

		let card = session.popup(&Selection::Route("A".into())).unwrap();
		assert_eq!(card.title, "A");
		assert_eq!(card.rows[0], ("Vehicle", "Truck A".to_string()));
		assert!(session.popup(&Selection::Node("2".into())).is_some());
		assert!(session.popup(&Selection::Node("missing".into())).is_none());

		session.teardown();
		assert!(session.popup(&Selection::Route("A".into())).is_none());
	}
}
