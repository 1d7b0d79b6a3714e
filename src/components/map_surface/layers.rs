use std::collections::BTreeMap;
use std::rc::Rc;

use super::types::{LatLng, NodeCategory, NodeId, RouteId};

/// Draw layers in z-order, bottom first. The order is fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
	Tiles,
	Paths,
	Glyphs,
	Markers,
}

impl LayerKind {
	pub const ALL: [LayerKind; 4] = [
		LayerKind::Tiles,
		LayerKind::Paths,
		LayerKind::Glyphs,
		LayerKind::Markers,
	];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub struct PathStyle {
	pub color: String,
	pub weight: f64,
	pub opacity: f64,
	pub dashed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Drawable {
	/// Raster basemap addressed by `{s}/{z}/{x}/{y}` templates.
	Basemap {
		url_template: String,
		subdomains: Vec<char>,
	},
	/// A route line. Only the route's main line is clickable, its glow is not.
	Path {
		route_id: RouteId,
		points: Rc<[LatLng]>,
		style: PathStyle,
		clickable: bool,
	},
	Marker {
		node_id: NodeId,
		position: LatLng,
		category: NodeCategory,
		label: String,
		highlighted: bool,
	},
	Glyph {
		route_id: RouteId,
		position: LatLng,
		color: String,
	},
}

/// The map engine instance a surface draws into.
pub trait MapEngine {
	fn insert(&mut self, layer: LayerKind, id: DrawableId, drawable: Drawable);
	fn clear(&mut self, layer: LayerKind);
	/// Repositions an existing glyph in place.
	fn move_glyph(&mut self, id: DrawableId, position: LatLng);
	fn set_view(&mut self, center: LatLng, zoom: f64);
	fn invalidate_size(&mut self, width: f64, height: f64);
	fn dispose(&mut self);
}

/// Owns the engine and tracks which drawables live on which layer, so one
/// layer can be cleared and refilled without touching the others.
pub struct LayerManager<E: MapEngine> {
	engine: E,
	contents: BTreeMap<LayerKind, Vec<DrawableId>>,
	next_id: u64,
}

impl<E: MapEngine> LayerManager<E> {
	pub fn new(engine: E) -> Self {
		Self {
			engine,
			contents: LayerKind::ALL.iter().map(|&l| (l, Vec::new())).collect(),
			next_id: 0,
		}
	}

	pub fn add_to_layer(&mut self, layer: LayerKind, drawable: Drawable) -> DrawableId {
		self.next_id += 1;
		let id = DrawableId(self.next_id);
		self.engine.insert(layer, id, drawable);
		self.contents.entry(layer).or_default().push(id);
		id
	}

	pub fn clear_layer(&mut self, layer: LayerKind) {
		let ids = self.contents.entry(layer).or_default();
		if ids.is_empty() {
			return;
		}
		ids.clear();
		self.engine.clear(layer);
	}

	pub fn clear_all(&mut self) {
		for layer in LayerKind::ALL {
			self.clear_layer(layer);
		}
	}

	/// Returns false if `id` is not a live glyph.
	pub fn move_glyph(&mut self, id: DrawableId, position: LatLng) -> bool {
		let live = self
			.contents
			.get(&LayerKind::Glyphs)
			.is_some_and(|ids| ids.contains(&id));
		if live {
			self.engine.move_glyph(id, position);
		}
		live
	}

	pub fn len(&self, layer: LayerKind) -> usize {
		self.contents.get(&layer).map_or(0, Vec::len)
	}

	pub fn engine(&self) -> &E {
		&self.engine
	}

	pub fn engine_mut(&mut self) -> &mut E {
		&mut self.engine
	}
}
