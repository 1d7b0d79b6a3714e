use std::collections::BTreeMap;

use log::debug;

use super::layers::{Drawable, DrawableId, LayerKind, MapEngine};
use super::projection::Viewport;
use super::types::{LatLng, Selection};

pub const MARKER_SIZE: f64 = 36.0;
pub const MARKER_SIZE_HIGHLIGHTED: f64 = 44.0;
pub const GLYPH_SIZE: f64 = 34.0;
const PATH_HIT_SLOP: f64 = 4.0;

/// Retained-mode map: every layer's drawables plus the current viewport.
/// The canvas renderer paints it; pointer input queries it.
pub struct MapScene {
	pub viewport: Viewport,
	layers: BTreeMap<LayerKind, Vec<(DrawableId, Drawable)>>,
	disposed: bool,
}

impl MapScene {
	pub fn new(center: LatLng, zoom: f64, width: f64, height: f64) -> Self {
		Self {
			viewport: Viewport::new(center, zoom, width, height),
			layers: LayerKind::ALL.iter().map(|&l| (l, Vec::new())).collect(),
			disposed: false,
		}
	}

	/// Drawables of `layer` in insertion order.
	pub fn drawables(&self, layer: LayerKind) -> impl Iterator<Item = &Drawable> {
		self.layers
			.get(&layer)
			.into_iter()
			.flat_map(|items| items.iter().map(|(_, d)| d))
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed
	}

	/// Topmost selectable drawable under the screen point. Markers are above
	/// paths, so they win.
	pub fn hit_test(&self, sx: f64, sy: f64) -> Option<Selection> {
		let vp = &self.viewport;
		let marker = self
			.drawables(LayerKind::Markers)
			.filter_map(|d| match d {
				Drawable::Marker {
					node_id,
					position,
					highlighted,
					..
				} => {
					let (mx, my) = vp.to_screen(*position);
					let half = if *highlighted {
						MARKER_SIZE_HIGHLIGHTED
					} else {
						MARKER_SIZE
					} / 2.0;
					((sx - mx).abs() <= half && (sy - my).abs() <= half).then(|| node_id.clone())
				}
				_ => None,
			})
			.last();
		if let Some(node_id) = marker {
			return Some(Selection::Node(node_id));
		}

		self.drawables(LayerKind::Paths)
			.filter_map(|d| match d {
				Drawable::Path {
					route_id,
					points,
					style,
					clickable: true,
				} => {
					let tolerance = style.weight / 2.0 + PATH_HIT_SLOP;
					let hit = points.windows(2).any(|seg| {
						let a = vp.to_screen(seg[0]);
						let b = vp.to_screen(seg[1]);
						distance_to_segment((sx, sy), a, b) <= tolerance
					});
					hit.then(|| route_id.clone())
				}
				_ => None,
			})
			.last()
			.map(Selection::Route)
	}
}

impl MapEngine for MapScene {
	fn insert(&mut self, layer: LayerKind, id: DrawableId, drawable: Drawable) {
		if self.disposed {
			return;
		}
		self.layers.entry(layer).or_default().push((id, drawable));
	}

	fn clear(&mut self, layer: LayerKind) {
		if let Some(items) = self.layers.get_mut(&layer) {
			items.clear();
		}
	}

	fn move_glyph(&mut self, id: DrawableId, to: LatLng) {
		let Some(items) = self.layers.get_mut(&LayerKind::Glyphs) else {
			return;
		};
		if let Some((_, Drawable::Glyph { position, .. })) =
			items.iter_mut().find(|(gid, _)| *gid == id)
		{
			*position = to;
		}
	}

	fn set_view(&mut self, center: LatLng, zoom: f64) {
		self.viewport.center = center;
		self.viewport.zoom = zoom;
	}

	fn invalidate_size(&mut self, width: f64, height: f64) {
		self.viewport.resize(width, height);
	}

	fn dispose(&mut self) {
		debug!("Disposing map scene");
		for items in self.layers.values_mut() {
			items.clear();
		}
		self.disposed = true;
	}
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
	let (dx, dy) = (b.0 - a.0, b.1 - a.1);
	let len_sq = dx * dx + dy * dy;
	let t = if len_sq < f64::EPSILON {
		0.0
	} else {
		(((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
	};
	let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
	((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
