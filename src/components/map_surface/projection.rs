//! Spherical Web-Mercator projection, the same tiling scheme the basemap uses.

use std::f64::consts::PI;

use super::types::LatLng;

pub const TILE_SIZE: f64 = 256.0;
const MAX_SIN_LAT: f64 = 0.9999;

/// A basemap tile address plus where it lands on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilePlacement {
	pub z: u32,
	pub x: u32,
	pub y: u32,
	pub screen_x: f64,
	pub screen_y: f64,
	pub size: f64,
}

/// World pixel coordinates of `p` at `zoom`.
pub fn project(p: LatLng, zoom: f64) -> (f64, f64) {
	let scale = TILE_SIZE * 2f64.powf(zoom);
	let sin = p.lat.to_radians().sin().clamp(-MAX_SIN_LAT, MAX_SIN_LAT);
	let x = (p.lng + 180.0) / 360.0 * scale;
	let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)) * scale;
	(x, y)
}

pub fn unproject(x: f64, y: f64, zoom: f64) -> LatLng {
	let scale = TILE_SIZE * 2f64.powf(zoom);
	let lng = x / scale * 360.0 - 180.0;
	let n = PI - 2.0 * PI * y / scale;
	let lat = n.sinh().atan().to_degrees();
	LatLng::new(lat, lng)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
	pub center: LatLng,
	pub zoom: f64,
	pub width: f64,
	pub height: f64,
}

impl Viewport {
	pub fn new(center: LatLng, zoom: f64, width: f64, height: f64) -> Self {
		Self {
			center,
			zoom,
			width,
			height,
		}
	}

	pub fn to_screen(&self, p: LatLng) -> (f64, f64) {
		let (px, py) = project(p, self.zoom);
		let (cx, cy) = project(self.center, self.zoom);
		(px - cx + self.width / 2.0, py - cy + self.height / 2.0)
	}

	pub fn to_latlng(&self, sx: f64, sy: f64) -> LatLng {
		let (cx, cy) = project(self.center, self.zoom);
		unproject(
			cx + sx - self.width / 2.0,
			cy + sy - self.height / 2.0,
			self.zoom,
		)
	}

	/// Moves the map content by a screen delta, as a drag does.
	pub fn pan_by(&mut self, dx: f64, dy: f64) {
		let (cx, cy) = project(self.center, self.zoom);
		self.center = unproject(cx - dx, cy - dy, self.zoom);
	}

	/// Changes zoom keeping the geographic point under `(sx, sy)` fixed.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, zoom: f64) {
		let anchor = self.to_latlng(sx, sy);
		self.zoom = zoom;
		let (ax, ay) = self.to_screen(anchor);
		self.pan_by(sx - ax, sy - ay);
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	/// Tiles covering the viewport at the integer zoom below the current one,
	/// scaled up for fractional zoom.
	pub fn visible_tiles(&self) -> Vec<TilePlacement> {
		let z = self.zoom.floor().max(0.0);
		let size = TILE_SIZE * 2f64.powf(self.zoom - z);
		let count = 2f64.powf(z);
		let (cx, cy) = project(self.center, self.zoom);
		let (left, top) = (cx - self.width / 2.0, cy - self.height / 2.0);

		let x0 = (left / size).floor().max(0.0);
		let y0 = (top / size).floor().max(0.0);
		let x1 = ((left + self.width) / size).floor().min(count - 1.0);
		let y1 = ((top + self.height) / size).floor().min(count - 1.0);

		let mut tiles = Vec::new();
		let mut y = y0;
		while y <= y1 {
			let mut x = x0;
			while x <= x1 {
				tiles.push(TilePlacement {
					z: z as u32,
					x: x as u32,
					y: y as u32,
					screen_x: x * size - left,
					screen_y: y * size - top,
					size,
				});
				x += 1.0;
			}
			y += 1.0;
		}
		tiles
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn close(a: LatLng, b: LatLng) -> bool {
		(a.lat - b.lat).abs() < 1e-9 && (a.lng - b.lng).abs() < 1e-9
	}

	#[test]
	fn origin_projects_to_world_center() {
		let (x, y) = project(LatLng::new(0.0, 0.0), 0.0);
		assert!((x - 128.0).abs() < 1e-9);
		assert!((y - 128.0).abs() < 1e-9);
	}

	#[test]
	fn center_maps_to_middle_of_screen_and_back() {
		let vp = Viewport::new(LatLng::new(49.1427, 9.2109), 11.0, 800.0, 420.0);
		let (sx, sy) = vp.to_screen(vp.center);
		assert!((sx - 400.0).abs() < 1e-6 && (sy - 210.0).abs() < 1e-6);

		let p = LatLng::new(49.1912, 9.2272);
		let (sx, sy) = vp.to_screen(p);
		assert!(close(vp.to_latlng(sx, sy), p));
	}

	#[test]
	fn zoom_at_keeps_anchor_under_cursor() {
		let mut vp = Viewport::new(LatLng::new(49.2, 9.5), 7.0, 640.0, 480.0);
		let anchor = vp.to_latlng(100.0, 50.0);
		vp.zoom_at(100.0, 50.0, 8.0);
		let (sx, sy) = vp.to_screen(anchor);
		assert!((sx - 100.0).abs() < 1e-6 && (sy - 50.0).abs() < 1e-6);
	}

	#[test]
	fn panning_moves_content_with_the_pointer() {
		let mut vp = Viewport::new(LatLng::new(49.2, 9.5), 7.0, 640.0, 480.0);
		let p = vp.to_latlng(320.0, 240.0);
		vp.pan_by(30.0, -20.0);
		let (sx, sy) = vp.to_screen(p);
		assert!((sx - 350.0).abs() < 1e-6 && (sy - 220.0).abs() < 1e-6);
	}

	#[test]
	fn visible_tiles_cover_the_viewport() {
		let vp = Viewport::new(LatLng::new(0.0, 0.0), 1.0, 512.0, 512.0);
		let tiles = vp.visible_tiles();
		assert_eq!(tiles.len(), 4);
		assert!(tiles.iter().all(|t| t.z == 1 && t.size == 256.0));
		assert!(tiles.iter().any(|t| t.x == 0 && t.y == 0 && t.screen_x == 0.0));
	}
}
