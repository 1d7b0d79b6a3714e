use std::collections::{HashMap, VecDeque};

use log::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use web_sys::HtmlImageElement;

const MAX_CACHED_TILES: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
	pub z: u32,
	pub x: u32,
	pub y: u32,
}

/// Fills a `{s}/{z}/{x}/{y}{r}` template. Subdomains rotate with the tile
/// position so neighbouring tiles load from different hosts.
pub fn tile_url(template: &str, subdomains: &[char], key: TileKey, retina: bool) -> String {
	let subdomain = if subdomains.is_empty() {
		String::new()
	} else {
		subdomains[(key.x as usize + key.y as usize) % subdomains.len()].to_string()
	};
	template
		.replace("{s}", &subdomain)
		.replace("{z}", &key.z.to_string())
		.replace("{x}", &key.x.to_string())
		.replace("{y}", &key.y.to_string())
		.replace("{r}", if retina { "@2x" } else { "" })
}

/// Browser-side tile images, loaded on first request and evicted oldest first.
pub struct TileCache {
	images: HashMap<TileKey, HtmlImageElement>,
	order: VecDeque<TileKey>,
	on_load: Closure<dyn FnMut()>,
	retina: bool,
}

impl TileCache {
	/// `on_load` runs whenever a tile finishes loading, to schedule a redraw.
	pub fn new(on_load: Closure<dyn FnMut()>, retina: bool) -> Self {
		Self {
			images: HashMap::new(),
			order: VecDeque::new(),
			on_load,
			retina,
		}
	}

	/// The image for `key` if it has finished loading; starts the load otherwise.
	pub fn get(&mut self, template: &str, subdomains: &[char], key: TileKey) -> Option<&HtmlImageElement> {
		if !self.images.contains_key(&key) {
			let img = match HtmlImageElement::new() {
				Ok(img) => img,
				Err(err) => {
					warn!("Could not create tile image: {err:?}");
					return None;
				}
			};
			img.set_cross_origin(Some("anonymous"));
			img.set_onload(Some(self.on_load.as_ref().unchecked_ref()));
			img.set_src(&tile_url(template, subdomains, key, self.retina));
			self.images.insert(key, img);
			self.order.push_back(key);
			self.evict();
		}
		self.images
			.get(&key)
			.filter(|img| img.complete() && img.natural_width() > 0)
	}

	/// Detaches load handlers so no redraw is requested after unmount.
	pub fn clear(&mut self) {
		for img in self.images.values() {
			img.set_onload(None);
		}
		self.images.clear();
		self.order.clear();
	}

	fn evict(&mut self) {
		while self.order.len() > MAX_CACHED_TILES {
			if let Some(old) = self.order.pop_front() {
				if let Some(img) = self.images.remove(&old) {
					img.set_onload(None);
				}
			}
		}
	}
}
