use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::layers::{Drawable, LayerKind, PathStyle};
use super::projection::Viewport;
use super::scene::{GLYPH_SIZE, MARKER_SIZE, MARKER_SIZE_HIGHLIGHTED, MapScene};
use super::tiles::{TileCache, TileKey};
use super::types::{LatLng, NodeCategory};

const BACKGROUND: &str = "#0b1120";

pub fn render(scene: &MapScene, ctx: &CanvasRenderingContext2d, tiles: &mut TileCache) {
	let vp = &scene.viewport;
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, vp.width, vp.height);
	if scene.is_disposed() {
		return;
	}

	for layer in LayerKind::ALL {
		for drawable in scene.drawables(layer) {
			match drawable {
				Drawable::Basemap {
					url_template,
					subdomains,
				} => draw_basemap(vp, ctx, tiles, url_template, subdomains),
				Drawable::Path { points, style, .. } => draw_path(vp, ctx, points, style),
				Drawable::Glyph {
					position, color, ..
				} => draw_glyph(vp, ctx, *position, color),
				Drawable::Marker {
					position,
					category,
					label,
					highlighted,
					..
				} => draw_marker(vp, ctx, *position, *category, label, *highlighted),
			}
		}
	}
}

fn draw_basemap(
	vp: &Viewport,
	ctx: &CanvasRenderingContext2d,
	tiles: &mut TileCache,
	template: &str,
	subdomains: &[char],
) {
	for tile in vp.visible_tiles() {
		let key = TileKey {
			z: tile.z,
			x: tile.x,
			y: tile.y,
		};
		if let Some(img) = tiles.get(template, subdomains, key) {
			let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
				img,
				tile.screen_x.floor(),
				tile.screen_y.floor(),
				tile.size.ceil() + 1.0,
				tile.size.ceil() + 1.0,
			);
		}
	}
}

fn draw_path(vp: &Viewport, ctx: &CanvasRenderingContext2d, points: &[LatLng], style: &PathStyle) {
	let Some((first, rest)) = points.split_first() else {
		return;
	};
	ctx.save();
	ctx.set_global_alpha(style.opacity);
	ctx.set_stroke_style_str(&style.color);
	ctx.set_line_width(style.weight);
	ctx.set_line_cap("round");
	ctx.set_line_join("round");
	if style.dashed {
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(10.0),
			&JsValue::from_f64(6.0),
		));
	}

	ctx.begin_path();
	let (x, y) = vp.to_screen(*first);
	ctx.move_to(x, y);
	for p in rest {
		let (x, y) = vp.to_screen(*p);
		ctx.line_to(x, y);
	}
	ctx.stroke();
	ctx.restore();
}

fn draw_glyph(vp: &Viewport, ctx: &CanvasRenderingContext2d, position: LatLng, color: &str) {
	let (x, y) = vp.to_screen(position);
	let r = GLYPH_SIZE / 2.0;

	if let Ok(gradient) = ctx.create_radial_gradient(x, y, r * 0.5, x, y, r * 1.6) {
		let _ = gradient.add_color_stop(0.0, &format!("{color}99"));
		let _ = gradient.add_color_stop(1.0, "rgba(0, 0, 0, 0)");
		ctx.begin_path();
		let _ = ctx.arc(x, y, r * 1.6, 0.0, 2.0 * PI);
		#[allow(deprecated)]
		ctx.set_fill_style(&gradient);
		ctx.fill();
	}

	ctx.begin_path();
	let _ = ctx.arc(x, y, r, 0.0, 2.0 * PI);
	ctx.set_fill_style_str(color);
	ctx.fill();
	ctx.set_stroke_style_str("white");
	ctx.set_line_width(3.0);
	ctx.stroke();

	draw_label(ctx, "🚛", x, y, 18.0);
}

fn draw_marker(
	vp: &Viewport,
	ctx: &CanvasRenderingContext2d,
	position: LatLng,
	category: NodeCategory,
	label: &str,
	highlighted: bool,
) {
	let (x, y) = vp.to_screen(position);
	let size = if highlighted {
		MARKER_SIZE_HIGHLIGHTED
	} else {
		MARKER_SIZE
	};
	let half = size / 2.0;
	let color = category.color();

	if highlighted {
		ctx.begin_path();
		let _ = ctx.arc(x, y, size * 0.85, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(&format!("{color}40"));
		ctx.fill();
	}

	ctx.begin_path();
	if category == NodeCategory::Customer {
		let _ = ctx.arc(x, y, half, 0.0, 2.0 * PI);
	} else {
		rounded_rect(ctx, x - half, y - half, size, size, 8.0);
	}
	ctx.set_fill_style_str(color);
	ctx.fill();
	ctx.set_stroke_style_str("rgba(255, 255, 255, 0.95)");
	ctx.set_line_width(3.0);
	ctx.stroke();

	draw_label(ctx, label, x, y, size * 0.45);
}

fn draw_label(ctx: &CanvasRenderingContext2d, text: &str, x: f64, y: f64, font_px: f64) {
	ctx.set_fill_style_str("white");
	ctx.set_font(&format!("bold {font_px}px sans-serif"));
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	let _ = ctx.fill_text(text, x, y);
}

fn rounded_rect(ctx: &CanvasRenderingContext2d, x: f64, y: f64, w: f64, h: f64, r: f64) {
	ctx.move_to(x + r, y);
	let _ = ctx.arc_to(x + w, y, x + w, y + h, r);
	let _ = ctx.arc_to(x + w, y + h, x, y + h, r);
	let _ = ctx.arc_to(x, y + h, x, y, r);
	let _ = ctx.arc_to(x, y, x + w, y, r);
	ctx.close_path();
}
