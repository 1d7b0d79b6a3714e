use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent};

use super::config::MapConfig;
use super::error::MapError;
use super::geometry::RouteSource;
use super::popup::Popup;
use super::render;
use super::route_cache::RouteCache;
use super::scene::MapScene;
use super::session::MapSession;
use super::tiles::TileCache;
use super::types::{LatLng, Node, Route, Selection};

const TOOLBAR_HEIGHT: f64 = 44.0;
const DRAG_THRESHOLD: f64 = 3.0;

/// Browser handles that must not outlive the surface.
#[derive(Default)]
struct Scheduled {
	motion_frame: Option<i32>,
	motion_generation: Option<u64>,
	redraw_frame: Option<i32>,
	relayout_timer: Option<i32>,
}

#[derive(Clone, Copy, Default)]
struct DragState {
	active: bool,
	moved: bool,
	start: (f64, f64),
	last: (f64, f64),
}

/// Shared handles of one mounted surface. Cloning is cheap; every clone sees
/// the same session.
#[derive(Clone, Default)]
struct Surface {
	session: Rc<RefCell<Option<MapSession<MapScene>>>>,
	canvas: Rc<RefCell<Option<(HtmlCanvasElement, CanvasRenderingContext2d)>>>,
	tiles: Rc<RefCell<Option<TileCache>>>,
	scheduled: Rc<RefCell<Scheduled>>,
	/// Device pixels per CSS pixel the backing store was sized for.
	pixel_ratio: Rc<Cell<f64>>,
	redraw_cb: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
	motion_cb: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
	relayout_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
	resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
	fullscreen_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
}

impl Surface {
	fn paint(&self) {
		let canvas = self.canvas.borrow();
		let session = self.session.borrow();
		let mut tiles = self.tiles.borrow_mut();
		if let (Some((_, ctx)), Some(session), Some(tiles)) =
			(canvas.as_ref(), session.as_ref(), tiles.as_mut())
		{
			let ratio = effective_ratio(self.pixel_ratio.get());
			let _ = ctx.set_transform(ratio, 0.0, 0.0, ratio, 0.0, 0.0);
			render::render(session.engine(), ctx, tiles);
		}
	}

	/// One-shot repaint on the next frame. Skipped while the motion loop is
	/// painting anyway.
	fn request_redraw(&self) {
		{
			let scheduled = self.scheduled.borrow();
			if scheduled.motion_frame.is_some() || scheduled.redraw_frame.is_some() {
				return;
			}
		}
		let Some(window) = web_sys::window() else {
			return;
		};
		let handle = match self.redraw_cb.borrow().as_ref() {
			Some(cb) => window.request_animation_frame(cb.as_ref().unchecked_ref()),
			None => return,
		};
		match handle {
			Ok(handle) => self.scheduled.borrow_mut().redraw_frame = Some(handle),
			Err(err) => warn!("Redraw not scheduled: {err:?}"),
		}
	}

	fn request_motion_frame(&self) {
		let Some(window) = web_sys::window() else {
			return;
		};
		let handle = match self.motion_cb.borrow().as_ref() {
			Some(cb) => window.request_animation_frame(cb.as_ref().unchecked_ref()),
			None => return,
		};
		match handle {
			Ok(handle) => self.scheduled.borrow_mut().motion_frame = Some(handle),
			Err(err) => warn!("Animation frame not scheduled: {err:?}"),
		}
	}

	/// Replaces the frame loop with one bound to `generation`.
	fn start_motion(&self, generation: u64) {
		self.cancel_motion();
		let surface = self.clone();
		*self.motion_cb.borrow_mut() = Some(Closure::new(move |now: f64| {
			surface.scheduled.borrow_mut().motion_frame = None;
			let ticked = surface
				.session
				.borrow_mut()
				.as_mut()
				.map(|s| s.frame(generation, now));
			match ticked {
				Some(Ok(_)) => {
					surface.paint();
					surface.request_motion_frame();
				}
				Some(Err(MapError::StaleCallback(g))) => debug!("Dropping frame of motion generation {g}"),
				Some(Err(err)) => warn!("Animation frame failed: {err}"),
				None => {}
			}
		}));
		self.scheduled.borrow_mut().motion_generation = Some(generation);
		self.request_motion_frame();
	}

	fn cancel_motion(&self) {
		let pending = {
			let mut scheduled = self.scheduled.borrow_mut();
			scheduled.motion_generation = None;
			scheduled.motion_frame.take()
		};
		if let (Some(handle), Some(window)) = (pending, web_sys::window()) {
			let _ = window.cancel_animation_frame(handle);
		}
		self.motion_cb.borrow_mut().take();
	}

	/// Brings the frame loop in line with the session's animation state.
	fn sync_motion(&self) {
		let wanted = self
			.session
			.borrow()
			.as_ref()
			.and_then(|s| s.motion_generation());
		let running = self.scheduled.borrow().motion_generation;
		if wanted == running {
			return;
		}
		match wanted {
			Some(generation) => self.start_motion(generation),
			None => {
				self.cancel_motion();
				self.request_redraw();
			}
		}
	}

	fn relayout(&self) {
		let ratio = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
		self.pixel_ratio.set(ratio);
		let size = self
			.canvas
			.borrow()
			.as_ref()
			.map(|(canvas, _)| fit_to_parent(canvas, ratio));
		if let Some((width, height)) = size {
			if let Some(session) = self.session.borrow_mut().as_mut() {
				session.invalidate_size(width, height);
			}
			self.request_redraw();
		}
	}

	/// Relayout once the browser has settled, e.g. after a fullscreen transition.
	fn schedule_relayout(&self) {
		let Some(window) = web_sys::window() else {
			return;
		};
		let delay = self
			.session
			.borrow()
			.as_ref()
			.map_or(0, |s| s.config().relayout_delay_ms);
		if let Some(id) = self.scheduled.borrow_mut().relayout_timer.take() {
			window.clear_timeout_with_handle(id);
		}
		let timer = match self.relayout_cb.borrow().as_ref() {
			Some(cb) => window
				.set_timeout_with_callback_and_timeout_and_arguments_0(cb.as_ref().unchecked_ref(), delay),
			None => return,
		};
		match timer {
			Ok(id) => self.scheduled.borrow_mut().relayout_timer = Some(id),
			Err(err) => warn!("Relayout not scheduled: {err:?}"),
		}
	}

	fn load_network(&self, nodes: Vec<Node>, routes: Vec<Route>) {
		let prepared = self.session.borrow_mut().as_mut().map(|s| {
			let generation = s.set_network(nodes.clone(), routes.clone());
			let source = RouteSource::from(&s.config().path_source);
			(generation, source, s.config().gap_policy)
		});
		let Some((generation, source, policy)) = prepared else {
			return;
		};
		self.sync_motion();
		self.request_redraw();

		let surface = self.clone();
		spawn_local(async move {
			let cache = RouteCache::build(&source, &nodes, &routes, policy).await;
			let applied = surface
				.session
				.borrow_mut()
				.as_mut()
				.map(|s| s.apply_route_cache(generation, cache));
			match applied {
				Some(Ok(())) => {
					surface.sync_motion();
					surface.request_redraw();
				}
				Some(Err(err)) => debug!("Discarding route geometry: {err}"),
				None => {}
			}
		});
	}

	fn teardown(&self) {
		self.cancel_motion();
		let pending = std::mem::take(&mut *self.scheduled.borrow_mut());
		if let Some(window) = web_sys::window() {
			if let Some(handle) = pending.redraw_frame {
				let _ = window.cancel_animation_frame(handle);
			}
			if let Some(id) = pending.relayout_timer {
				window.clear_timeout_with_handle(id);
			}
			if let Some(cb) = self.resize_cb.borrow().as_ref() {
				let _ = window.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
			if let (Some(document), Some(cb)) = (window.document(), self.fullscreen_cb.borrow().as_ref()) {
				let _ = document
					.remove_event_listener_with_callback("fullscreenchange", cb.as_ref().unchecked_ref());
			}
		}

		if let Some(session) = self.session.borrow_mut().as_mut() {
			session.teardown();
		}
		if let Some(mut tiles) = self.tiles.borrow_mut().take() {
			tiles.clear();
		}
		self.redraw_cb.borrow_mut().take();
		self.relayout_cb.borrow_mut().take();
		self.resize_cb.borrow_mut().take();
		self.fullscreen_cb.borrow_mut().take();
		self.canvas.borrow_mut().take();
	}
}

fn effective_ratio(ratio: f64) -> f64 {
	if ratio.is_finite() && ratio > 0.0 {
		ratio
	} else {
		1.0
	}
}

/// Backing store size in device pixels for a canvas of `width` x `height` CSS pixels.
fn backing_size(width: f64, height: f64, ratio: f64) -> (u32, u32) {
	let ratio = effective_ratio(ratio);
	((width * ratio).round() as u32, (height * ratio).round() as u32)
}

/// Sizes the canvas to its container and returns the new size in CSS pixels.
/// The backing store is scaled by `ratio` so lines stay sharp on HiDPI screens.
fn fit_to_parent(canvas: &HtmlCanvasElement, ratio: f64) -> (f64, f64) {
	let (w, h) = canvas
		.parent_element()
		.map(|p| (p.client_width() as f64, p.client_height() as f64))
		.filter(|(w, h)| *w > 0.0 && *h > 0.0)
		.unwrap_or((800.0, 420.0));
	let (backing_w, backing_h) = backing_size(w, h, ratio);
	canvas.set_width(backing_w);
	canvas.set_height(backing_h);
	let style = web_sys::HtmlElement::style(canvas);
	let _ = style.set_property("width", &format!("{w}px"));
	let _ = style.set_property("height", &format!("{h}px"));
	(w, h)
}

/// Info card pinned above `(x, y)`. Closing it clears `popup`.
fn popup_card(card: Popup, x: f64, y: f64, popup: RwSignal<Option<(Popup, f64, f64)>>) -> impl IntoView {
	let gauge = card.gauge.map(|g| {
		view! {
			<div class="map-popup-gauge" style="margin-top: 8px;">
				<div style="display: flex; justify-content: space-between; margin-bottom: 4px;">
					<span style="color: #64748b;">{g.label}</span>
					<span style=format!(
						"font-weight: 600; color: {};",
						g.color,
					)>{format!("{}%", g.percent)}</span>
				</div>
				<div style="background: #1e293b; border-radius: 4px; height: 8px; overflow: hidden;">
					<div style=format!(
						"background: {}; height: 100%; width: {}%; border-radius: 4px;",
						g.color,
						g.percent,
					) />
				</div>
			</div>
		}
	});
	let rows = card
		.rows
		.into_iter()
		.map(|(key, value)| {
			view! {
				<div style="display: flex; gap: 8px; margin-bottom: 4px;">
					<span style="color: #64748b;">{format!("{key}:")}</span>
					<span style="font-weight: 500;">{value}</span>
				</div>
			}
		})
		.collect_view();

	view! {
		<div
			class="map-popup"
			style=format!(
				"position: absolute; left: {x}px; top: {y}px; transform: translate(-50%, calc(-100% - 14px)); min-width: 180px; padding: 8px 10px; border-radius: 8px; background: #0f172a; color: #e2e8f0; font-size: 13px; box-shadow: 0 4px 16px rgba(0, 0, 0, 0.5); z-index: 5;",
			)
		>
			<button
				class="map-popup-close"
				style="float: right; background: none; border: none; color: #94a3b8; cursor: pointer;"
				on:click=move |_| popup.set(None)
			>
				"×"
			</button>
			<div style=format!(
				"font-weight: 700; margin-bottom: 8px; color: {};",
				card.accent,
			)>{card.title}</div>
			{rows}
			{gauge}
		</div>
	}
}

fn pointer_position(canvas: &HtmlCanvasElement, ev: &MouseEvent) -> (f64, f64) {
	let rect = canvas.get_bounding_client_rect();
	(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	)
}

/// Interactive map of nodes and routes with vehicles moving along them.
#[component]
pub fn MapSurface(
	#[prop(into)] title: String,
	center: LatLng,
	zoom: f64,
	#[prop(into)] nodes: Signal<Vec<Node>>,
	#[prop(into)] routes: Signal<Vec<Route>>,
	#[prop(into)] selected: Signal<Option<Selection>>,
	#[prop(into)] animating: Signal<bool>,
	#[prop(optional)] on_select: Option<Callback<Selection>>,
	#[prop(default = MapConfig::default())] config: MapConfig,
) -> impl IntoView {
	let wrapper_ref = NodeRef::<leptos::html::Div>::new();
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let surface = Surface::default();
	let mounted = RwSignal::new(false);
	let (is_fullscreen, set_fullscreen) = signal(false);
	let popup = RwSignal::new(None::<(Popup, f64, f64)>);
	let close_popup = move || {
		if popup.with_untracked(Option::is_some) {
			popup.set(None);
		}
	};
	let drag: Rc<Cell<DragState>> = Rc::new(Cell::new(DragState::default()));

	let surface_mount = surface.clone();
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if mounted.get_untracked() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let ctx: CanvasRenderingContext2d = match canvas.get_context("2d") {
			Ok(Some(ctx)) => match ctx.dyn_into() {
				Ok(ctx) => ctx,
				Err(_) => return,
			},
			_ => {
				warn!("Canvas 2D context unavailable, map not mounted");
				return;
			}
		};
		let Some(window) = web_sys::window() else {
			return;
		};
		let s = &surface_mount;

		let ratio = window.device_pixel_ratio();
		s.pixel_ratio.set(ratio);
		let (w, h) = fit_to_parent(&canvas, ratio);
		let seed = (js_sys::Math::random() * u64::MAX as f64) as u64;
		let scene = MapScene::new(center, zoom, w, h);
		*s.session.borrow_mut() = Some(MapSession::mount(
			scene,
			config.clone(),
			center,
			zoom,
			SmallRng::seed_from_u64(seed),
		));
		*s.canvas.borrow_mut() = Some((canvas, ctx));

		let redraw = s.clone();
		*s.redraw_cb.borrow_mut() = Some(Closure::new(move |_: f64| {
			redraw.scheduled.borrow_mut().redraw_frame = None;
			redraw.paint();
		}));
		let tile_loaded = s.clone();
		let retina = ratio >= 2.0;
		*s.tiles.borrow_mut() = Some(TileCache::new(
			Closure::new(move || tile_loaded.request_redraw()),
			retina,
		));
		let relayout = s.clone();
		*s.relayout_cb.borrow_mut() = Some(Closure::new(move || {
			relayout.scheduled.borrow_mut().relayout_timer = None;
			relayout.relayout();
		}));

		let resized = s.clone();
		*s.resize_cb.borrow_mut() = Some(Closure::new(move || {
			close_popup();
			resized.schedule_relayout();
		}));
		if let Some(cb) = s.resize_cb.borrow().as_ref() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}
		let fullscreen_changed = s.clone();
		*s.fullscreen_cb.borrow_mut() = Some(Closure::new(move || {
			let active = web_sys::window()
				.and_then(|w| w.document())
				.is_some_and(|d| d.fullscreen_element().is_some());
			set_fullscreen.set(active);
			close_popup();
			fullscreen_changed.schedule_relayout();
		}));
		if let (Some(document), Some(cb)) = (window.document(), s.fullscreen_cb.borrow().as_ref()) {
			let _ =
				document.add_event_listener_with_callback("fullscreenchange", cb.as_ref().unchecked_ref());
		}

		s.schedule_relayout();
		s.request_redraw();
		info!("Map surface mounted ({w}x{h})");
		mounted.set(true);
	});

	let surface_net = surface.clone();
	Effect::new(move |_| {
		let (nodes, routes) = (nodes.get(), routes.get());
		if mounted.get() {
			close_popup();
			surface_net.load_network(nodes, routes);
		}
	});

	let surface_sel = surface.clone();
	Effect::new(move |_| {
		let selected = selected.get();
		if !mounted.get() {
			return;
		}
		if let Some(session) = surface_sel.session.borrow_mut().as_mut() {
			session.set_selected(selected);
		}
		surface_sel.request_redraw();
	});

	let surface_anim = surface.clone();
	Effect::new(move |_| {
		let enabled = animating.get();
		if !mounted.get() {
			return;
		}
		if let Some(session) = surface_anim.session.borrow_mut().as_mut() {
			session.set_animation(enabled);
		}
		surface_anim.sync_motion();
		surface_anim.request_redraw();
	});

	let owned = StoredValue::new_local(surface.clone());
	on_cleanup(move || {
		owned.try_with_value(|surface| surface.teardown());
	});

	let surface_reset = surface.clone();
	let on_reset = move |_: MouseEvent| {
		close_popup();
		if let Some(session) = surface_reset.session.borrow_mut().as_mut() {
			session.reset_view();
		}
		surface_reset.request_redraw();
	};

	let on_fullscreen = move |_: MouseEvent| {
		let Some(document) = web_sys::window().and_then(|w| w.document()) else {
			return;
		};
		if document.fullscreen_element().is_some() {
			document.exit_fullscreen();
		} else if let Some(wrapper) = wrapper_ref.get() {
			let wrapper: web_sys::Element = wrapper.into();
			if let Err(err) = wrapper.request_fullscreen() {
				warn!("Fullscreen refused: {err:?}");
			}
		}
	};

	let drag_down = drag.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let at = pointer_position(&canvas, &ev);
		drag_down.set(DragState {
			active: true,
			moved: false,
			start: at,
			last: at,
		});
	};

	let (surface_move, drag_move) = (surface.clone(), drag.clone());
	let on_mousemove = move |ev: MouseEvent| {
		let mut state = drag_move.get();
		if !state.active {
			return;
		}
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let (x, y) = pointer_position(&canvas, &ev);
		let (dx, dy) = (x - state.last.0, y - state.last.1);
		state.last = (x, y);
		state.moved |= (x - state.start.0).hypot(y - state.start.1) > DRAG_THRESHOLD;
		drag_move.set(state);
		if state.moved {
			close_popup();
		}

		if let Some(session) = surface_move.session.borrow_mut().as_mut() {
			session.engine_mut().viewport.pan_by(dx, dy);
		}
		surface_move.request_redraw();
	};

	let (surface_up, drag_up) = (surface.clone(), drag.clone());
	let on_mouseup = move |ev: MouseEvent| {
		let state = drag_up.replace(DragState::default());
		if !state.active || state.moved {
			return;
		}
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let (x, y) = pointer_position(&canvas, &ev);
		let hit = surface_up.session.borrow().as_ref().and_then(|s| {
			let selection = s.engine().hit_test(x, y)?;
			let card = s.popup(&selection).map(|card| {
				let (ax, ay) = card
					.anchor
					.map_or((x, y), |at| s.engine().viewport.to_screen(at));
				(card, ax, ay)
			});
			Some((selection, card))
		});
		let Some((selection, card)) = hit else {
			close_popup();
			return;
		};
		popup.set(card);
		if let Some(on_select) = on_select {
			debug!("Selected {selection:?}");
			on_select.run(selection);
		}
	};

	let drag_leave = drag.clone();
	let on_mouseleave = move |_: MouseEvent| {
		drag_leave.set(DragState::default());
	};

	let surface_wheel = surface.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		close_popup();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let (x, y) = pointer_position(&canvas, &ev);
		if let Some(session) = surface_wheel.session.borrow_mut().as_mut() {
			let step = if ev.delta_y() > 0.0 { -1.0 } else { 1.0 };
			let zoom = session.config().clamp_zoom(session.engine().viewport.zoom.round() + step);
			session.engine_mut().viewport.zoom_at(x, y, zoom);
		}
		surface_wheel.request_redraw();
	};

	view! {
		<div
			node_ref=wrapper_ref
			class="map-surface"
			class:fullscreen=move || is_fullscreen.get()
			style="position: relative; height: 100%; overflow: hidden;"
		>
			<div
				class="map-toolbar"
				style=format!(
					"position: absolute; top: 0; left: 0; right: 0; height: {TOOLBAR_HEIGHT}px; z-index: 10; display: flex; align-items: center; justify-content: space-between; padding: 0 12px;",
				)
			>
				<span class="map-title">{title}</span>
				<div class="map-actions">
					<button title="Reset view" on:click=on_reset>"⟲"</button>
					<button title="Fullscreen" on:click=on_fullscreen>
						{move || if is_fullscreen.get() { "🗗" } else { "⛶" }}
					</button>
				</div>
			</div>
			<div
				class="map-container"
				style=format!("position: absolute; top: {TOOLBAR_HEIGHT}px; left: 0; right: 0; bottom: 0;")
			>
				<canvas
					node_ref=canvas_ref
					class="map-canvas"
					on:mousedown=on_mousedown
					on:mousemove=on_mousemove
					on:mouseup=on_mouseup
					on:mouseleave=on_mouseleave
					on:wheel=on_wheel
					style="display: block; cursor: grab;"
				/>
				{move || popup.get().map(|(card, x, y)| popup_card(card, x, y, popup))}
			</div>
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backing_store_scales_with_device_pixel_ratio() {
		assert_eq!(backing_size(800.0, 420.0, 2.0), (1600, 840));
		assert_eq!(backing_size(800.0, 420.0, 1.5), (1200, 630));
		assert_eq!(backing_size(800.0, 420.0, 1.0), (800, 420));
	}

	#[test]
	fn unusable_ratios_fall_back_to_one() {
		assert_eq!(backing_size(640.0, 480.0, 0.0), (640, 480));
		assert_eq!(backing_size(640.0, 480.0, f64::NAN), (640, 480));
		assert_eq!(effective_ratio(-2.0), 1.0);
	}
}
