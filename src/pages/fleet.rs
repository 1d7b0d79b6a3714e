use leptos::prelude::*;

use crate::components::map_surface::{
	GapPolicy, LatLng, MapConfig, MapSurface, Node, NodeCategory, Route, RouteStatus, Selection,
};

const HEILBRONN: LatLng = LatLng::new(49.15, 9.3);

fn location(id: u32, name: &str, lat: f64, lng: f64, demand: Option<u32>) -> Node {
	Node {
		id: id.to_string(),
		name: name.into(),
		position: LatLng::new(lat, lng),
		category: if demand.is_some() {
			NodeCategory::Customer
		} else {
			NodeCategory::Warehouse
		},
		demand,
		inventory: None,
	}
}

fn delivery_locations() -> Vec<Node> {
	vec![
		location(1, "Warehouse HQ", 49.1427, 9.2109, None),
		location(2, "Audi Neckarsulm", 49.1912, 9.2272, Some(45)),
		location(3, "Bosch Abstatt", 49.0743, 9.3056, Some(32)),
		location(4, "Lidl Zentrale", 49.0817, 9.2694, Some(78)),
		location(5, "Schwarz IT", 49.1167, 9.2167, Some(24)),
		location(6, "Würth Künzelsau", 49.2833, 9.6833, Some(56)),
		location(7, "Ziehl-Abegg", 49.15, 9.4667, Some(38)),
		location(8, "Bechtle Neckarsulm", 49.1939, 9.225, Some(29)),
		location(9, "Kolbenschmidt", 49.135, 9.178, Some(41)),
		location(10, "KACO Bad Rappenau", 49.235, 9.1019, Some(35)),
		location(11, "Intersport Heilbronn", 49.15, 9.23, Some(22)),
	]
}

#[allow(clippy::too_many_arguments)]
fn truck_route(
	id: &str,
	vehicle: &str,
	color: &str,
	stops: &[u32],
	distance_km: f64,
	duration: &str,
	status: RouteStatus,
	load: u32,
) -> Route {
	Route {
		id: id.into(),
		label: vehicle.into(),
		color: color.into(),
		stops: stops.iter().map(u32::to_string).collect(),
		status,
		distance_km: Some(distance_km),
		duration: Some(duration.into()),
		load: Some(load),
		animate: true,
	}
}

/// Legs the router cannot resolve are bridged so a tour never shows a hole.
fn fleet_config() -> MapConfig {
	MapConfig::fleet().with_gap_policy(GapPolicy::StraightLine)
}

fn fleet_routes() -> Vec<Route> {
	vec![
		truck_route("Route A", "Truck 01", "#3b82f6", &[1, 2, 8, 5, 11, 1], 32.4, "2h 05m", RouteStatus::Active, 120),
		truck_route("Route B", "Truck 02", "#22c55e", &[1, 4, 3, 9, 1], 26.8, "1h 40m", RouteStatus::Active, 134),
		truck_route("Route C", "Truck 03", "#f97316", &[1, 10, 6, 7, 1], 72.5, "2h 45m", RouteStatus::Active, 130),
		truck_route("Route D", "Truck 04", "#8b5cf6", &[1, 9, 10, 1], 38.2, "1h 30m", RouteStatus::Pending, 76),
	]
}

/// "Audi → Bechtle → ..." using the first word of each stop name.
fn stop_summary(route: &Route, nodes: &[Node]) -> String {
	route
		.stops
		.iter()
		.filter_map(|id| nodes.iter().find(|n| &n.id == id))
		.filter_map(|n| n.name.split_whitespace().next())
		.collect::<Vec<_>>()
		.join(" → ")
}

/// Fleet routing page: four trucks driving street-routed tours.
#[component]
pub fn FleetRouting() -> impl IntoView {
	let nodes = Signal::derive(delivery_locations);
	let routes = Signal::derive(fleet_routes);
	let (animating, set_animating) = signal(false);
	let (selected_route, set_selected_route) = signal(None::<String>);

	let toggle_route = move |id: String| {
		set_selected_route.update(|current| {
			*current = if current.as_deref() == Some(id.as_str()) {
				None
			} else {
				Some(id)
			};
		});
	};
	let on_select = Callback::new(move |selection: Selection| {
		if let Selection::Route(id) = selection {
			toggle_route(id);
		}
	});
	let selected = Signal::derive(move || selected_route.get().map(Selection::Route));

	view! {
		<div class="page fleet-routing">
			<header class="page-header">
				<div>
					<h1>"Fleet Routing"</h1>
					<p class="subtitle">"Real-time vehicle routing for the Heilbronn-Franken region"</p>
				</div>
				<button on:click=move |_| set_animating.update(|a| *a = !*a)>
					{move || if animating.get() { "Pause" } else { "Simulate" }}
				</button>
			</header>

			<div class="map-panel" style="height: 520px;">
				<MapSurface
					title="Optimized Routes"
					center=HEILBRONN
					zoom=11.0
					nodes=nodes
					routes=routes
					selected=selected
					animating=animating
					on_select=on_select
					config=fleet_config()
				/>
			</div>

			<ul class="route-list">
				{move || {
					let nodes = nodes.get();
					routes
						.get()
						.into_iter()
						.map(|route| {
							let id = route.id.clone();
							let is_selected = {
								let id = id.clone();
								move || selected_route.get().as_deref() == Some(id.as_str())
							};
							let stops = stop_summary(&route, &nodes);
							view! {
								<li
									class="route-card"
									class:selected=is_selected
									on:click=move |_| toggle_route(id.clone())
								>
									<span class="swatch" style=format!("background-color: {}", route.color) />
									<strong>{route.id.clone()}</strong>
									<span class="status">{route.status.label()}</span>
									<span>{route.label.clone()}</span>
									<span>{route.duration.clone().unwrap_or_default()}</span>
									<span>{route.distance_km.map(|d| format!("{d} km")).unwrap_or_default()}</span>
									<span>{route.load.map(|l| format!("📦 {l} units")).unwrap_or_default()}</span>
									<p class="stops">"Stops: " {stops}</p>
								</li>
							}
						})
						.collect_view()
				}}
			</ul>
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unresolved_legs_fall_back_to_straight_lines() {
		let config = fleet_config();
		assert_eq!(config.gap_policy, GapPolicy::StraightLine);
		assert_eq!(config.path_source, MapConfig::fleet().path_source);
	}

	#[test]
	fn every_route_stop_is_a_known_location() {
		let nodes = delivery_locations();
		for route in fleet_routes() {
			for stop in &route.stops {
				assert!(nodes.iter().any(|n| &n.id == stop), "{}: unknown stop {stop}", route.id);
			}
		}
	}

	#[test]
	fn summarizes_stops_by_first_name_word() {
		let nodes = delivery_locations();
		let routes = fleet_routes();
		assert_eq!(
			stop_summary(&routes[3], &nodes),
			"Warehouse → Kolbenschmidt → KACO → Warehouse"
		);
	}
}
