use super::types::{LatLng, Node, NodeCategory, Route, Selection};

/// Horizontal fill bar, e.g. an inventory level.
#[derive(Clone, Debug, PartialEq)]
pub struct Gauge {
	pub label: &'static str,
	pub percent: u8,
	pub color: &'static str,
}

/// Info card for a clicked node or route.
#[derive(Clone, Debug, PartialEq)]
pub struct Popup {
	pub title: String,
	pub accent: String,
	pub rows: Vec<(&'static str, String)>,
	pub gauge: Option<Gauge>,
	/// Where the card points to. `None` for routes, which anchor at the click.
	pub anchor: Option<LatLng>,
}

pub fn inventory_color(percent: u8) -> &'static str {
	if percent > 80 {
		"#22c55e"
	} else if percent > 50 {
		"#f59e0b"
	} else {
		"#ef4444"
	}
}

fn short_name(node: &Node) -> &str {
	node.name.split_whitespace().next().unwrap_or(&node.name)
}

fn node_popup(node: &Node) -> Popup {
	let mut rows = vec![("Type", node.category.label().to_string())];
	if let Some(demand) = node.demand {
		rows.push(("Demand", format!("{demand} units")));
	}
	let gauge = node
		.inventory
		.filter(|_| node.category != NodeCategory::Customer)
		.map(|percent| Gauge {
			label: "Inventory level",
			percent: percent.min(100),
			color: inventory_color(percent),
		});
	Popup {
		title: node.name.clone(),
		accent: node.category.color().to_string(),
		rows,
		gauge,
		anchor: Some(node.position),
	}
}

fn route_popup(route: &Route, nodes: &[Node]) -> Popup {
	let find = |id: &String| nodes.iter().find(|n| &n.id == id);
	// Tours carry trip summaries; bare two-stop flows describe their endpoints.
	let is_tour = route.distance_km.is_some() || route.duration.is_some();
	let (title, rows) = if is_tour {
		let mut rows = vec![("Vehicle", route.label.clone())];
		if let Some(km) = route.distance_km {
			rows.push(("Distance", format!("{km} km")));
		}
		if let Some(duration) = &route.duration {
			rows.push(("Time", duration.clone()));
		}
		(route.id.clone(), rows)
	} else {
		let mut rows = Vec::new();
		if let Some(from) = route.stops.first().and_then(find) {
			rows.push(("From", short_name(from).to_string()));
		}
		if let Some(to) = route.stops.last().and_then(find) {
			rows.push(("To", short_name(to).to_string()));
		}
		if let Some(volume) = route.load {
			rows.push(("Volume", format!("{volume} units")));
		}
		rows.push(("Status", route.status.label().to_string()));
		("Material flow".to_string(), rows)
	};
	Popup {
		title,
		accent: route.color.clone(),
		rows,
		gauge: None,
		anchor: None,
	}
}

/// Card content for `selection`, or `None` if it names nothing on the map.
pub fn describe(selection: &Selection, nodes: &[Node], routes: &[Route]) -> Option<Popup> {
	match selection {
		Selection::Node(id) => nodes.iter().find(|n| &n.id == id).map(node_popup),
		Selection::Route(id) => routes
			.iter()
			.find(|r| &r.id == id)
			.map(|r| route_popup(r, nodes)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::map_surface::types::RouteStatus;

	fn site(id: &str, name: &str, category: NodeCategory) -> Node {
		Node {
			id: id.into(),
			name: name.into(),
			position: LatLng::new(49.14, 9.21),
			category,
			demand: None,
			inventory: None,
		}
	}

	#[test]
	fn customer_card_shows_type_and_demand() {
		let mut audi = site("2", "Audi Neckarsulm", NodeCategory::Customer);
		audi.demand = Some(45);
		audi.inventory = Some(0);

		let popup = describe(&Selection::Node("2".into()), &[audi], &[]).unwrap();
		assert_eq!(popup.title, "Audi Neckarsulm");
		assert_eq!(
			popup.rows,
			vec![("Type", "Customer".to_string()), ("Demand", "45 units".to_string())]
		);
		assert_eq!(popup.gauge, None);
		assert_eq!(popup.anchor, Some(LatLng::new(49.14, 9.21)));
	}

	#[test]
	fn inventory_gauge_is_colored_by_level() {
		let mut dc = site("dc-1", "Distribution center north", NodeCategory::Distribution);
		dc.inventory = Some(65);
		let gauge = describe(&Selection::Node("dc-1".into()), &[dc], &[])
			.and_then(|p| p.gauge)
			.unwrap();
		assert_eq!(gauge.percent, 65);
		assert_eq!(gauge.color, "#f59e0b");

		assert_eq!(inventory_color(81), "#22c55e");
		assert_eq!(inventory_color(80), "#f59e0b");
		assert_eq!(inventory_color(50), "#ef4444");
	}

	#[test]
	fn tour_card_shows_vehicle_distance_and_time() {
		let route = Route {
			id: "Route B".into(),
			label: "Truck 02".into(),
			color: "#22c55e".into(),
			stops: vec!["1".into(), "4".into(), "1".into()],
			status: RouteStatus::Active,
			distance_km: Some(26.8),
			duration: Some("1h 40m".into()),
			load: Some(134),
			animate: true,
		};
		let popup = describe(&Selection::Route("Route B".into()), &[], &[route]).unwrap();
		assert_eq!(popup.title, "Route B");
		assert_eq!(
			popup.rows,
			vec![
				("Vehicle", "Truck 02".to_string()),
				("Distance", "26.8 km".to_string()),
				("Time", "1h 40m".to_string()),
			]
		);
		assert_eq!(popup.anchor, None);
	}

	#[test]
	fn flow_card_names_endpoints_volume_and_status() {
		let nodes = [
			site("supplier-3", "Plastics (Frankfurt)", NodeCategory::Supplier),
			site("warehouse-1", "Central warehouse Heilbronn", NodeCategory::Warehouse),
		];
		let flow = Route::flow("supplier-3", "warehouse-1", 320, RouteStatus::Delayed);
		let popup = describe(&Selection::Route(flow.id.clone()), &nodes, &[flow]).unwrap();
		assert_eq!(popup.title, "Material flow");
		assert_eq!(popup.accent, "#f59e0b");
		assert_eq!(
			popup.rows,
			vec![
				("From", "Plastics".to_string()),
				("To", "Central".to_string()),
				("Volume", "320 units".to_string()),
				("Status", "delayed".to_string()),
			]
		);
	}

	#[test]
	fn unknown_selection_has_no_card() {
		assert_eq!(describe(&Selection::Node("nope".into()), &[], &[]), None);
	}
}
