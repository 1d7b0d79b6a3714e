use std::time::Duration;

use leptos::leptos_dom::helpers::{IntervalHandle, set_interval_with_handle};
use leptos::prelude::*;
use log::warn;

use crate::components::map_surface::{
	LatLng, MapConfig, MapSurface, Node, NodeCategory, Route, RouteStatus, Selection,
};

const SOUTH_WEST_GERMANY: LatLng = LatLng::new(49.0, 9.5);
const STEP_INTERVAL: Duration = Duration::from_millis(2000);

/// Walkthrough shown while the flow simulation runs, one node per step.
const SIMULATION_STEPS: [(&str, &str); 6] = [
	("supplier-1", "Raw materials leave Stuttgart"),
	("supplier-2", "Electronics ship from Munich"),
	("warehouse-1", "Materials reach the central warehouse"),
	("factory-1", "Production starts at the Heilbronn plant"),
	("dc-1", "Finished goods head to distribution center north"),
	("customer-1", "Products delivered to the retail network"),
];

fn site(id: &str, name: &str, lat: f64, lng: f64, category: NodeCategory, inventory: u8) -> Node {
	Node {
		id: id.into(),
		name: name.into(),
		position: LatLng::new(lat, lng),
		category,
		demand: None,
		inventory: Some(inventory),
	}
}

fn supply_nodes() -> Vec<Node> {
	use NodeCategory::*;
	vec![
		site("supplier-1", "Steel supplier (Stuttgart)", 48.7758, 9.1829, Supplier, 85),
		site("supplier-2", "Electronics (Munich)", 48.1351, 11.582, Supplier, 92),
		site("supplier-3", "Plastics (Frankfurt)", 50.1109, 8.6821, Supplier, 78),
		site("supplier-4", "Aluminium (Karlsruhe)", 49.0069, 8.4037, Supplier, 88),
		site("warehouse-1", "Central warehouse Heilbronn", 49.1427, 9.2109, Warehouse, 88),
		site("warehouse-2", "Regional warehouse Mannheim", 49.4875, 8.466, Warehouse, 75),
		site("factory-1", "Heilbronn production plant", 49.15, 9.22, Factory, 72),
		site("dc-1", "Distribution center north", 49.2333, 9.3167, Distribution, 65),
		site("dc-2", "Distribution center south", 48.8582, 9.2, Distribution, 70),
		site("customer-1", "Retail network", 49.45, 8.65, Customer, 0),
	]
}

fn material_flows() -> Vec<Route> {
	use RouteStatus::*;
	vec![
		Route::flow("supplier-1", "warehouse-1", 450, Active),
		Route::flow("supplier-2", "warehouse-1", 280, Active),
		Route::flow("supplier-3", "warehouse-1", 320, Delayed),
		Route::flow("supplier-4", "warehouse-2", 380, Active),
		Route::flow("warehouse-1", "factory-1", 850, Active),
		Route::flow("warehouse-2", "factory-1", 420, Active),
		Route::flow("factory-1", "dc-1", 620, Active),
		Route::flow("factory-1", "dc-2", 480, Active),
		Route::flow("dc-1", "customer-1", 580, Active),
		Route::flow("dc-2", "customer-1", 440, Active),
	]
}

/// Supply chain page: material flows between sites, animated as a simulation.
#[component]
pub fn SupplyChain() -> impl IntoView {
	let nodes = Signal::derive(supply_nodes);
	let routes = Signal::derive(material_flows);
	let (simulating, set_simulating) = signal(false);
	let (step, set_step) = signal(0usize);
	let (selected_node, set_selected_node) = signal(None::<String>);

	let interval = StoredValue::new(None::<IntervalHandle>);
	Effect::new(move |_| {
		let running = simulating.get();
		if let Some(handle) = interval.get_value() {
			handle.clear();
		}
		let handle = if running {
			set_step.set(0);
			set_interval_with_handle(
				move || set_step.update(|s| *s = (*s + 1) % SIMULATION_STEPS.len()),
				STEP_INTERVAL,
			)
			.map_err(|err| warn!("Simulation timer not started: {err:?}"))
			.ok()
		} else {
			None
		};
		interval.set_value(handle);
	});
	on_cleanup(move || {
		if let Some(handle) = interval.try_get_value().flatten() {
			handle.clear();
		}
	});

	let on_select = Callback::new(move |selection: Selection| {
		if let Selection::Node(id) = selection {
			set_selected_node.update(|current| {
				*current = if current.as_deref() == Some(id.as_str()) {
					None
				} else {
					Some(id)
				};
			});
		}
	});
	// The simulated step takes over the highlight while running.
	let selected = Signal::derive(move || {
		if simulating.get() {
			let (node, _) = SIMULATION_STEPS[step.get()];
			Some(Selection::Node(node.to_string()))
		} else {
			selected_node.get().map(Selection::Node)
		}
	});

	view! {
		<div class="page supply-chain">
			<header class="page-header">
				<div>
					<h1>"Supply Chain"</h1>
					<p class="subtitle">"Material flows from suppliers to the retail network"</p>
				</div>
				<button on:click=move |_| set_simulating.update(|s| *s = !*s)>
					{move || if simulating.get() { "Pause" } else { "Simulate Flow" }}
				</button>
			</header>

			<div class="map-panel" style="height: 520px;">
				<MapSurface
					title="Supply Network"
					center=SOUTH_WEST_GERMANY
					zoom=7.0
					nodes=nodes
					routes=routes
					selected=selected
					animating=simulating
					on_select=on_select
					config=MapConfig::supply_chain()
				/>
			</div>

			<Show when=move || simulating.get()>
				<p class="simulation-status">
					{move || {
						let (_, description) = SIMULATION_STEPS[step.get()];
						format!("Step {}: {description}", step.get() + 1)
					}}
				</p>
			</Show>

			{move || {
				let id = selected_node.get()?;
				let node = nodes.get().into_iter().find(|n| n.id == id)?;
				Some(
					view! {
						<div class="node-details">
							<h3>{node.name}</h3>
							<p>{format!("{:?}", node.category)}</p>
							<p>{node.inventory.map(|i| format!("Inventory: {i}%")).unwrap_or_default()}</p>
						</div>
					},
				)
			}}
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::map_surface::validate_network;

	#[test]
	fn only_active_flows_animate() {
		let flows = material_flows();
		let moving: Vec<_> = flows.iter().filter(|f| f.animate).map(|f| f.id.as_str()).collect();
		assert_eq!(moving.len(), 9);
		assert!(!moving.contains(&"supplier-3-warehouse-1"));
	}

	#[test]
	fn flows_connect_known_sites() {
		assert!(validate_network(&supply_nodes(), &material_flows()).is_ok());
	}

	#[test]
	fn simulation_steps_name_existing_nodes() {
		let nodes = supply_nodes();
		for (id, _) in SIMULATION_STEPS {
			assert!(nodes.iter().any(|n| n.id == id), "unknown node {id}");
		}
	}
}
