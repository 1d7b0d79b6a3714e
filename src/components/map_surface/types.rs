use std::collections::HashSet;

use super::error::MapError;

pub type NodeId = String;
pub type RouteId = String;

/// A WGS-84 coordinate in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatLng {
	pub lat: f64,
	pub lng: f64,
}

impl LatLng {
	pub const fn new(lat: f64, lng: f64) -> Self {
		Self { lat, lng }
	}

	/// Returns the point unchanged when it lies inside the valid lat/lng range.
	pub fn validated(self) -> Result<Self, MapError> {
		let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
		let lng_ok = self.lng.is_finite() && (-180.0..=180.0).contains(&self.lng);
		if lat_ok && lng_ok {
			Ok(self)
		} else {
			Err(MapError::InvalidCoordinate {
				lat: self.lat,
				lng: self.lng,
			})
		}
	}

	pub fn lerp(self, other: LatLng, t: f64) -> LatLng {
		LatLng {
			lat: self.lat + (other.lat - self.lat) * t,
			lng: self.lng + (other.lng - self.lng) * t,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeCategory {
	Warehouse,
	Customer,
	Supplier,
	Factory,
	Distribution,
}

impl NodeCategory {
	pub fn color(self) -> &'static str {
		match self {
			NodeCategory::Supplier => "#22c55e",
			NodeCategory::Warehouse => "#3b82f6",
			NodeCategory::Factory => "#f97316",
			NodeCategory::Distribution => "#8b5cf6",
			NodeCategory::Customer => "#ec4899",
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			NodeCategory::Supplier => "Supplier",
			NodeCategory::Warehouse => "Warehouse",
			NodeCategory::Factory => "Factory",
			NodeCategory::Distribution => "Distribution",
			NodeCategory::Customer => "Customer",
		}
	}

	pub fn emoji(self) -> &'static str {
		match self {
			NodeCategory::Supplier => "📦",
			NodeCategory::Warehouse => "🏭",
			NodeCategory::Factory => "⚙️",
			NodeCategory::Distribution => "🚛",
			NodeCategory::Customer => "🏪",
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	pub id: NodeId,
	pub name: String,
	pub position: LatLng,
	pub category: NodeCategory,
	pub demand: Option<u32>,
	/// Inventory level in percent.
	pub inventory: Option<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteStatus {
	Active,
	Pending,
	Delayed,
}

impl RouteStatus {
	/// Flow color used when a route has no color of its own.
	pub fn color(self) -> &'static str {
		match self {
			RouteStatus::Active => "#22c55e",
			RouteStatus::Delayed => "#f59e0b",
			RouteStatus::Pending => "#64748b",
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			RouteStatus::Active => "active",
			RouteStatus::Pending => "pending",
			RouteStatus::Delayed => "delayed",
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Route {
	pub id: RouteId,
	/// Vehicle or material label shown next to the route.
	pub label: String,
	pub color: String,
	pub stops: Vec<NodeId>,
	pub status: RouteStatus,
	pub distance_km: Option<f64>,
	pub duration: Option<String>,
	pub load: Option<u32>,
	/// Whether a glyph travels this route while animation is enabled.
	pub animate: bool,
}

impl Route {
	/// Single-hop flow between two nodes, colored by status.
	pub fn flow(from: &str, to: &str, volume: u32, status: RouteStatus) -> Self {
		Self {
			id: format!("{from}-{to}"),
			label: format!("{volume} units"),
			color: status.color().into(),
			stops: vec![from.into(), to.into()],
			status,
			distance_km: None,
			duration: None,
			load: Some(volume),
			animate: status == RouteStatus::Active,
		}
	}
}

/// What the user picked on the map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Selection {
	Route(RouteId),
	Node(NodeId),
}

/// Checks that every stop of every route names a node in `nodes`.
pub fn validate_network(nodes: &[Node], routes: &[Route]) -> Result<(), MapError> {
	let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
	for route in routes {
		if let Some(stop) = route.stops.iter().find(|s| !known.contains(s.as_str())) {
			return Err(MapError::UnknownStop {
				route: route.id.clone(),
				stop: stop.clone(),
			});
		}
	}
	Ok(())
}
