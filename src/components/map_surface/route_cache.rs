use std::collections::HashMap;
use std::rc::Rc;

use futures::future::join_all;
use log::{debug, info, warn};

use super::config::GapPolicy;
use super::error::MapError;
use super::geometry::GeometryFetcher;
use super::types::{LatLng, Node, Route, RouteId};

/// Resolved polyline per route id. Immutable once built; a changed route or
/// node set produces a whole new cache.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteCache {
	paths: HashMap<RouteId, Rc<[LatLng]>>,
}

impl RouteCache {
	/// Resolves every route, one route at a time. Segments of a single route
	/// are fetched concurrently and concatenated in stop order.
	pub async fn build<F: GeometryFetcher>(
		fetcher: &F,
		nodes: &[Node],
		routes: &[Route],
		policy: GapPolicy,
	) -> Self {
		let positions: HashMap<&str, LatLng> =
			nodes.iter().map(|n| (n.id.as_str(), n.position)).collect();
		let mut paths = HashMap::new();

		for route in routes {
			let segments = route.stops.windows(2).map(|pair| {
				let ends = positions
					.get(pair[0].as_str())
					.copied()
					.zip(positions.get(pair[1].as_str()).copied());
				let unknown = if ends.is_none() {
					let stop = pair
						.iter()
						.find(|s| !positions.contains_key(s.as_str()))
						.cloned()
						.unwrap_or_default();
					Some(MapError::UnknownStop {
						route: route.id.clone(),
						stop,
					})
				} else {
					None
				};
				async move {
					match (ends, unknown) {
						(Some((from, to)), _) => (ends, fetcher.fetch(from, to).await),
						(None, Some(err)) => (None, Err(err)),
						(None, None) => (None, Err(MapError::GeometryUnavailable("no endpoints".into()))),
					}
				}
			});
			let resolved = join_all(segments).await;

			let mut path = Vec::new();
			let mut failed = 0;
			for (ends, result) in resolved {
				match result {
					Ok(segment) => append_segment(&mut path, &segment),
					Err(err) => {
						failed += 1;
						warn!("Route {}: segment unresolved: {err}", route.id);
						if let (GapPolicy::StraightLine, Some((from, to))) = (policy, ends) {
							append_segment(&mut path, &[from, to]);
						}
					}
				}
			}

			if policy == GapPolicy::DropRoute && failed > 0 {
				debug!("Route {}: dropped after {failed} failed segment(s)", route.id);
				continue;
			}
			if path.is_empty() {
				debug!("Route {}: no geometry", route.id);
				continue;
			}
			paths.insert(route.id.clone(), Rc::from(path));
		}

		info!("Route cache built: {}/{} routes resolved", paths.len(), routes.len());
		Self { paths }
	}

	pub fn get(&self, route_id: &str) -> Option<&Rc<[LatLng]>> {
		self.paths.get(route_id)
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.paths.len()
	}

	#[cfg(test)]
	pub fn is_empty(&self) -> bool {
		self.paths.is_empty()
	}
}

impl FromIterator<(RouteId, Vec<LatLng>)> for RouteCache {
	fn from_iter<I: IntoIterator<Item = (RouteId, Vec<LatLng>)>>(iter: I) -> Self {
		Self {
			paths: iter
				.into_iter()
				.filter(|(_, path)| !path.is_empty())
				.map(|(id, path)| (id, Rc::from(path)))
				.collect(),
		}
	}
}

/// Appends `segment`, writing a shared junction point only once.
fn append_segment(path: &mut Vec<LatLng>, segment: &[LatLng]) {
	let skip = match (path.last(), segment.first()) {
		(Some(last), Some(first)) if last == first => 1,
		_ => 0,
	};
	path.extend_from_slice(&segment[skip..]);
}
