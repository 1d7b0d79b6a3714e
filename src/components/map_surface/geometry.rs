use log::debug;
use reqwest::Client;
use serde::Deserialize;

use super::config::PathSource;
use super::error::{MapError, Result};
use super::types::LatLng;

/// Resolves one origin/destination pair to an ordered polyline.
///
/// Implementations validate both points before doing any work and report
/// every other failure as [`MapError::GeometryUnavailable`]; callers treat that
/// as "draw nothing for this segment".
#[allow(async_fn_in_trait)]
pub trait GeometryFetcher {
	async fn fetch(&self, from: LatLng, to: LatLng) -> Result<Vec<LatLng>>;
}

#[derive(Deserialize)]
struct OsrmResponse {
	#[serde(default)]
	code: String,
	#[serde(default)]
	routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
	geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
	/// GeoJSON order: `[lng, lat]`.
	coordinates: Vec<[f64; 2]>,
}

/// Client for the OSRM `route` service. One GET per call, no retries.
#[derive(Clone, Debug)]
pub struct OsrmFetcher {
	client: Client,
	base_url: String,
}

impl OsrmFetcher {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			client: Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}

	fn route_url(&self, from: LatLng, to: LatLng) -> String {
		format!(
			"{}/{},{};{},{}?overview=full&geometries=geojson",
			self.base_url, from.lng, from.lat, to.lng, to.lat
		)
	}
}

impl GeometryFetcher for OsrmFetcher {
	async fn fetch(&self, from: LatLng, to: LatLng) -> Result<Vec<LatLng>> {
		let (from, to) = (from.validated()?, to.validated()?);
		if from == to {
			return Ok(vec![from]);
		}

		let url = self.route_url(from, to);
		debug!("Fetching route geometry {url}");
		let body: OsrmResponse = self
			.client
			.get(&url)
			.send()
			.await?
			.error_for_status()?
			.json()
			.await?;

		if !body.code.is_empty() && body.code != "Ok" {
			return Err(MapError::GeometryUnavailable(format!(
				"routing service answered {}",
				body.code
			)));
		}
		let route = body
			.routes
			.into_iter()
			.next()
			.ok_or_else(|| MapError::GeometryUnavailable("no route in response".into()))?;
		let points: Vec<LatLng> = route
			.geometry
			.coordinates
			.into_iter()
			.filter_map(|[lng, lat]| LatLng::new(lat, lng).validated().ok())
			.collect();

		if points.is_empty() {
			Err(MapError::GeometryUnavailable("empty geometry".into()))
		} else {
			Ok(points)
		}
	}
}

/// Direct segment between the two points.
#[derive(Clone, Copy, Debug, Default)]
pub struct StraightLineFetcher;

impl GeometryFetcher for StraightLineFetcher {
	async fn fetch(&self, from: LatLng, to: LatLng) -> Result<Vec<LatLng>> {
		let (from, to) = (from.validated()?, to.validated()?);
		if from == to {
			Ok(vec![from])
		} else {
			Ok(vec![from, to])
		}
	}
}

/// The fetcher a map surface was configured with.
#[derive(Clone, Debug)]
pub enum RouteSource {
	Osrm(OsrmFetcher),
	Straight(StraightLineFetcher),
}

impl From<&PathSource> for RouteSource {
	fn from(source: &PathSource) -> Self {
		match source {
			PathSource::Routed { base_url } => RouteSource::Osrm(OsrmFetcher::new(base_url.clone())),
			PathSource::Straight => RouteSource::Straight(StraightLineFetcher),
		}
	}
}

impl GeometryFetcher for RouteSource {
	async fn fetch(&self, from: LatLng, to: LatLng) -> Result<Vec<LatLng>> {
		match self {
			RouteSource::Osrm(f) => f.fetch(from, to).await,
			RouteSource::Straight(f) => f.fetch(from, to).await,
		}
	}
}
