use thiserror::Error;

/// Failures of the map core. None of them are fatal to the page: geometry and
/// stale-callback errors are absorbed where they surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
	#[error("invalid coordinate ({lat}, {lng})")]
	InvalidCoordinate { lat: f64, lng: f64 },

	#[error("geometry unavailable: {0}")]
	GeometryUnavailable(String),

	#[error("stale callback for generation {0}")]
	StaleCallback(u64),

	#[error("route {route} references unknown stop {stop}")]
	UnknownStop { route: String, stop: String },
}

impl From<reqwest::Error> for MapError {
	fn from(err: reqwest::Error) -> Self {
		MapError::GeometryUnavailable(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, MapError>;
