mod component;
mod config;
mod error;
mod geometry;
mod layers;
mod motion;
mod popup;
mod projection;
mod render;
mod route_cache;
mod scene;
mod session;
mod tiles;
mod types;

pub use component::MapSurface;
pub use config::{GapPolicy, MapConfig};
pub use types::{LatLng, Node, NodeCategory, Route, RouteStatus, Selection};

#[cfg(test)]
pub(crate) use types::validate_network;
