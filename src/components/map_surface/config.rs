pub const OSRM_DRIVING_URL: &str = "https://router.project-osrm.org/route/v1/driving";
pub const CARTO_DARK_TILES: &str =
	"https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png";

pub const DEFAULT_SPEED_PER_MS: f64 = 0.003;
pub const DEFAULT_SEED_FRACTION: f64 = 0.3;
pub const DEFAULT_RELAYOUT_DELAY_MS: i32 = 100;

/// Where route geometry comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum PathSource {
	/// Street-level polylines from an OSRM-compatible routing service.
	Routed { base_url: String },
	/// Straight segments between consecutive stops, no network.
	Straight,
}

/// How a route is assembled when some of its segments fail to resolve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GapPolicy {
	/// Concatenate the segments that resolved and skip the rest.
	#[default]
	Skip,
	/// Leave the route out entirely if any segment fails.
	DropRoute,
	/// Substitute a straight line for each failed segment.
	StraightLine,
}

/// Line weights and opacities for route paths. Each route is a translucent
/// glow under a main line; the `*_selected` values apply to the selected route.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteStyle {
	pub glow_weight: f64,
	pub glow_weight_selected: f64,
	pub glow_opacity: f64,
	pub line_weight: f64,
	pub line_weight_selected: f64,
	pub line_opacity: f64,
	pub line_opacity_selected: f64,
	/// Dash every route whose status is not active.
	pub dash_inactive: bool,
}

impl RouteStyle {
	pub const FLEET: RouteStyle = RouteStyle {
		glow_weight: 8.0,
		glow_weight_selected: 12.0,
		glow_opacity: 0.2,
		line_weight: 3.0,
		line_weight_selected: 5.0,
		line_opacity: 0.7,
		line_opacity_selected: 1.0,
		dash_inactive: false,
	};

	pub const FLOWS: RouteStyle = RouteStyle {
		glow_weight: 10.0,
		glow_weight_selected: 14.0,
		glow_opacity: 0.2,
		line_weight: 4.0,
		line_weight_selected: 6.0,
		line_opacity: 0.8,
		line_opacity_selected: 1.0,
		dash_inactive: true,
	};
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapConfig {
	pub path_source: PathSource,
	pub tile_url: String,
	pub tile_subdomains: Vec<char>,
	pub min_zoom: f64,
	pub max_zoom: f64,
	/// Path points advanced per millisecond.
	pub speed_per_ms: f64,
	/// Upper bound of the random start position, as a fraction of path length.
	pub seed_fraction: f64,
	pub gap_policy: GapPolicy,
	pub route_style: RouteStyle,
	pub relayout_delay_ms: i32,
	/// Label customer markers 1, 2, 3... instead of with their category emoji.
	pub number_customers: bool,
}

impl Default for MapConfig {
	fn default() -> Self {
		Self {
			path_source: PathSource::Routed {
				base_url: OSRM_DRIVING_URL.into(),
			},
			tile_url: CARTO_DARK_TILES.into(),
			tile_subdomains: vec!['a', 'b', 'c', 'd'],
			min_zoom: 2.0,
			max_zoom: 19.0,
			speed_per_ms: DEFAULT_SPEED_PER_MS,
			seed_fraction: DEFAULT_SEED_FRACTION,
			gap_policy: GapPolicy::default(),
			route_style: RouteStyle::FLEET,
			relayout_delay_ms: DEFAULT_RELAYOUT_DELAY_MS,
			number_customers: false,
		}
	}
}

impl MapConfig {
	/// Street-routed trucks with numbered customer stops.
	pub fn fleet() -> Self {
		Self {
			number_customers: true,
			..Self::default()
		}
	}

	/// Straight material flows with slow vehicles spread over the whole segment.
	pub fn supply_chain() -> Self {
		Self {
			route_style: RouteStyle::FLOWS,
			relayout_delay_ms: 50,
			..Self::default()
		}
		.with_path_source(PathSource::Straight)
		.with_speed(0.0002)
		.with_seed_fraction(0.5)
	}

	pub fn with_path_source(mut self, source: PathSource) -> Self {
		self.path_source = source;
		self
	}

	pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
		self.gap_policy = policy;
		self
	}

	pub fn with_speed(mut self, speed_per_ms: f64) -> Self {
		self.speed_per_ms = speed_per_ms;
		self
	}

	pub fn with_seed_fraction(mut self, fraction: f64) -> Self {
		self.seed_fraction = fraction;
		self
	}

	pub fn clamp_zoom(&self, zoom: f64) -> f64 {
		zoom.clamp(self.min_zoom, self.max_zoom)
	}
}
