pub mod map_surface;
