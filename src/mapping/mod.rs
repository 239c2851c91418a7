pub mod builder;

pub use builder::{build_address_map, map_modules, map_resources};
