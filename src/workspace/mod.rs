//! Reading and classifying the workspace's resource addresses.

pub mod classifier;
pub mod lister;

pub use classifier::{is_fully_modular, top_level_modules};
pub use lister::{parse_state_list, ResourceLister, TerraformStateLister};
