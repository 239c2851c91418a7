pub mod components;
pub mod discovery;
pub mod parser;

pub use components::{aggregate_components, ComponentExtractor};
pub use discovery::{find_stack_files, validate_stack_bundle, STACK_COMPONENT_FILE_SUFFIX};
pub use parser::{parse_component_labels, ComponentParseError, HclComponentExtractor, COMPONENT_BLOCK};
