pub mod address;
pub mod event;
pub mod snapshot;

pub use address::*;
pub use event::*;
pub use snapshot::*;
