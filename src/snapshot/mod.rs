//! Persisting the stack state snapshot.
//!
//! A snapshot is written once, atomically, at the end of a successful run.
//! [`SnapshotView`] renders it for humans with opaque bytes base64-encoded.

pub mod atomic;
pub mod codec;
pub mod store;

pub use atomic::AtomicWriter;
pub use codec::{decode_snapshot, encode_snapshot};
pub use store::{read_snapshot, write_snapshot, SnapshotView};
