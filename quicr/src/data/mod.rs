//! Object framings for unidirectional data streams and datagrams.
//!
//! Each data stream starts with a varint type selecting a subgroup or fetch
//! header, followed by a sequence of object framings until FIN. Datagrams
//! carry exactly one object each.

mod datagram;
mod fetch;
mod header;
mod object_status;
mod subgroup;

pub use datagram::*;
pub use fetch::*;
pub use header::*;
pub use object_status::*;
pub use subgroup::*;
