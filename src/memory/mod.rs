//! Memory access over a foreign address space
//!
//! Raw and typed reads/writes, pointer-chain resolution, and
//! signature scanning, all routed through a [`ProcessSession`].
//!
//! [`ProcessSession`]: crate::session::ProcessSession

pub mod chain;
pub mod region;
pub mod scan;
pub mod typed;

pub use region::{MemoryRegion, MemoryState, MemoryType, RegionIter};
pub use scan::Signature;
pub use typed::StringEncoding;
