#![cfg(windows)]
#![deny(unsafe_op_in_unsafe_fn)]

//! burrow: foreign-process memory inspection and code caves
//!
//! This library attaches to a running Windows process and provides:
//!
//! - Typed reads/writes (integers, floats, strings, bit fields) over
//!   the raw byte primitives
//! - Pointer-chain resolution through multiple levels of indirection
//! - Signature (array-of-bytes) scanning with wildcard support
//! - Code caves: executable regions allocated within rel32 reach of a
//!   donor instruction and wired up with a jump + return trampoline
//! - Symbolic `module+offset` address resolution
//!
//! Everything is synchronous and single-threaded; operations either
//! complete or surface a [`BurrowError`] at the immediate caller. The
//! donor-site patch is a single write but is not atomic with respect
//! to the target's own execution; suspend the target if that matters.
//!
//! ```no_run
//! use burrow::{CaveOptions, ProcessSession, Signature};
//!
//! # fn main() -> burrow::Result<()> {
//! let session = ProcessSession::attach("game.exe")?;
//!
//! let health = session.resolve_code("game.exe+1F0A30", "10 8");
//! let value = session.read_i32(health)?;
//!
//! let hits = session.scan_memory(&Signature::parse("48 8B 05 00 00 00 00")?, 0)?;
//!
//! let cave = session.create_code_cave(
//!     hits[0],
//!     &CaveOptions::with_payload_hex(7, "90 90 90")?,
//! )?;
//! session.free_cave(cave.cave)?;
//! # Ok(())
//! # }
//! ```

pub mod cave;
pub mod error;
pub mod memory;
pub mod os;
pub mod parse;
pub mod session;

// re-exports for convenience
pub use cave::{CaveOptions, CodeCave};
pub use error::{BurrowError, Result};
pub use memory::{MemoryRegion, MemoryState, MemoryType, Signature, StringEncoding};
pub use os::{ProcessAccess, SystemInfo};
pub use session::{ModuleSnapshot, ProcessEntry, ProcessSession};

/// library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
