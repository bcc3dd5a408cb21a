//! Unified error types for burrow

use core::fmt;

/// all errors that can occur in burrow
#[derive(Debug)]
pub enum BurrowError {
    // === session ===
    /// operation attempted on a session with no open handle
    SessionClosed,

    /// no running process matched the given image name
    ProcessNotFound { name: String },

    /// OpenProcess refused the handle
    OpenFailed { pid: u32, code: u32 },

    // === memory primitives ===
    /// memory read operation failed
    ReadFailed { address: usize, size: usize },

    /// memory write operation failed
    WriteFailed { address: usize, size: usize },

    /// VirtualQueryEx failed at address
    QueryFailed { address: usize },

    /// memory allocation failed in the target
    AllocationFailed { size: usize, protection: u32 },

    /// releasing a foreign allocation failed
    FreeFailed { address: usize },

    /// address rejected by the null/low-memory guard
    GuardedAddress { address: usize },

    // === input ===
    /// a token in a hex byte/offset string did not parse
    ParseFailed { token: String },

    /// module with given name not loaded in the target
    ModuleNotFound { name: String },

    // === caves ===
    /// fewer donor bytes replaced than a near jump needs
    PatchTooShort { replaced: usize },

    /// jump displacement does not fit in a signed 32-bit field
    DisplacementOutOfRange { from: usize, to: usize },

    /// no free, granularity-aligned block within rel32 reach of the donor
    NoReachableBlock { donor: usize },

    // === win32 ===
    /// underlying Win32 API returned error
    Win32Error { code: u32, context: &'static str },
}

impl fmt::Display for BurrowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionClosed => {
                write!(f, "session has no open process handle")
            }
            Self::ProcessNotFound { name } => {
                write!(f, "no running process named {name}")
            }
            Self::OpenFailed { pid, code } => {
                write!(f, "failed to open process {pid} (error {code:#x})")
            }
            Self::ReadFailed { address, size } => {
                write!(f, "failed to read {size} bytes at {address:#x}")
            }
            Self::WriteFailed { address, size } => {
                write!(f, "failed to write {size} bytes at {address:#x}")
            }
            Self::QueryFailed { address } => {
                write!(f, "failed to query region at {address:#x}")
            }
            Self::AllocationFailed { size, protection } => {
                write!(
                    f,
                    "failed to allocate {size} bytes with protection {protection:#x}"
                )
            }
            Self::FreeFailed { address } => {
                write!(f, "failed to release allocation at {address:#x}")
            }
            Self::GuardedAddress { address } => {
                write!(f, "address {address:#x} is in the guarded low range")
            }
            Self::ParseFailed { token } => {
                write!(f, "malformed hex token: {token:?}")
            }
            Self::ModuleNotFound { name } => {
                write!(f, "module not found: {name}")
            }
            Self::PatchTooShort { replaced } => {
                write!(f, "{replaced} replaced bytes cannot hold a 5-byte near jump")
            }
            Self::DisplacementOutOfRange { from, to } => {
                write!(f, "jump {from:#x} -> {to:#x} exceeds rel32 range")
            }
            Self::NoReachableBlock { donor } => {
                write!(f, "no executable block reachable from donor {donor:#x}")
            }
            Self::Win32Error { code, context } => {
                write!(f, "Win32 error {code:#x} in {context}")
            }
        }
    }
}

impl std::error::Error for BurrowError {}

/// result type alias using BurrowError
pub type Result<T> = std::result::Result<T, BurrowError>;

impl BurrowError {
    /// create Win32Error from GetLastError
    pub fn from_last_error(context: &'static str) -> Self {
        // SAFETY: GetLastError is always safe to call
        let code = unsafe { GetLastError() };
        Self::Win32Error { code, context }
    }
}

#[link(name = "kernel32")]
extern "system" {
    fn GetLastError() -> u32;
}
