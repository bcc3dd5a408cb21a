//! Process attachment and snapshot enumeration

mod process;
mod snapshot;

pub use process::ProcessSession;
pub use snapshot::{
    enumerate_modules, enumerate_processes, find_process_by_name, ModuleSnapshot, ProcessEntry,
};
