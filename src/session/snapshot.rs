//! Toolhelp snapshots of processes and their module lists

use crate::error::{BurrowError, Result};

/// system process entry
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub pid: u32,
    pub parent_pid: u32,
    pub name: String,
    pub thread_count: u32,
}

/// a loaded module in a foreign process
#[derive(Debug, Clone)]
pub struct ModuleSnapshot {
    pub name: String,
    pub path: String,
    pub base: usize,
    pub size: usize,
}

impl ModuleSnapshot {
    /// case-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// enumerate all running processes
pub fn enumerate_processes() -> Result<Vec<ProcessEntry>> {
    let mut processes = Vec::new();

    // SAFETY: CreateToolhelp32Snapshot is safe to call
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) };
    if snapshot == INVALID_HANDLE_VALUE {
        return Err(BurrowError::from_last_error("CreateToolhelp32Snapshot"));
    }

    let mut entry = ProcessEntry32W::default();
    entry.size = core::mem::size_of::<ProcessEntry32W>() as u32;

    // SAFETY: entry is properly initialized
    let mut success = unsafe { Process32FirstW(snapshot, &mut entry) };

    while success != 0 {
        let name_end = entry.exe_file.iter().position(|&c| c == 0).unwrap_or(260);
        let name = String::from_utf16_lossy(&entry.exe_file[..name_end]);

        processes.push(ProcessEntry {
            pid: entry.process_id,
            parent_pid: entry.parent_process_id,
            name,
            thread_count: entry.threads,
        });

        // SAFETY: entry is properly initialized
        success = unsafe { Process32NextW(snapshot, &mut entry) };
    }

    // SAFETY: valid snapshot handle
    unsafe { CloseHandle(snapshot) };

    Ok(processes)
}

/// find the first process whose image name matches (case-insensitive)
pub fn find_process_by_name(name: &str) -> Result<Option<u32>> {
    let processes = enumerate_processes()?;
    Ok(processes
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .map(|p| p.pid))
}

/// enumerate the modules loaded in a process
pub fn enumerate_modules(pid: u32) -> Result<Vec<ModuleSnapshot>> {
    let mut modules = Vec::new();

    // SAFETY: CreateToolhelp32Snapshot is safe to call
    let snapshot =
        unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) };
    if snapshot == INVALID_HANDLE_VALUE {
        return Err(BurrowError::from_last_error("CreateToolhelp32Snapshot"));
    }

    let mut entry = ModuleEntry32W::default();
    entry.size = core::mem::size_of::<ModuleEntry32W>() as u32;

    // SAFETY: entry is properly initialized
    let mut success = unsafe { Module32FirstW(snapshot, &mut entry) };

    while success != 0 {
        let name_end = entry.module_name.iter().position(|&c| c == 0).unwrap_or(256);
        let path_end = entry.exe_path.iter().position(|&c| c == 0).unwrap_or(260);

        modules.push(ModuleSnapshot {
            name: String::from_utf16_lossy(&entry.module_name[..name_end]),
            path: String::from_utf16_lossy(&entry.exe_path[..path_end]),
            base: entry.mod_base_addr,
            size: entry.mod_base_size as usize,
        });

        // SAFETY: entry is properly initialized
        success = unsafe { Module32NextW(snapshot, &mut entry) };
    }

    // SAFETY: valid snapshot handle
    unsafe { CloseHandle(snapshot) };

    Ok(modules)
}

// ============================================================================
// Win32 FFI Declarations
// ============================================================================

const TH32CS_SNAPPROCESS: u32 = 0x00000002;
const TH32CS_SNAPMODULE: u32 = 0x00000008;
const TH32CS_SNAPMODULE32: u32 = 0x00000010;
const INVALID_HANDLE_VALUE: usize = usize::MAX;

#[repr(C)]
struct ProcessEntry32W {
    size: u32,
    cnt_usage: u32,
    process_id: u32,
    default_heap_id: usize,
    module_id: u32,
    threads: u32,
    parent_process_id: u32,
    pri_class_base: i32,
    flags: u32,
    exe_file: [u16; 260],
}

impl Default for ProcessEntry32W {
    fn default() -> Self {
        Self {
            size: 0,
            cnt_usage: 0,
            process_id: 0,
            default_heap_id: 0,
            module_id: 0,
            threads: 0,
            parent_process_id: 0,
            pri_class_base: 0,
            flags: 0,
            exe_file: [0u16; 260],
        }
    }
}

#[repr(C)]
struct ModuleEntry32W {
    size: u32,
    module_id: u32,
    process_id: u32,
    glblcnt_usage: u32,
    proccnt_usage: u32,
    mod_base_addr: usize,
    mod_base_size: u32,
    module_handle: usize,
    module_name: [u16; 256],
    exe_path: [u16; 260],
}

impl Default for ModuleEntry32W {
    fn default() -> Self {
        Self {
            size: 0,
            module_id: 0,
            process_id: 0,
            glblcnt_usage: 0,
            proccnt_usage: 0,
            mod_base_addr: 0,
            mod_base_size: 0,
            module_handle: 0,
            module_name: [0u16; 256],
            exe_path: [0u16; 260],
        }
    }
}

#[link(name = "kernel32")]
extern "system" {
    fn CreateToolhelp32Snapshot(flags: u32, process_id: u32) -> usize;
    fn Process32FirstW(snapshot: usize, entry: *mut ProcessEntry32W) -> i32;
    fn Process32NextW(snapshot: usize, entry: *mut ProcessEntry32W) -> i32;
    fn Module32FirstW(snapshot: usize, entry: *mut ModuleEntry32W) -> i32;
    fn Module32NextW(snapshot: usize, entry: *mut ModuleEntry32W) -> i32;
    fn CloseHandle(handle: usize) -> i32;
}
