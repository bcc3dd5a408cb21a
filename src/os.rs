//! Typed wrappers over the host process-memory primitives
//!
//! Everything the rest of the crate does against a foreign address
//! space funnels through the eight calls in this module. Failures are
//! surfaced as [`BurrowError`] values at the immediate caller and
//! never propagate as panics.

use crate::error::{BurrowError, Result};
use crate::memory::region::{MemoryRegion, MemoryState, MemoryType};
use std::sync::OnceLock;

// memory state constants
pub const MEM_COMMIT: u32 = 0x1000;
pub const MEM_RESERVE: u32 = 0x2000;
pub const MEM_FREE: u32 = 0x10000;
pub const MEM_RELEASE: u32 = 0x8000;

// memory type constants
pub const MEM_IMAGE: u32 = 0x1000000;
pub const MEM_MAPPED: u32 = 0x40000;
pub const MEM_PRIVATE: u32 = 0x20000;

// page protection constants
pub const PAGE_NOACCESS: u32 = 0x01;
pub const PAGE_READONLY: u32 = 0x02;
pub const PAGE_READWRITE: u32 = 0x04;
pub const PAGE_WRITECOPY: u32 = 0x08;
pub const PAGE_EXECUTE: u32 = 0x10;
pub const PAGE_EXECUTE_READ: u32 = 0x20;
pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;
pub const PAGE_EXECUTE_WRITECOPY: u32 = 0x80;

// process access rights
pub const PROCESS_ALL_ACCESS: u32 = 0x001F_FFFF;
pub const PROCESS_VM_OPERATION: u32 = 0x0008;
pub const PROCESS_VM_READ: u32 = 0x0010;
pub const PROCESS_VM_WRITE: u32 = 0x0020;
pub const PROCESS_QUERY_INFORMATION: u32 = 0x0400;

/// process access rights configuration
#[derive(Debug, Clone, Copy)]
pub struct ProcessAccess {
    pub rights: u32,
}

impl ProcessAccess {
    pub const fn all() -> Self {
        Self { rights: PROCESS_ALL_ACCESS }
    }

    pub const fn read_write() -> Self {
        Self {
            rights: PROCESS_VM_READ | PROCESS_VM_WRITE | PROCESS_VM_OPERATION | PROCESS_QUERY_INFORMATION,
        }
    }

    pub const fn read_only() -> Self {
        Self {
            rights: PROCESS_VM_READ | PROCESS_QUERY_INFORMATION,
        }
    }

    pub const fn query() -> Self {
        Self {
            rights: PROCESS_QUERY_INFORMATION,
        }
    }

    pub const fn custom(rights: u32) -> Self {
        Self { rights }
    }
}

impl Default for ProcessAccess {
    fn default() -> Self {
        Self::all()
    }
}

/// host memory layout parameters, queried once per process
#[derive(Debug, Clone, Copy)]
pub struct SystemInfo {
    pub page_size: usize,
    pub allocation_granularity: usize,
    pub min_app_addr: usize,
    pub max_app_addr: usize,
}

static SYSTEM_INFO: OnceLock<SystemInfo> = OnceLock::new();

/// cached system memory parameters
pub fn system_info() -> &'static SystemInfo {
    SYSTEM_INFO.get_or_init(|| {
        let mut raw = SystemInfoRaw::default();
        // SAFETY: GetSystemInfo fills the caller-provided struct and cannot fail
        unsafe { GetSystemInfo(&mut raw) };
        SystemInfo {
            page_size: raw.page_size as usize,
            allocation_granularity: raw.allocation_granularity as usize,
            min_app_addr: raw.minimum_application_address,
            max_app_addr: raw.maximum_application_address,
        }
    })
}

/// open a process by PID with the given access rights
pub fn open_process(pid: u32, access: ProcessAccess) -> Result<usize> {
    // SAFETY: OpenProcess has no pointer arguments
    let handle = unsafe { OpenProcess(access.rights, 0, pid) };
    if handle == 0 {
        // SAFETY: GetLastError is always safe to call
        let code = unsafe { GetLastError() };
        Err(BurrowError::OpenFailed { pid, code })
    } else {
        Ok(handle)
    }
}

/// close a process handle; true on success
pub fn close_handle(handle: usize) -> bool {
    if handle == 0 {
        return false;
    }
    // SAFETY: closing an owned handle
    unsafe { CloseHandle(handle) != 0 }
}

/// read foreign memory into `buf`, returning the byte count actually copied
pub fn read_process_memory(handle: usize, address: usize, buf: &mut [u8]) -> Result<usize> {
    let mut bytes_read: usize = 0;
    // SAFETY: buf is valid for buf.len() bytes; the OS validates the foreign range
    let ok = unsafe {
        ReadProcessMemory(
            handle,
            address as *const core::ffi::c_void,
            buf.as_mut_ptr() as *mut core::ffi::c_void,
            buf.len(),
            &mut bytes_read,
        )
    };
    if ok == 0 {
        Err(BurrowError::ReadFailed {
            address,
            size: buf.len(),
        })
    } else {
        Ok(bytes_read)
    }
}

/// write `bytes` into foreign memory, returning the byte count copied
pub fn write_process_memory(handle: usize, address: usize, bytes: &[u8]) -> Result<usize> {
    let mut bytes_written: usize = 0;
    // SAFETY: bytes is valid for bytes.len() bytes; the OS validates the foreign range
    let ok = unsafe {
        WriteProcessMemory(
            handle,
            address as *mut core::ffi::c_void,
            bytes.as_ptr() as *const core::ffi::c_void,
            bytes.len(),
            &mut bytes_written,
        )
    };
    if ok == 0 {
        Err(BurrowError::WriteFailed {
            address,
            size: bytes.len(),
        })
    } else {
        Ok(bytes_written)
    }
}

/// query the memory region containing `address` in the foreign process
pub fn query_region(handle: usize, address: usize) -> Result<MemoryRegion> {
    let mut mbi = MemoryBasicInformation::default();
    // SAFETY: mbi is a properly sized out-buffer
    let len = unsafe {
        VirtualQueryEx(
            handle,
            address as *const core::ffi::c_void,
            &mut mbi,
            core::mem::size_of::<MemoryBasicInformation>(),
        )
    };
    if len == 0 {
        return Err(BurrowError::QueryFailed { address });
    }

    let state = match mbi.state {
        MEM_COMMIT => MemoryState::Commit,
        MEM_RESERVE => MemoryState::Reserve,
        _ => MemoryState::Free,
    };

    let memory_type = match mbi.memory_type {
        MEM_IMAGE => MemoryType::Image,
        MEM_MAPPED => MemoryType::Mapped,
        MEM_PRIVATE => MemoryType::Private,
        _ => MemoryType::Unknown,
    };

    Ok(MemoryRegion {
        base_address: mbi.base_address,
        allocation_base: mbi.allocation_base,
        allocation_protect: mbi.allocation_protect,
        region_size: mbi.region_size,
        state,
        protect: mbi.protect,
        memory_type,
    })
}

/// allocate committed memory in the foreign process
///
/// `hint` of 0 lets the OS pick the address. A non-zero hint is
/// rounded down to the allocation granularity by the OS; the call
/// fails rather than relocating when the hinted range is occupied.
pub fn alloc_in_process(handle: usize, hint: usize, size: usize, protect: u32) -> Result<usize> {
    // SAFETY: no caller-owned pointers cross the boundary
    let base = unsafe {
        VirtualAllocEx(
            handle,
            hint as *mut core::ffi::c_void,
            size,
            MEM_COMMIT | MEM_RESERVE,
            protect,
        )
    };
    if base.is_null() {
        Err(BurrowError::AllocationFailed {
            size,
            protection: protect,
        })
    } else {
        Ok(base as usize)
    }
}

/// release an allocation in the foreign process (whole region, not decommit)
pub fn free_in_process(handle: usize, address: usize) -> Result<()> {
    // SAFETY: release of a previously returned allocation base
    let ok = unsafe { VirtualFreeEx(handle, address as *mut core::ffi::c_void, 0, MEM_RELEASE) };
    if ok == 0 {
        Err(BurrowError::FreeFailed { address })
    } else {
        Ok(())
    }
}

// internal structure for VirtualQueryEx
#[repr(C)]
#[derive(Default)]
struct MemoryBasicInformation {
    base_address: usize,
    allocation_base: usize,
    allocation_protect: u32,
    #[cfg(target_arch = "x86_64")]
    partition_id: u16,
    region_size: usize,
    state: u32,
    protect: u32,
    memory_type: u32,
}

// internal structure for GetSystemInfo
#[repr(C)]
#[derive(Default)]
struct SystemInfoRaw {
    processor_architecture: u16,
    reserved: u16,
    page_size: u32,
    minimum_application_address: usize,
    maximum_application_address: usize,
    active_processor_mask: usize,
    number_of_processors: u32,
    processor_type: u32,
    allocation_granularity: u32,
    processor_level: u16,
    processor_revision: u16,
}

#[link(name = "kernel32")]
extern "system" {
    fn OpenProcess(desired_access: u32, inherit_handle: i32, process_id: u32) -> usize;
    fn CloseHandle(handle: usize) -> i32;
    fn ReadProcessMemory(
        process: usize,
        base_address: *const core::ffi::c_void,
        buffer: *mut core::ffi::c_void,
        size: usize,
        bytes_read: *mut usize,
    ) -> i32;
    fn WriteProcessMemory(
        process: usize,
        base_address: *mut core::ffi::c_void,
        buffer: *const core::ffi::c_void,
        size: usize,
        bytes_written: *mut usize,
    ) -> i32;
    fn VirtualQueryEx(
        process: usize,
        address: *const core::ffi::c_void,
        buffer: *mut MemoryBasicInformation,
        length: usize,
    ) -> usize;
    fn VirtualAllocEx(
        process: usize,
        address: *mut core::ffi::c_void,
        size: usize,
        allocation_type: u32,
        protect: u32,
    ) -> *mut core::ffi::c_void;
    fn VirtualFreeEx(
        process: usize,
        address: *mut core::ffi::c_void,
        size: usize,
        free_type: u32,
    ) -> i32;
    fn GetSystemInfo(info: *mut SystemInfoRaw);
    fn GetLastError() -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_info() {
        let info = system_info();
        assert!(info.page_size >= 0x1000);
        assert_eq!(info.allocation_granularity % info.page_size, 0);
        assert!(info.min_app_addr >= 0x10000);
        assert!(info.max_app_addr > info.min_app_addr);
    }

    #[test]
    fn test_open_close_self() {
        let pid = std::process::id();
        let handle = open_process(pid, ProcessAccess::read_only()).expect("should open self");
        assert!(handle != 0);
        assert!(close_handle(handle));
    }

    #[test]
    fn test_close_zero_handle() {
        assert!(!close_handle(0));
    }

    #[test]
    fn test_alloc_write_read_free() {
        let pid = std::process::id();
        let handle = open_process(pid, ProcessAccess::all()).expect("should open self");

        let base = alloc_in_process(handle, 0, 0x1000, PAGE_READWRITE).expect("should allocate");
        assert!(base != 0);

        let data = [0xAAu8, 0xBB, 0xCC, 0xDD];
        let written = write_process_memory(handle, base, &data).expect("should write");
        assert_eq!(written, data.len());

        let mut buf = [0u8; 4];
        let read = read_process_memory(handle, base, &mut buf).expect("should read");
        assert_eq!(read, 4);
        assert_eq!(buf, data);

        free_in_process(handle, base).expect("should free");
        assert!(close_handle(handle));
    }

    #[test]
    fn test_query_region_self() {
        let pid = std::process::id();
        let handle = open_process(pid, ProcessAccess::query()).expect("should open self");

        // query our own code
        let region = query_region(handle, test_query_region_self as usize).expect("should query");
        assert_eq!(region.state, MemoryState::Commit);
        assert!(region.is_executable());

        assert!(close_handle(handle));
    }

    #[test]
    fn test_query_unmapped_tail_fails() {
        let pid = std::process::id();
        let handle = open_process(pid, ProcessAccess::query()).expect("should open self");

        // past the last application address nothing is queryable
        let info = system_info();
        assert!(query_region(handle, info.max_app_addr + 0x10000).is_err());

        assert!(close_handle(handle));
    }
}
