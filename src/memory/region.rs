//! Memory region descriptors for a foreign address space

use crate::os;

/// memory region information, mirroring the OS query result
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub base_address: usize,
    pub allocation_base: usize,
    pub allocation_protect: u32,
    pub region_size: usize,
    pub state: MemoryState,
    pub protect: u32,
    pub memory_type: MemoryType,
}

/// memory state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryState {
    Commit,
    Reserve,
    Free,
}

/// memory type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Image,   // mapped executable image
    Mapped,  // memory-mapped file
    Private, // private memory
    Unknown,
}

impl MemoryRegion {
    /// check if region is committed (accessible)
    pub fn is_committed(&self) -> bool {
        self.state == MemoryState::Commit
    }

    /// check if region is free (unreserved)
    pub fn is_free(&self) -> bool {
        self.state == MemoryState::Free
    }

    /// check if region is readable
    pub fn is_readable(&self) -> bool {
        matches!(
            self.protect,
            os::PAGE_READONLY
                | os::PAGE_READWRITE
                | os::PAGE_WRITECOPY
                | os::PAGE_EXECUTE_READ
                | os::PAGE_EXECUTE_READWRITE
                | os::PAGE_EXECUTE_WRITECOPY
        )
    }

    /// check if region is writable
    pub fn is_writable(&self) -> bool {
        matches!(
            self.protect,
            os::PAGE_READWRITE
                | os::PAGE_WRITECOPY
                | os::PAGE_EXECUTE_READWRITE
                | os::PAGE_EXECUTE_WRITECOPY
        )
    }

    /// check if region is executable
    pub fn is_executable(&self) -> bool {
        matches!(
            self.protect,
            os::PAGE_EXECUTE
                | os::PAGE_EXECUTE_READ
                | os::PAGE_EXECUTE_READWRITE
                | os::PAGE_EXECUTE_WRITECOPY
        )
    }

    /// first address past the region
    pub fn end(&self) -> usize {
        self.base_address + self.region_size
    }

    /// get protection string (e.g., "RWX", "R--")
    pub fn protection_string(&self) -> &'static str {
        match self.protect {
            os::PAGE_NOACCESS => "---",
            os::PAGE_READONLY => "R--",
            os::PAGE_READWRITE => "RW-",
            os::PAGE_WRITECOPY => "RC-",
            os::PAGE_EXECUTE => "--X",
            os::PAGE_EXECUTE_READ => "R-X",
            os::PAGE_EXECUTE_READWRITE => "RWX",
            os::PAGE_EXECUTE_WRITECOPY => "RCX",
            _ => "???",
        }
    }
}

/// iterator over the memory regions of a foreign process
///
/// walks the address space region by region via the query primitive;
/// terminates at the first failing query (past the last mapping).
pub struct RegionIter {
    handle: usize,
    cursor: usize,
    max_address: usize,
}

impl RegionIter {
    /// create an iterator over `handle`'s address space from address 0
    pub fn new(handle: usize) -> Self {
        Self::from_address(handle, 0)
    }

    /// create an iterator starting at a specific address
    pub fn from_address(handle: usize, address: usize) -> Self {
        Self {
            handle,
            cursor: address,
            max_address: os::system_info().max_app_addr,
        }
    }
}

impl Iterator for RegionIter {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.max_address {
            return None;
        }

        let region = os::query_region(self.handle, self.cursor).ok()?;

        // advance to next region; bail if the cursor stops moving
        let next = region.end();
        if next <= self.cursor {
            self.max_address = 0;
        } else {
            self.cursor = next;
        }

        Some(region)
    }
}
