//! Session owning the foreign-process handle
//!
//! A [`ProcessSession`] is the single gateway to a target: it owns the
//! OS handle, caches the module list taken at attach time, and routes
//! every memory operation in the crate. A session whose handle has
//! been closed fails every operation with `SessionClosed` instead of
//! handing a stale handle to the OS.

use log::debug;

use super::snapshot::{enumerate_modules, find_process_by_name, ModuleSnapshot};
use crate::error::{BurrowError, Result};
use crate::memory::region::{MemoryRegion, RegionIter};
use crate::os::{self, ProcessAccess};
use crate::parse;

/// handle to a foreign process plus its module table
pub struct ProcessSession {
    pid: u32,
    handle: usize,
    modules: Vec<ModuleSnapshot>,
}

impl ProcessSession {
    /// attach to the first process whose image name matches (case-insensitive)
    pub fn attach(name: &str) -> Result<Self> {
        let pid = find_process_by_name(name)?.ok_or_else(|| BurrowError::ProcessNotFound {
            name: name.to_string(),
        })?;
        Self::attach_pid(pid)
    }

    /// attach to a process by PID with all-access rights
    pub fn attach_pid(pid: u32) -> Result<Self> {
        let handle = os::open_process(pid, ProcessAccess::all())?;
        let modules = enumerate_modules(pid).unwrap_or_default();
        debug!(
            "attached to pid {} ({} modules), handle {:#x}",
            pid,
            modules.len(),
            handle
        );
        Ok(Self {
            pid,
            handle,
            modules,
        })
    }

    /// attach to a different process, closing any live handle first
    pub fn reattach(&mut self, name: &str) -> Result<()> {
        self.close();
        *self = Self::attach(name)?;
        Ok(())
    }

    /// close the handle and zero it; idempotent
    pub fn close(&mut self) -> bool {
        if self.handle == 0 {
            return true;
        }
        let closed = os::close_handle(self.handle);
        debug!("detached from pid {}", self.pid);
        self.handle = 0;
        self.modules.clear();
        closed
    }

    /// whether the session currently holds an open handle
    pub fn is_attached(&self) -> bool {
        self.handle != 0
    }

    /// target process id
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// raw process handle (0 when detached)
    pub fn handle(&self) -> usize {
        self.handle
    }

    /// handle for OS calls, refusing a closed session
    pub(crate) fn live_handle(&self) -> Result<usize> {
        if self.handle == 0 {
            Err(BurrowError::SessionClosed)
        } else {
            Ok(self.handle)
        }
    }

    /// module list snapshot taken at attach time
    pub fn modules(&self) -> &[ModuleSnapshot] {
        &self.modules
    }

    /// re-snapshot the target's module list
    pub fn refresh_modules(&mut self) -> Result<()> {
        self.live_handle()?;
        self.modules = enumerate_modules(self.pid)?;
        Ok(())
    }

    /// find a loaded module by name
    pub fn module(&self, name: &str) -> Result<&ModuleSnapshot> {
        self.modules
            .iter()
            .find(|m| m.is_named(name))
            .ok_or_else(|| BurrowError::ModuleNotFound {
                name: name.to_string(),
            })
    }

    /// base address of a loaded module, 0 if absent
    pub fn module_base(&self, name: &str) -> usize {
        self.module(name).map(|m| m.base).unwrap_or(0)
    }

    /// resolve `"<module>"` or `"<module>+<hex>"` to an address
    ///
    /// spaces are stripped before the split; returns 0 for empty
    /// input, a malformed offset, or a module that is not loaded.
    pub fn resolve_symbolic(&self, text: &str) -> usize {
        let Some((module, offset)) = parse::split_symbolic(text) else {
            return 0;
        };
        let base = self.module_base(&module);
        if base == 0 {
            return 0;
        }
        base.wrapping_add(offset as usize)
    }

    /// query the region containing `address` in the target
    pub fn query_region(&self, address: usize) -> Result<MemoryRegion> {
        os::query_region(self.live_handle()?, address)
    }

    /// iterate the target's memory regions starting at `address`
    pub fn regions_from(&self, address: usize) -> Result<RegionIter> {
        Ok(RegionIter::from_address(self.live_handle()?, address))
    }

    /// allocate committed memory in the target
    pub fn alloc(&self, hint: usize, size: usize, protect: u32) -> Result<usize> {
        os::alloc_in_process(self.live_handle()?, hint, size, protect)
    }

    /// release an allocation in the target
    pub fn free(&self, address: usize) -> Result<()> {
        os::free_in_process(self.live_handle()?, address)
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if self.handle != 0 {
            os::close_handle(self.handle);
            self.handle = 0;
        }
    }
}

// SAFETY: the handle is process-wide, not thread-affine
unsafe impl Send for ProcessSession {}
