//! Cave placement: executable memory within rel32 reach of a donor
//!
//! A 5-byte near jump carries a signed 32-bit displacement, so a cave
//! is only usable when it lands within ±2 GiB of the donor site. The
//! search window here is ±0x7000_0000 (1.75 GiB), leaving headroom
//! inside that reach for the trailing trampoline.

use log::debug;

use crate::error::{BurrowError, Result};
use crate::os;
use crate::session::ProcessSession;

/// half-width of the search window around the donor
pub const REACH_WINDOW: usize = 0x7000_0000;

/// hint advance per failed allocation attempt
const RETRY_STEP: usize = 0x10000;

/// allocation attempts before giving up
const MAX_ATTEMPTS: u32 = 10;

impl ProcessSession {
    /// find a free, granularity-aligned block of at least `size` bytes
    /// as close as possible to `donor`
    ///
    /// walks the target's region map across the clamped
    /// `[donor - REACH_WINDOW, donor + REACH_WINDOW]` window and keeps
    /// the aligned candidate with the smallest donor distance. returns
    /// 0 when no free region in the window can hold the block.
    pub fn find_free_block_for_region(&self, donor: usize, size: usize) -> Result<usize> {
        self.live_handle()?;

        let info = os::system_info();
        let granularity = info.allocation_granularity;
        let lo = donor.saturating_sub(REACH_WINDOW).max(info.min_app_addr);
        let hi = donor.saturating_add(REACH_WINDOW).min(info.max_app_addr);

        let mut best: usize = 0;
        let mut cursor = lo;

        loop {
            let region = match self.query_region(cursor) {
                Ok(region) => region,
                Err(_) => break,
            };
            if region.base_address > hi {
                break;
            }

            if region.is_free() && region.region_size > size {
                if let Some(candidate) = aligned_candidate(
                    region.base_address,
                    region.region_size,
                    donor,
                    size,
                    granularity,
                ) {
                    if best == 0 || candidate.abs_diff(donor) < best.abs_diff(donor) {
                        best = candidate;
                    }
                }
            }

            // advance by the granularity-rounded region size; stop when
            // the cursor leaves the window or fails to move forward
            let advance = round_up(region.region_size, granularity);
            let next = region.base_address.saturating_add(advance);
            if next <= cursor || next >= hi {
                break;
            }
            cursor = next;
        }

        Ok(best)
    }

    /// allocate an executable cave of `size` bytes near `donor`
    ///
    /// retries up to ten times, sliding the preferred address forward
    /// one granularity unit per failed attempt. exhaustion surfaces
    /// `NoReachableBlock`; there is no fallback to non-executable
    /// memory, since DEP would fault the trampoline on first entry.
    pub fn allocate_cave(&self, donor: usize, size: usize) -> Result<usize> {
        let mut preferred = donor;

        for attempt in 0..MAX_ATTEMPTS {
            let hint = self.find_free_block_for_region(preferred, size)?;
            if hint != 0 {
                if let Ok(base) = self.alloc(hint, size, os::PAGE_EXECUTE_READWRITE) {
                    debug!(
                        "cave: {size:#x} bytes at {base:#x}, donor {donor:#x} (attempt {attempt})"
                    );
                    return Ok(base);
                }
            }
            preferred = preferred.wrapping_add(RETRY_STEP);
        }

        Err(BurrowError::NoReachableBlock { donor })
    }
}

/// granularity-aligned candidate inside a free region, nearest to the donor
///
/// aligns the region entry upward first; when the region lies below
/// the donor the candidate is shifted last-fit toward the region end
/// (clamped at the donor) and re-aligned downward, so it ends up as
/// close beneath the donor as the granularity allows.
fn aligned_candidate(
    base: usize,
    region_size: usize,
    donor: usize,
    size: usize,
    granularity: usize,
) -> Option<usize> {
    let end = base + region_size;
    let mut candidate = round_up(base, granularity);

    // the tail left after alignment must still hold the block
    if candidate + size > end {
        return None;
    }

    if candidate < donor {
        let last_fit = end - size;
        candidate = last_fit.min(donor);
        candidate -= candidate % granularity;
        if candidate < base || candidate + size > end {
            return None;
        }
    }

    Some(candidate)
}

/// round `value` up to the next multiple of `to`
fn round_up(value: usize, to: usize) -> usize {
    match value % to {
        0 => value,
        rem => value + (to - rem),
    }
}
