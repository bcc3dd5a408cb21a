//! Signature scanning over committed regions
//!
//! A signature is a raw byte pattern in which `0x00` is a wildcard
//! matching any byte. The scan walks the target's region map and
//! matches inside every committed, readable region.

use log::debug;

use crate::error::Result;
use crate::parse;
use crate::session::ProcessSession;

/// byte pattern with `0x00` as the wildcard sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    /// build from raw bytes; zero bytes act as wildcards
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// parse the textual form, e.g. "48 8B 33 00 00"
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            bytes: parse::parse_hex_bytes(text)?,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// match against a window of exactly `self.len()` bytes
    fn matches(&self, window: &[u8]) -> bool {
        self.bytes
            .iter()
            .zip(window)
            .all(|(&pat, &byte)| pat == 0 || pat == byte)
    }

    /// offsets of every match within a slice
    pub fn scan_slice(&self, data: &[u8]) -> Vec<usize> {
        if self.is_empty() || data.len() < self.len() {
            return Vec::new();
        }
        data.windows(self.len())
            .enumerate()
            .filter(|(_, window)| self.matches(window))
            .map(|(i, _)| i)
            .collect()
    }
}

impl ProcessSession {
    /// scan the target's committed, readable regions for a signature
    ///
    /// the walk starts at `start` (0 = whole space) and ends past the
    /// last queryable region; matches come back in scan order.
    pub fn scan_memory(&self, signature: &Signature, start: usize) -> Result<Vec<usize>> {
        let mut matches = Vec::new();
        if signature.is_empty() {
            return Ok(matches);
        }

        let mut regions_scanned = 0usize;
        for region in self.regions_from(start)? {
            if !region.is_committed() || !region.is_readable() {
                continue;
            }
            regions_scanned += 1;

            let data = match self.read_bytes(region.base_address, region.region_size) {
                Ok(data) => data,
                Err(_) => continue,
            };
            for offset in signature.scan_slice(&data) {
                matches.push(region.base_address + offset);
            }
        }

        debug!(
            "signature scan: {} regions, {} matches",
            regions_scanned,
            matches.len()
        );
        Ok(matches)
    }

    /// scan using the textual signature form
    pub fn scan_memory_str(&self, pattern: &str, start: usize) -> Result<Vec<usize>> {
        self.scan_memory(&Signature::parse(pattern)?, start)
    }

    /// scan one bounded address range, ignoring the region map
    ///
    /// the whole range must be readable in a single read.
    pub fn scan_range(&self, start: usize, size: usize, signature: &Signature) -> Result<Vec<usize>> {
        let data = self.read_bytes(start, size)?;
        Ok(signature
            .scan_slice(&data)
            .into_iter()
            .map(|offset| start + offset)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::PAGE_READWRITE;

    #[test]
    fn test_scan_slice_exact() {
        let sig = Signature::parse("48 8B 05").unwrap();
        let data = [0x90, 0x48, 0x8B, 0x05, 0x48, 0x8B, 0x05];
        assert_eq!(sig.scan_slice(&data), vec![1, 4]);
    }

    #[test]
    fn test_scan_slice_wildcard() {
        let sig = Signature::parse("48 00 05").unwrap();
        let data = [0x48, 0xFF, 0x05, 0x00, 0x48, 0x11, 0x05];
        assert_eq!(sig.scan_slice(&data), vec![0, 4]);
    }

    #[test]
    fn test_scan_slice_boundaries() {
        let sig = Signature::from_bytes(vec![0xAA, 0xBB]);
        // match flush against the end of the buffer
        assert_eq!(sig.scan_slice(&[0x00, 0xAA, 0xBB]), vec![1]);
        // buffer shorter than the signature
        assert!(sig.scan_slice(&[0xAA]).is_empty());
        assert!(Signature::from_bytes(vec![]).scan_slice(&[1, 2, 3]).is_empty());
    }

    #[test]
    fn test_scan_memory_finds_planted_signature() {
        let session = ProcessSession::attach_pid(std::process::id()).expect("should attach");
        let page = session.alloc(0, 0x1000, PAGE_READWRITE).expect("should allocate");

        let planted = [0x48, 0x8B, 0x05, 0xA3, 0x01, 0x00, 0x00];
        session.write_bytes(page + 0x20, &planted).expect("write");

        // trailing zero tokens act as wildcards
        let hits = session
            .scan_memory_str("48 8B 05 00 00 00 00", page)
            .expect("should scan");
        assert!(hits.contains(&(page + 0x20)));
    }

    #[test]
    fn test_scan_memory_single_hit_in_region() {
        let session = ProcessSession::attach_pid(std::process::id()).expect("should attach");
        let page = session.alloc(0, 0x1000, PAGE_READWRITE).expect("should allocate");

        // a wildcard-free needle unlikely to exist anywhere else
        let needle = [0xDE, 0xC0, 0xAD, 0x0B, 0x5E, 0xED, 0xFA, 0xCE];
        session.write_bytes(page + 0x7F8, &needle).expect("write");

        let sig = Signature::from_bytes(needle.to_vec());
        let hits = session.scan_memory(&sig, page).expect("should scan");
        assert_eq!(hits.first(), Some(&(page + 0x7F8)));
    }

    #[test]
    fn test_scan_range_bounded() {
        let session = ProcessSession::attach_pid(std::process::id()).expect("should attach");
        let page = session.alloc(0, 0x1000, PAGE_READWRITE).expect("should allocate");

        session.write_bytes(page + 0x10, &[0x11, 0x22, 0x33]).expect("write");

        let sig = Signature::from_bytes(vec![0x11, 0x22, 0x33]);
        let hits = session.scan_range(page, 0x100, &sig).expect("should scan");
        assert_eq!(hits, vec![page + 0x10]);

        // a range that leaves the mapping fails rather than truncating
        assert!(session.scan_range(page + 0xF00, 0x1000, &sig).is_err());
    }
}
