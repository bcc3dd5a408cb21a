//! Typed reads and writes over the raw byte primitives
//!
//! Fixed-width integers and floats travel little-endian with no
//! framing. Every accessor has a pointer-chain twin that resolves a
//! base + offset list first. Addresses below [`LOW_ADDRESS_GUARD`]
//! are the null/low-memory region: reads there come back empty and
//! writes are refused.

use crate::error::{BurrowError, Result};
use crate::os;
use crate::session::ProcessSession;

/// addresses below this are never read or written
pub const LOW_ADDRESS_GUARD: usize = 0x10000;

/// decimal places used when float rounding is requested without a count
pub const DEFAULT_ROUND_DIGITS: u32 = 2;

/// string decoding used by [`ProcessSession::read_string_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Utf8,
    Utf16,
}

impl ProcessSession {
    /// read up to `len` bytes; empty for guarded low addresses
    pub fn read_bytes(&self, address: usize, len: usize) -> Result<Vec<u8>> {
        let handle = self.live_handle()?;
        if address < LOW_ADDRESS_GUARD || len == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; len];
        let read = os::read_process_memory(handle, address, &mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    /// write bytes; refused for null and guarded low addresses
    pub fn write_bytes(&self, address: usize, bytes: &[u8]) -> Result<usize> {
        let handle = self.live_handle()?;
        if address < LOW_ADDRESS_GUARD {
            return Err(BurrowError::GuardedAddress { address });
        }
        os::write_process_memory(handle, address, bytes)
    }

    /// read exactly `buf.len()` bytes or fail
    pub(crate) fn read_exact(&self, address: usize, buf: &mut [u8]) -> Result<()> {
        let handle = self.live_handle()?;
        if address < LOW_ADDRESS_GUARD {
            return Err(BurrowError::GuardedAddress { address });
        }
        let read = os::read_process_memory(handle, address, buf)?;
        if read != buf.len() {
            return Err(BurrowError::ReadFailed {
                address,
                size: buf.len(),
            });
        }
        Ok(())
    }

    // === fixed-width integers ===

    pub fn read_i32(&self, address: usize) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(address, &mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_i64(&self, address: usize) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact(address, &mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn write_i32(&self, address: usize, value: i32) -> Result<usize> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_i64(&self, address: usize, value: i64) -> Result<usize> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    // === floats ===

    pub fn read_f32(&self, address: usize) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(address, &mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    pub fn read_f64(&self, address: usize) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_exact(address, &mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// read an f32 rounded half-to-even to `digits` decimal places
    ///
    /// rounding affects only the returned value, never the target bytes.
    pub fn read_f32_rounded(&self, address: usize, digits: u32) -> Result<f32> {
        Ok(round_to_digits(self.read_f32(address)? as f64, digits) as f32)
    }

    /// read an f64 rounded half-to-even to `digits` decimal places
    pub fn read_f64_rounded(&self, address: usize, digits: u32) -> Result<f64> {
        Ok(round_to_digits(self.read_f64(address)?, digits))
    }

    pub fn write_f32(&self, address: usize, value: f32) -> Result<usize> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_f64(&self, address: usize, value: f64) -> Result<usize> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    // === strings ===

    /// read a zero-terminated UTF-8 string of at most `len` bytes
    pub fn read_string(&self, address: usize, len: usize) -> Result<String> {
        self.read_string_with(address, len, StringEncoding::Utf8, true)
    }

    /// read a string with explicit encoding and termination handling
    ///
    /// an empty read decodes to an empty string.
    pub fn read_string_with(
        &self,
        address: usize,
        len: usize,
        encoding: StringEncoding,
        zero_terminated: bool,
    ) -> Result<String> {
        let raw = self.read_bytes(address, len)?;
        Ok(match encoding {
            StringEncoding::Utf8 => {
                let end = if zero_terminated {
                    raw.iter().position(|&b| b == 0).unwrap_or(raw.len())
                } else {
                    raw.len()
                };
                String::from_utf8_lossy(&raw[..end]).into_owned()
            }
            StringEncoding::Utf16 => {
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let end = if zero_terminated {
                    units.iter().position(|&u| u == 0).unwrap_or(units.len())
                } else {
                    units.len()
                };
                String::from_utf16_lossy(&units[..end])
            }
        })
    }

    // === bits ===

    /// read `n_bytes` and expand to bits, bit 0 = LSB of byte 0
    pub fn read_bits(&self, address: usize, n_bytes: usize) -> Result<Vec<bool>> {
        let raw = self.read_bytes(address, n_bytes)?;
        let mut bits = Vec::with_capacity(raw.len() * 8);
        for byte in raw {
            for shift in 0..8 {
                bits.push((byte >> shift) & 1 == 1);
            }
        }
        Ok(bits)
    }

    // === pointer-chain overloads ===

    pub fn read_bytes_chain(&self, base: usize, offsets: &[i64], len: usize) -> Result<Vec<u8>> {
        self.read_bytes(self.resolve_pointer(base, offsets), len)
    }

    pub fn read_i32_chain(&self, base: usize, offsets: &[i64]) -> Result<i32> {
        self.read_i32(self.resolve_pointer(base, offsets))
    }

    pub fn read_i64_chain(&self, base: usize, offsets: &[i64]) -> Result<i64> {
        self.read_i64(self.resolve_pointer(base, offsets))
    }

    pub fn read_f32_chain(&self, base: usize, offsets: &[i64]) -> Result<f32> {
        self.read_f32(self.resolve_pointer(base, offsets))
    }

    pub fn read_f64_chain(&self, base: usize, offsets: &[i64]) -> Result<f64> {
        self.read_f64(self.resolve_pointer(base, offsets))
    }

    pub fn read_string_chain(&self, base: usize, offsets: &[i64], len: usize) -> Result<String> {
        self.read_string(self.resolve_pointer(base, offsets), len)
    }

    pub fn read_bits_chain(&self, base: usize, offsets: &[i64], n_bytes: usize) -> Result<Vec<bool>> {
        self.read_bits(self.resolve_pointer(base, offsets), n_bytes)
    }

    pub fn write_bytes_chain(&self, base: usize, offsets: &[i64], bytes: &[u8]) -> Result<usize> {
        self.write_bytes(self.resolve_pointer(base, offsets), bytes)
    }

    pub fn write_i32_chain(&self, base: usize, offsets: &[i64], value: i32) -> Result<usize> {
        self.write_i32(self.resolve_pointer(base, offsets), value)
    }

    pub fn write_i64_chain(&self, base: usize, offsets: &[i64], value: i64) -> Result<usize> {
        self.write_i64(self.resolve_pointer(base, offsets), value)
    }

    pub fn write_f32_chain(&self, base: usize, offsets: &[i64], value: f32) -> Result<usize> {
        self.write_f32(self.resolve_pointer(base, offsets), value)
    }

    pub fn write_f64_chain(&self, base: usize, offsets: &[i64], value: f64) -> Result<usize> {
        self.write_f64(self.resolve_pointer(base, offsets), value)
    }
}

/// round half-to-even at `digits` decimal places
fn round_to_digits(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    (value * scale).round_ties_even() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::PAGE_READWRITE;

    fn session_with_page() -> (ProcessSession, usize) {
        let session = ProcessSession::attach_pid(std::process::id()).expect("should attach");
        let page = session.alloc(0, 0x1000, PAGE_READWRITE).expect("should allocate");
        (session, page)
    }

    #[test]
    fn test_low_address_guard() {
        let (session, _page) = session_with_page();

        assert!(session.read_bytes(0x8000, 16).unwrap().is_empty());
        assert!(session.read_bytes(0, 16).unwrap().is_empty());

        assert!(matches!(
            session.write_bytes(0x8000, &[1, 2, 3]),
            Err(BurrowError::GuardedAddress { .. })
        ));
        assert!(matches!(
            session.write_i32(0, 7),
            Err(BurrowError::GuardedAddress { .. })
        ));
    }

    #[test]
    fn test_integer_round_trips() {
        let (session, page) = session_with_page();

        session.write_i32(page, 0x12345678).expect("write i32");
        assert_eq!(session.read_i32(page).unwrap(), 0x12345678);

        session.write_i64(page + 0x10, -0x1122334455667788).expect("write i64");
        assert_eq!(session.read_i64(page + 0x10).unwrap(), -0x1122334455667788);

        // wire format is little-endian
        let raw = session.read_bytes(page, 4).unwrap();
        assert_eq!(raw, vec![0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_float_round_trips_exact() {
        let (session, page) = session_with_page();

        session.write_f32(page, 3.14159).expect("write f32");
        assert_eq!(session.read_f32(page).unwrap(), 3.14159);

        session.write_f64(page + 8, -2.718281828459045).expect("write f64");
        assert_eq!(session.read_f64(page + 8).unwrap(), -2.718281828459045);
    }

    #[test]
    fn test_float_rounding() {
        let (session, page) = session_with_page();

        session.write_f32(page, 3.14159).expect("write f32");
        assert_eq!(
            session.read_f32_rounded(page, DEFAULT_ROUND_DIGITS).unwrap(),
            3.14
        );

        // half-to-even at the boundary
        session.write_f64(page + 8, 0.125).expect("write f64");
        assert_eq!(session.read_f64_rounded(page + 8, 2).unwrap(), 0.12);
        session.write_f64(page + 8, 0.135).expect("write f64");
        assert_eq!(session.read_f64_rounded(page + 8, 2).unwrap(), 0.14);

        // the bytes stay untouched
        assert_eq!(session.read_f64(page + 8).unwrap(), 0.135);
    }

    #[test]
    fn test_read_string_utf8() {
        let (session, page) = session_with_page();

        session.write_bytes(page, b"hello\0trailing").expect("write");
        assert_eq!(session.read_string(page, 14).unwrap(), "hello");
        assert_eq!(
            session
                .read_string_with(page, 5, StringEncoding::Utf8, false)
                .unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_read_string_utf16() {
        let (session, page) = session_with_page();

        let wide: Vec<u8> = "wide\0"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        session.write_bytes(page, &wide).expect("write");
        assert_eq!(
            session
                .read_string_with(page, wide.len(), StringEncoding::Utf16, true)
                .unwrap(),
            "wide"
        );
    }

    #[test]
    fn test_read_bits() {
        let (session, page) = session_with_page();

        session.write_bytes(page, &[0b0000_0101, 0b1000_0000]).expect("write");
        let bits = session.read_bits(page, 2).unwrap();
        assert_eq!(bits.len(), 16);
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[2]);
        assert!(!bits[7]);
        assert!(bits[15]);
    }

    #[test]
    fn test_chain_overloads() {
        let (session, page) = session_with_page();

        // [page] -> page + 0x40, value stored at page + 0x40 + 0x8
        session.write_i64(page, (page + 0x40) as i64).expect("write ptr");
        session.write_i32(page + 0x48, 0x5EAF00D).expect("write value");

        assert_eq!(session.read_i32_chain(page, &[0x8]).unwrap(), 0x5EAF00D);

        session.write_i32_chain(page, &[0x8], 0x0DD5EA).expect("chain write");
        assert_eq!(session.read_i32(page + 0x48).unwrap(), 0x0DD5EA);
    }
}
