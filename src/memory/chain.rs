//! Pointer-chain resolution
//!
//! Walks a base address through an ordered offset list, re-reading a
//! machine word from the target at every hop. The result is the
//! *address* of the final hop, not the value stored there; callers
//! dereference it themselves through the typed accessors.

use crate::parse;
use crate::session::ProcessSession;

const WORD: usize = core::mem::size_of::<usize>();

impl ProcessSession {
    /// resolve a base address through an offset chain
    ///
    /// reads a word at `base`; an empty chain returns that value as
    /// an address. otherwise each offset is added to the last word
    /// read and a new word is read at the sum; the final such sum is
    /// returned. a failed hop read keeps the previous word value and
    /// the walk continues; reject results below `0x10000` before
    /// dereferencing them.
    pub fn resolve_pointer(&self, base: usize, offsets: &[i64]) -> usize {
        let mut word = [0u8; WORD];
        let _ = self.read_exact(base, &mut word);
        let mut value = usize::from_le_bytes(word);

        if offsets.is_empty() {
            return value;
        }

        let mut hop = base;
        for &offset in offsets {
            hop = value.wrapping_add_signed(offset as isize);
            if self.read_exact(hop, &mut word).is_ok() {
                value = usize::from_le_bytes(word);
            }
        }
        hop
    }

    /// textual front-end: resolve a symbolic or hex base through a
    /// hex offset string
    ///
    /// `base_text` is `"<module>"`, `"<module>+<hex>"`, or a bare hex
    /// address. an empty offset string returns the base itself
    /// without dereferencing; malformed input returns 0.
    pub fn resolve_code(&self, base_text: &str, offsets_text: &str) -> usize {
        let base = match self.resolve_symbolic(base_text) {
            0 => {
                let stripped: String = base_text.chars().filter(|c| *c != ' ').collect();
                let digits = stripped.strip_prefix("0x").unwrap_or(&stripped);
                match usize::from_str_radix(digits, 16) {
                    Ok(addr) => addr,
                    Err(_) => return 0,
                }
            }
            addr => addr,
        };

        if offsets_text.trim().is_empty() {
            return base;
        }
        let Ok(offsets) = parse::parse_offsets(offsets_text) else {
            return 0;
        };
        self.resolve_pointer(base, &offsets)
    }
}

#[cfg(test)]
mod tests {
    use crate::os::PAGE_READWRITE;
    use crate::session::ProcessSession;

    fn session_with_page() -> (ProcessSession, usize) {
        let session = ProcessSession::attach_pid(std::process::id()).expect("should attach");
        let page = session.alloc(0, 0x1000, PAGE_READWRITE).expect("should allocate");
        (session, page)
    }

    #[test]
    fn test_empty_chain_returns_stored_word() {
        let (session, page) = session_with_page();

        session.write_i64(page, 0x1234_5000).expect("write word");
        assert_eq!(session.resolve_pointer(page, &[]), 0x1234_5000);
    }

    #[test]
    fn test_multi_hop_chain() {
        let (session, page) = session_with_page();

        // at p0: word = p1; at p1+0x10: word = p2; at p2+0x8: word = 0xDEADBEEF
        let p0 = page;
        let p1 = page + 0x100;
        let p2 = page + 0x200;
        session.write_i64(p0, p1 as i64).expect("write p0");
        session.write_i64(p1 + 0x10, p2 as i64).expect("write p1");
        session.write_i64(p2 + 0x8, 0xDEADBEEF).expect("write p2");

        // the final hop *address* comes back, not the value at it
        let resolved = session.resolve_pointer(p0, &[0x10, 0x8]);
        assert_eq!(resolved, p2 + 0x8);
        assert_eq!(session.read_i64(resolved).unwrap(), 0xDEADBEEF);
        assert_eq!(session.read_i64_chain(p0, &[0x10, 0x8]).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_negative_offset() {
        let (session, page) = session_with_page();

        let p1 = page + 0x100;
        session.write_i64(page, (p1 + 0x20) as i64).expect("write base");
        session.write_i64(p1 + 0x20 - 0x10, 0x77).expect("write target");

        let resolved = session.resolve_pointer(page, &[-0x10]);
        assert_eq!(resolved, p1 + 0x10);
        assert_eq!(session.read_i64(resolved).unwrap(), 0x77);
    }

    #[test]
    fn test_failed_hop_keeps_walking() {
        let (session, page) = session_with_page();

        // base word points into unmapped space; the hop address is
        // still computed from the stale word
        session.write_i64(page, 0x20).expect("write base");
        let resolved = session.resolve_pointer(page, &[0x8]);
        assert_eq!(resolved, 0x28);
        assert!(resolved < crate::memory::typed::LOW_ADDRESS_GUARD);
    }

    #[test]
    fn test_resolve_code_forms() {
        let (session, page) = session_with_page();

        session.write_i64(page, (page + 0x40) as i64).expect("write");

        let hex = format!("{page:X}");
        assert_eq!(session.resolve_code(&hex, ""), page);
        assert_eq!(session.resolve_code(&format!("0x{page:X}"), ""), page);
        assert_eq!(session.resolve_code(&hex, "8"), page + 0x40 + 0x8);

        let ntdll = session.module_base("ntdll.dll");
        assert_eq!(session.resolve_code("ntdll.dll+10", ""), ntdll + 0x10);

        assert_eq!(session.resolve_code("", ""), 0);
        assert_eq!(session.resolve_code(&hex, "not-hex"), 0);
    }
}
