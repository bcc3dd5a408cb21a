//! Code caves: near-allocated payload regions wired to a donor site
//!
//! Installation allocates an executable block within rel32 reach of
//! the donor (placement engine), writes the payload plus an optional
//! trampoline into it, and only then patches the donor with the jump.
//! The cave-before-donor write order is a safety invariant: the
//! target must never observe a jump into a cave whose trampoline is
//! not yet in place.

mod patch;
mod placement;

pub use patch::{cave_image, decode_jmp_rel, donor_patch, encode_jmp_rel, JMP_REL_SIZE};
pub use placement::REACH_WINDOW;

use log::debug;

use crate::error::{BurrowError, Result};
use crate::parse;
use crate::session::ProcessSession;

/// default cave size for byte payloads
pub const DEFAULT_CAVE_SIZE: usize = 2048;

/// default cave size for hex-string payloads
pub const DEFAULT_CAVE_SIZE_HEX: usize = 4096;

/// configuration for a cave installation
#[derive(Debug, Clone)]
pub struct CaveOptions {
    payload: Option<Vec<u8>>,
    replaced: usize,
    jump_back: bool,
    size: usize,
}

impl CaveOptions {
    /// empty cave overwriting `replaced` donor bytes
    ///
    /// with no payload there is nothing to resume from, so no
    /// trampoline is emitted; the caller fills the cave afterwards.
    pub fn new(replaced: usize) -> Self {
        Self {
            payload: None,
            replaced,
            jump_back: true,
            size: DEFAULT_CAVE_SIZE,
        }
    }

    /// cave pre-filled with `payload`, trampoline on by default
    pub fn with_payload(replaced: usize, payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            replaced,
            jump_back: true,
            size: DEFAULT_CAVE_SIZE,
        }
    }

    /// payload given as a hex byte string, e.g. "90 90 90"
    pub fn with_payload_hex(replaced: usize, payload: &str) -> Result<Self> {
        Ok(Self {
            payload: Some(parse::parse_hex_bytes(payload)?),
            replaced,
            jump_back: true,
            size: DEFAULT_CAVE_SIZE_HEX,
        })
    }

    /// emit (or suppress) the trampoline back to `donor + replaced`
    pub fn jump_back(mut self, enabled: bool) -> Self {
        self.jump_back = enabled;
        self
    }

    /// requested cave size in bytes (page-rounded by the OS)
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }
}

/// an installed cave
#[derive(Debug, Clone, Copy)]
pub struct CodeCave {
    pub donor: usize,
    pub cave: usize,
    pub replaced: usize,
    pub installed: bool,
}

impl ProcessSession {
    /// place, fill, and wire up a code cave near `donor`
    ///
    /// `options.replaced` donor bytes are overwritten (must be at
    /// least the 5-byte jump). the donor patch is a single write and
    /// is not atomic with respect to the target's own execution;
    /// callers needing quiescence must suspend the target themselves.
    /// the previous donor bytes are not preserved; freeing the cave
    /// later does not restore them.
    pub fn create_code_cave(&self, donor: usize, options: &CaveOptions) -> Result<CodeCave> {
        if options.replaced < JMP_REL_SIZE {
            return Err(BurrowError::PatchTooShort {
                replaced: options.replaced,
            });
        }

        let cave = self.allocate_cave(donor, options.size)?;

        // cave contents go in before the donor jump ever exists
        let payload = options.payload.as_deref().unwrap_or(&[]);
        let jump_back = options.jump_back && options.payload.is_some();
        let image = cave_image(payload, cave, donor, options.replaced, jump_back)?;
        if !image.is_empty() {
            if let Err(err) = self.write_bytes(cave, &image) {
                let _ = self.free(cave);
                return Err(err);
            }
        }

        let patch = donor_patch(donor, cave, options.replaced)?;
        if let Err(err) = self.write_bytes(donor, &patch) {
            let _ = self.free(cave);
            return Err(err);
        }

        debug!(
            "installed cave {:#x} <- donor {:#x} ({} replaced, jump_back={})",
            cave, donor, options.replaced, jump_back
        );

        Ok(CodeCave {
            donor,
            cave,
            replaced: options.replaced,
            installed: true,
        })
    }

    /// release a cave allocation
    ///
    /// does not revert the donor-site patch; a donor still jumping
    /// into the released region will fault in the target.
    pub fn free_cave(&self, cave: usize) -> Result<()> {
        debug!("releasing cave {cave:#x}");
        self.free(cave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::PAGE_READWRITE;

    /// donor playground in our own process: a RW page we can patch
    /// without trampling real code
    fn session_with_donor() -> (ProcessSession, usize) {
        let session = ProcessSession::attach_pid(std::process::id()).expect("should attach");
        let page = session.alloc(0, 0x1000, PAGE_READWRITE).expect("should allocate");
        session
            .write_bytes(page, &[0xCC; 32])
            .expect("should seed donor bytes");
        (session, page)
    }

    #[test]
    fn test_create_cave_full_layout() {
        let (session, donor) = session_with_donor();

        let options = CaveOptions::with_payload_hex(7, "90 90 90").expect("payload parses");
        let installed = session.create_code_cave(donor, &options).expect("should install");

        assert!(installed.cave != 0);
        assert!(installed.installed);
        assert_eq!(installed.replaced, 7);

        // donor: E9 <rel32 to cave> 90 90
        let donor_bytes = session.read_bytes(donor, 7).unwrap();
        assert_eq!(donor_bytes[0], 0xE9);
        assert_eq!(decode_jmp_rel(donor, &donor_bytes), Some(installed.cave));
        assert_eq!(&donor_bytes[5..], &[0x90, 0x90]);

        // cave: payload then a jump resuming past the patched bytes
        let cave_bytes = session.read_bytes(installed.cave, 8).unwrap();
        assert_eq!(&cave_bytes[..3], &[0x90, 0x90, 0x90]);
        assert_eq!(
            decode_jmp_rel(installed.cave + 3, &cave_bytes[3..]),
            Some(donor + 7)
        );

        session.free_cave(installed.cave).expect("should free");
    }

    #[test]
    fn test_create_cave_no_payload_skips_trampoline() {
        let (session, donor) = session_with_donor();

        let installed = session
            .create_code_cave(donor, &CaveOptions::new(5))
            .expect("should install");

        // donor is patched, cave left zeroed for the caller to fill
        let donor_bytes = session.read_bytes(donor, 5).unwrap();
        assert_eq!(decode_jmp_rel(donor, &donor_bytes), Some(installed.cave));

        let cave_bytes = session.read_bytes(installed.cave, 16).unwrap();
        assert!(cave_bytes.iter().all(|&b| b == 0));

        session.free_cave(installed.cave).expect("should free");
    }

    #[test]
    fn test_create_cave_jump_back_disabled() {
        let (session, donor) = session_with_donor();

        let options = CaveOptions::with_payload(6, vec![0xCC, 0xCC]).jump_back(false);
        let installed = session.create_code_cave(donor, &options).expect("should install");

        let cave_bytes = session.read_bytes(installed.cave, 8).unwrap();
        assert_eq!(&cave_bytes[..2], &[0xCC, 0xCC]);
        // no trampoline follows the payload
        assert_eq!(&cave_bytes[2..7], &[0, 0, 0, 0, 0]);

        session.free_cave(installed.cave).expect("should free");
    }

    #[test]
    fn test_create_cave_rejects_short_patch() {
        let (session, donor) = session_with_donor();

        let result = session.create_code_cave(donor, &CaveOptions::new(4));
        assert!(matches!(result, Err(BurrowError::PatchTooShort { replaced: 4 })));

        // donor untouched
        assert_eq!(session.read_bytes(donor, 4).unwrap(), vec![0xCC; 4]);
    }

    #[test]
    fn test_freed_cave_is_unreadable() {
        let (session, donor) = session_with_donor();

        let installed = session
            .create_code_cave(donor, &CaveOptions::with_payload(5, vec![0x90]))
            .expect("should install");

        session.free_cave(installed.cave).expect("should free");
        assert!(session.read_bytes(installed.cave, 16).is_err());
    }
}
