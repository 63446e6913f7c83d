//! Address corrections for specific historical releases.
//!
//! Spring 0.82.6 and 0.82.6.1 subtracted the image base (0x400000) from the
//! addresses they logged for the main executable. Those addresses have to be
//! shifted back before addr2line can make sense of them.

use log::debug;
use regex::Regex;

/// Image base of the main executable on win32
const IMAGE_BASE: u64 = 0x40_0000;

/// Revisions whose executable addresses need `IMAGE_BASE` added
pub const LEGACY_ADDRESS_OFFSETS: &[(&str, u64)] = &[
    ("0.82.6", IMAGE_BASE),
    ("0.82.6.0", IMAGE_BASE),
    ("0.82.6.1", IMAGE_BASE),
];

/// Revision-keyed address adjustments for executable modules
#[derive(Debug, Clone)]
pub struct AddressAdjustments {
    table: Vec<(String, u64)>,
    executable: Regex,
}

impl AddressAdjustments {
    pub fn new(table: &[(&str, u64)]) -> Self {
        Self {
            table: table.iter().map(|(rev, off)| (rev.to_string(), *off)).collect(),
            executable: Regex::new(r"(?i)spring(-.*)?\.exe").expect("built-in executable pattern must compile"),
        }
    }

    /// Offset to add for `revision`, if any
    pub fn offset_for(&self, revision: &str) -> Option<u64> {
        self.table
            .iter()
            .find(|(rev, _)| rev == revision)
            .map(|(_, offset)| *offset)
    }

    /// Address to hand to the resolver for a frame of `module`
    ///
    /// Returns `address` untouched unless the revision is in the table and
    /// `module` is a main executable.
    pub fn adjust(&self, revision: &str, module: &str, address: &str) -> String {
        let Some(offset) = self.offset_for(revision) else {
            return address.to_string();
        };
        if !self.executable.is_match(module) {
            return address.to_string();
        }

        let digits = address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .unwrap_or(address);
        match u64::from_str_radix(digits, 16) {
            Ok(value) => {
                let adjusted = format!("{:#x}", value.wrapping_add(offset));
                debug!("Adjusted {} -> {} for revision {}", address, adjusted, revision);
                adjusted
            }
            Err(_) => address.to_string(),
        }
    }
}

impl Default for AddressAdjustments {
    fn default() -> Self {
        Self::new(LEGACY_ADDRESS_OFFSETS)
    }
}
