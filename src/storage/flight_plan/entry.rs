//! Flight-plan entry record
//!
//! Each entry is serialized into exactly one 512-byte flash page. Parts
//! like the S25FL512S wrap writes that exceed a page back to the page
//! start, so the record size is pinned to the page size and checked at
//! compile time.
//!
//! On-media layout (little-endian, 512 bytes):
//!
//! ```text
//! i32 unixtime; i32 executions; i32 periodical; i32 node;
//! u8 cmd[248]; u8 args[248]
//! ```
//!
//! String fields are null-padded on write. Reads stop at the first NUL
//! and keep the longest valid UTF-8 prefix, so decoding unwritten flash
//! yields garbage but never a failure.

use heapless::String;

/// On-media entry size in bytes (one flash page).
pub const FP_ENTRY_SIZE: usize = 512;

/// Capacity of the command and argument string fields.
pub const CMD_MAX_LEN: usize = 248;

/// Sentinel unixtime/address marking an empty slot.
pub const FP_NULL: i32 = -1;

const HEADER_SIZE: usize = 16;

const _: () = assert!(HEADER_SIZE + 2 * CMD_MAX_LEN == FP_ENTRY_SIZE);

/// A deferred command scheduled for execution at a UTC time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpEntry {
    /// Scheduled execution unixtime (`FP_NULL` = empty)
    pub unixtime: i32,
    /// Times the command runs per periodic cycle
    pub executions: i32,
    /// Repeat interval in seconds (0 = one-shot)
    pub periodical: i32,
    /// Destination node address
    pub node: i32,
    /// Command name
    pub cmd: String<CMD_MAX_LEN>,
    /// Command arguments
    pub args: String<CMD_MAX_LEN>,
}

impl FpEntry {
    /// Build an entry, truncating over-long strings to the field size.
    pub fn new(
        unixtime: i32,
        cmd: &str,
        args: &str,
        executions: i32,
        periodical: i32,
        node: i32,
    ) -> Self {
        Self {
            unixtime,
            executions,
            periodical,
            node,
            cmd: truncated(cmd),
            args: truncated(args),
        }
    }

    /// Serialize into one flash page.
    pub(crate) fn encode(&self) -> [u8; FP_ENTRY_SIZE] {
        let mut buf = [0u8; FP_ENTRY_SIZE];
        buf[0..4].copy_from_slice(&self.unixtime.to_le_bytes());
        buf[4..8].copy_from_slice(&self.executions.to_le_bytes());
        buf[8..12].copy_from_slice(&self.periodical.to_le_bytes());
        buf[12..16].copy_from_slice(&self.node.to_le_bytes());
        buf[HEADER_SIZE..HEADER_SIZE + self.cmd.len()].copy_from_slice(self.cmd.as_bytes());
        let args_off = HEADER_SIZE + CMD_MAX_LEN;
        buf[args_off..args_off + self.args.len()].copy_from_slice(self.args.as_bytes());
        buf
    }

    /// Deserialize one flash page.
    pub(crate) fn decode(buf: &[u8; FP_ENTRY_SIZE]) -> Self {
        let args_off = HEADER_SIZE + CMD_MAX_LEN;
        Self {
            unixtime: i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            executions: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            periodical: i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            node: i32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            cmd: read_padded(&buf[HEADER_SIZE..HEADER_SIZE + CMD_MAX_LEN]),
            args: read_padded(&buf[args_off..args_off + CMD_MAX_LEN]),
        }
    }
}

/// Copy as many whole characters of `s` as fit the field.
fn truncated(s: &str) -> String<CMD_MAX_LEN> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Read a null-padded string field, keeping the longest valid UTF-8
/// prefix.
fn read_padded(bytes: &[u8]) -> String<CMD_MAX_LEN> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let raw = &bytes[..end];
    let text = match core::str::from_utf8(raw) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&raw[..e.valid_up_to()]).unwrap_or(""),
    };
    String::try_from(text).unwrap_or_default()
}
