//! Shared protocol constants for the Ferry framed transport.
//!
//! Every integer on the wire is little-endian: opcodes, counts and string
//! lengths are `u32`, file sizes are `i64`. Variable-length fields are always
//! preceded by their byte length, so a decoder reads a bounded number of
//! bytes per frame and never scans for delimiters.

/// Bytes moved per read/write call when streaming a file body.
pub const CHUNK_SIZE: usize = 1024;

/// Upper bound on any length-prefixed string (file names, request markers).
/// Prevents memory exhaustion from a corrupt or hostile length field.
pub const MAX_NAME_LEN: usize = 4096;

/// Command opcodes. Numeric values are stable wire contract; keep in sync
/// with any non-Rust peer.
pub mod command {
    pub const LIST: u32 = 100;
    pub const DOWNLOAD: u32 = 200;
    pub const UPLOAD: u32 = 300;
    pub const EXIT: u32 = 500;
}

/// Literal request markers sent after the opcode. The DOWNLOAD command has no
/// fixed marker; the requested file name takes its place.
pub mod marker {
    pub const LIST: &str = "ls";
    pub const UPLOAD: &str = "upload";
    pub const EXIT: &str = "exit";
}

/// Status byte preceding every file-size announcement. A dedicated status
/// field keeps a legitimately small file distinguishable from an error.
pub mod status {
    pub const OK: u8 = 0;
    pub const NOT_FOUND: u8 = 1;
    pub const INVALID: u8 = 2;
}

/// One command per request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List,
    Download,
    Upload,
    Exit,
}

impl Command {
    pub fn opcode(self) -> u32 {
        match self {
            Command::List => command::LIST,
            Command::Download => command::DOWNLOAD,
            Command::Upload => command::UPLOAD,
            Command::Exit => command::EXIT,
        }
    }

    pub fn from_opcode(op: u32) -> Option<Self> {
        match op {
            command::LIST => Some(Command::List),
            command::DOWNLOAD => Some(Command::Download),
            command::UPLOAD => Some(Command::Upload),
            command::EXIT => Some(Command::Exit),
            _ => None,
        }
    }
}

/// Outcome of a size announcement: either a real byte count (body follows)
/// or an in-band failure (nothing follows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeResult {
    Size(i64),
    NotFound,
    Invalid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trip() {
        for cmd in [Command::List, Command::Download, Command::Upload, Command::Exit] {
            assert_eq!(Command::from_opcode(cmd.opcode()), Some(cmd));
        }
    }

    #[test]
    fn unknown_opcode_rejected() {
        assert_eq!(Command::from_opcode(0), None);
        assert_eq!(Command::from_opcode(400), None);
        assert_eq!(Command::from_opcode(u32::MAX), None);
    }
}
