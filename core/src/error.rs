//! Error kinds and their disposition: load errors are fatal and reported
//! once; everything else is either non-fatal (logged) or an explicit hard
//! fault raised from deep inside the CPU.
use thiserror::Error;

/// Fatal at load time — the caller should report this once and terminate.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("could not read ROM file: {0}")]
    Io(#[from] std::io::Error),
    #[error("ROM is too small to contain a valid header ({0} bytes)")]
    RomTooSmall(usize),
    #[error("ROM declares {declared} ROM banks but the file only contains {actual} bytes")]
    RomTooLarge { declared: usize, actual: usize },
    #[error("unsupported cartridge mapper code: 0x{0:02X}")]
    UnsupportedMapper(u8),
    #[error("malformed cartridge header: {0}")]
    MalformedHeader(&'static str),
    #[error("save file is corrupt or has an unexpected length")]
    SaveCorrupt,
}

/// Raised by the CPU when it decodes an opcode with no defined behavior.
/// This always indicates a buggy ROM or a mis-decoded CPU state and is
/// treated as fatal, reporting both fields.
#[derive(Debug, Error)]
#[error("undefined opcode 0x{opcode:02X} encountered at PC=0x{pc:04X}")]
pub struct UndefinedOpcode {
    pub opcode: u8,
    pub pc: u16,
}
