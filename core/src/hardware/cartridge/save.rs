//! Battery-backed RAM persistence, keyed off the ROM's own path rather than
//! an XDG data directory: the save path is derived by swapping the ROM
//! file's extension for `.sav`.
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EmulatorError;
use crate::hardware::cartridge::rtc::Rtc;

/// How long after the last RAM write the cart waits before flushing to
/// disk, in CPU cycles at the base (1x) clock.
pub const QUIET_PERIOD_CYCLES: i32 = 4_194_304 * 3;

pub fn save_path_for(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("sav")
}

/// Loaded save data, split into the raw RAM image and (if the cart has an
/// RTC) the packed clock tail.
pub struct LoadedSave {
    pub ram: Vec<u8>,
    pub rtc_bytes: Option<[u8; Rtc::BYTE_LEN]>,
}

/// Reads the `.sav` file at `path`, if present. A missing file is not an
/// error (first boot); a present-but-malformed one is.
pub fn load(path: &Path, ram_len: usize, has_rtc: bool) -> Result<Option<LoadedSave>, EmulatorError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(EmulatorError::Io(e)),
    };

    let expected_len = ram_len + if has_rtc { Rtc::BYTE_LEN } else { 0 };
    if bytes.len() != expected_len {
        return Err(EmulatorError::SaveCorrupt);
    }

    let ram = bytes[..ram_len].to_vec();
    let rtc_bytes = if has_rtc {
        let mut buf = [0u8; Rtc::BYTE_LEN];
        buf.copy_from_slice(&bytes[ram_len..]);
        Some(buf)
    } else {
        None
    };

    Ok(Some(LoadedSave { ram, rtc_bytes }))
}

/// Writes `ram` (plus the packed RTC tail, if given) to `path`.
pub fn flush(path: &Path, ram: &[u8], rtc_bytes: Option<[u8; Rtc::BYTE_LEN]>) -> Result<(), EmulatorError> {
    let mut buf = Vec::with_capacity(ram.len() + Rtc::BYTE_LEN);
    buf.extend_from_slice(ram);
    if let Some(tail) = rtc_bytes {
        buf.extend_from_slice(&tail);
    }
    fs::write(path, buf).map_err(EmulatorError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_sav_extension_from_rom_path() {
        assert_eq!(save_path_for(Path::new("/roms/zelda.gb")), PathBuf::from("/roms/zelda.sav"));
        assert_eq!(save_path_for(Path::new("game.gbc")), PathBuf::from("game.sav"));
    }

    #[test]
    fn missing_save_file_is_not_an_error() {
        let dir = std::env::temp_dir().join("gbemu-save-test-missing");
        let result = load(&dir.join("does-not-exist.sav"), 0x2000, false).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn round_trips_ram_through_flush_and_load() {
        let path = std::env::temp_dir().join(format!("gbemu-save-test-{}.sav", std::process::id()));
        let ram = vec![0xAB; 0x2000];
        flush(&path, &ram, None).unwrap();
        let loaded = load(&path, 0x2000, false).unwrap().unwrap();
        assert_eq!(loaded.ram, ram);
        let _ = std::fs::remove_file(&path);
    }
}
