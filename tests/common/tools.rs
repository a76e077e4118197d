//! Shell-script stand-ins for the media tools
//!
//! Also compiled into the library's unit tests as `media::testing`.

use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script and return its path
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A short, valid 16 kHz mono WAV
pub fn wav_fixture() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..1600_i16 {
            writer.write_sample(i.wrapping_mul(37)).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Number of entries left in a scratch parent
pub fn leftover_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
