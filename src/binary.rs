//! Binary-file heuristic.
//!
//! Files classified as binary are skipped by the scanner rather than pushed
//! through line scanning. Classification is a cheap three-step probe: a
//! fixed extension deny-list, a null-byte check over the first 512 bytes,
//! and a non-printable byte ratio over the same window. Files that cannot be
//! opened or read are treated as binary so the caller counts them skipped.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes probed for content-based classification.
const PROBE_LEN: usize = 512;

/// Non-printable ratio above which a file is considered binary.
const NON_PRINTABLE_THRESHOLD: f64 = 0.30;

/// Extensions always treated as binary: archives, object files, images,
/// audio/video, and document formats.
const BINARY_EXTENSIONS: &[&str] = &[
    "a", "avi", "bin", "bmp", "class", "dll", "doc", "docx", "dylib", "exe", "gif", "gz", "img",
    "iso", "jar", "jpg", "jpeg", "lib", "mov", "mp3", "mp4", "o", "obj", "pdf", "png", "rar", "so",
    "tar", "war", "xls", "xlsx", "zip",
];

/// Reports whether a file should be treated as binary.
pub fn is_binary_file(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if BINARY_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
    }

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return true,
    };

    let mut probe = [0u8; PROBE_LEN];
    let n = match file.read(&mut probe) {
        Ok(n) => n,
        Err(_) => return true,
    };
    if n == 0 {
        return false;
    }
    let probe = &probe[..n];

    if probe.contains(&0) {
        return true;
    }

    let non_printable = probe.iter().filter(|&&b| is_non_printable(b)).count();
    non_printable as f64 / n as f64 > NON_PRINTABLE_THRESHOLD
}

/// A byte is printable if it is in `[0x20, 0x7E]` or is tab/LF/CR.
#[inline]
fn is_non_printable(b: u8) -> bool {
    !(0x20..=0x7E).contains(&b) && b != b'\t' && b != b'\n' && b != b'\r'
}
