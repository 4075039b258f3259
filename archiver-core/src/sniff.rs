//! Format detection by file name and by decompressed content.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use log::debug;
use zstd_stream::{ZstdCodec, ZstdOptions};

use crate::container::{is_valid_header, BLOCK_SIZE};

/// Long suffix of the format.
pub const LONG_SUFFIX: &str = ".tar.zst";
/// Short alias of [`LONG_SUFFIX`].
pub const SHORT_SUFFIX: &str = ".tzst";

// Only one block is ever decoded, so keep the read-ahead small.
const SNIFF_READ_AHEAD: usize = 16 * 1024;

/// Case-insensitive suffix check. Never touches the filesystem.
pub fn has_tar_zst_extension(path: &Path) -> bool {
    let name = path.as_os_str().to_string_lossy().to_lowercase();
    name.ends_with(LONG_SUFFIX) || name.ends_with(SHORT_SUFFIX)
}

/// Decompress the first block of `path` and check it for a tar header.
///
/// Any failure (unopenable file, corrupt stream, short input) reads as "no".
pub fn sniff_tar_zst(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!("sniff {}: cannot open: {}", path.display(), e);
            return false;
        }
    };

    let codec = ZstdCodec::new(ZstdOptions {
        buffer_size: SNIFF_READ_AHEAD,
        ..ZstdOptions::new()
    });
    let mut reader = match codec.reader(file) {
        Ok(r) => r,
        Err(e) => {
            debug!("sniff {}: no zstd stream: {}", path.display(), e);
            return false;
        }
    };

    let mut block = [0u8; BLOCK_SIZE];
    match read_block(&mut reader, &mut block) {
        Ok(n) if n == BLOCK_SIZE => {
            let matched = is_valid_header(&block);
            debug!("sniff {}: tar header {}", path.display(), if matched { "found" } else { "absent" });
            matched
        }
        Ok(n) => {
            debug!("sniff {}: only {} decompressed bytes", path.display(), n);
            false
        }
        Err(e) => {
            debug!("sniff {}: {}", path.display(), e);
            false
        }
    }
}

/// Fill `buf` unless the stream ends first; returns the number of bytes read.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn zstd_of(data: &[u8]) -> Vec<u8> {
        let mut w = ZstdCodec::default().writer(Vec::new()).unwrap();
        w.write_all(data).unwrap();
        w.finish().unwrap()
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert!(has_tar_zst_extension(Path::new("a.tar.zst")));
        assert!(has_tar_zst_extension(Path::new("A.TAR.ZST")));
        assert!(has_tar_zst_extension(Path::new("dir/b.Tzst")));
        assert!(!has_tar_zst_extension(Path::new("a.tar.gz")));
        assert!(!has_tar_zst_extension(Path::new("a.zst")));
        assert!(!has_tar_zst_extension(Path::new("tzst")));
    }

    #[test]
    fn missing_file_does_not_sniff() {
        let dir = tempdir().unwrap();
        assert!(!sniff_tar_zst(&dir.path().join("absent")));
    }

    #[test]
    fn short_stream_does_not_sniff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.bin");
        fs::write(&path, zstd_of(&[0u8; BLOCK_SIZE - 1])).unwrap();
        assert!(!sniff_tar_zst(&path));
    }

    #[test]
    fn plain_zstd_is_not_tar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("text.bin");
        fs::write(&path, zstd_of(&[b'a'; 4 * BLOCK_SIZE])).unwrap();
        assert!(!sniff_tar_zst(&path));
    }

    #[test]
    fn uncompressed_tar_is_not_tar_zst() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.tar");
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_ustar();
        header.set_size(2);
        builder.append_data(&mut header, "a.txt", &b"hi"[..]).unwrap();
        fs::write(&path, builder.into_inner().unwrap()).unwrap();
        assert!(!sniff_tar_zst(&path));
    }

    #[test]
    fn read_block_stops_at_eof() {
        let mut buf = [0u8; 8];
        assert_eq!(read_block(&mut &b"abc"[..], &mut buf).unwrap(), 3);
    }
}
