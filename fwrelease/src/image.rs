//! Offsets inside a flashed firmware image.
//!
//! A full image is laid out as
//! `[bootloader][header 0x200][application][trailer 0x28]`. Nothing in the file
//! records these lengths; the caller supplies the bootloader length.

use std::{
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

pub const HEADER_LEN: usize = 0x200;
pub const TRAILER_LEN: usize = 0x28;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error(
        "image of {total} bytes is too short for {what}: needs at least {needed} bytes"
    )]
    OutOfBounds {
        what: &'static str,
        total: usize,
        needed: usize,
    },
    #[error("payload is {actual} bytes, application region is {expected} bytes")]
    PayloadSize { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ImageError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    pub bootloader_len: usize,
    pub header_len: usize,
    pub trailer_len: usize,
}

impl ImageLayout {
    pub fn new(bootloader_len: usize) -> Self {
        Self {
            bootloader_len,
            header_len: HEADER_LEN,
            trailer_len: TRAILER_LEN,
        }
    }

    pub fn app_start(&self) -> usize {
        self.bootloader_len + self.header_len
    }

    /// Application byte range of an image `total` bytes long.
    pub fn app_range(&self, total: usize) -> Result<Range<usize>> {
        let start = self.app_start();
        let needed = start + self.trailer_len;
        if total < needed {
            return Err(ImageError::OutOfBounds {
                what: "bootloader, header and trailer",
                total,
                needed,
            });
        }
        Ok(start..total - self.trailer_len)
    }

    pub fn slice_app<'a>(&self, image: &'a [u8]) -> Result<&'a [u8]> {
        let range = self.app_range(image.len())?;
        Ok(&image[range])
    }

    /// Copy of `image` with the application region replaced by `payload`.
    pub fn splice_app(&self, image: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        let range = self.app_range(image.len())?;
        if range.len() != payload.len() {
            return Err(ImageError::PayloadSize {
                expected: range.len(),
                actual: payload.len(),
            });
        }
        let mut out = image.to_vec();
        out[range].copy_from_slice(payload);
        Ok(out)
    }

    pub fn bootloader<'a>(&self, image: &'a [u8]) -> Result<&'a [u8]> {
        if image.len() < self.bootloader_len {
            return Err(ImageError::OutOfBounds {
                what: "bootloader",
                total: image.len(),
                needed: self.bootloader_len,
            });
        }
        Ok(&image[..self.bootloader_len])
    }

    /// The image without its bootloader region.
    pub fn no_boot<'a>(&self, image: &'a [u8]) -> Result<&'a [u8]> {
        let boot = self.bootloader(image)?;
        Ok(&image[boot.len()..])
    }

    /// Header of a signed image.
    pub fn signed_header<'a>(&self, signed: &'a [u8]) -> Result<&'a [u8]> {
        if signed.len() < self.header_len {
            return Err(ImageError::OutOfBounds {
                what: "signed header",
                total: signed.len(),
                needed: self.header_len,
            });
        }
        Ok(&signed[..self.header_len])
    }

    /// Trailer of a signed image whose unsigned payload was `app_len` bytes.
    pub fn signed_trailer<'a>(&self, signed: &'a [u8], app_len: usize) -> Result<&'a [u8]> {
        let start = self.header_len + app_len;
        let end = start + self.trailer_len;
        if signed.len() < end {
            return Err(ImageError::OutOfBounds {
                what: "signed trailer",
                total: signed.len(),
                needed: end,
            });
        }
        Ok(&signed[start..end])
    }
}

/// `<dir>/<stem><suffix>.<ext>` next to `path`.
pub fn sibling(path: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}.{ext}"))
}

/// Writes the application payload of `source` to `<stem>_Raw.bin`.
pub fn write_raw(source: &Path, layout: &ImageLayout) -> anyhow::Result<(PathBuf, Vec<u8>)> {
    let image = fs::read(source)
        .map_err(|e| anyhow!("can not read image {}: {e}", source.display()))?;
    let app = layout.slice_app(&image)?.to_vec();
    let raw = sibling(source, "_Raw", "bin");
    fs::write(&raw, &app)?;
    Ok((raw, app))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaled() -> ImageLayout {
        ImageLayout {
            bootloader_len: 0x40,
            header_len: 0x20,
            trailer_len: 0x08,
        }
    }

    fn image(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_scaled_slice() {
        // 136 bytes: 64 boot, 32 header, 32 app, 8 trailer
        let img = image(136);
        let app = scaled().slice_app(&img).unwrap();
        assert_eq!(app.len(), 32);
        assert_eq!(app, &img[96..128]);
        assert_eq!(app[0], 96);
        assert_eq!(app[31], 127);
    }

    #[test]
    fn test_default_offsets() {
        let layout = ImageLayout::new(0x20000);
        assert_eq!(layout.app_start(), 0x20200);
        assert_eq!(layout.app_range(0x30000).unwrap(), 0x20200..0x30000 - 0x28);
    }

    #[test]
    fn test_empty_app_allowed() {
        let img = image(0x40 + 0x20 + 0x08);
        assert!(scaled().slice_app(&img).unwrap().is_empty());
    }

    #[test]
    fn test_too_short_is_error() {
        let img = image(0x40 + 0x20 + 0x07);
        assert_eq!(
            scaled().slice_app(&img),
            Err(ImageError::OutOfBounds {
                what: "bootloader, header and trailer",
                total: 103,
                needed: 104,
            })
        );
    }

    #[test]
    fn test_splice_round_trip() {
        let layout = scaled();
        for len in [104usize, 105, 136, 300] {
            let img = image(len);
            let app = layout.slice_app(&img).unwrap().to_vec();
            let zeroed = layout.splice_app(&img, &vec![0; app.len()]).unwrap();
            let restored = layout.splice_app(&zeroed, &app).unwrap();
            assert_eq!(restored, img);
        }
    }

    #[test]
    fn test_splice_wrong_size() {
        let img = image(136);
        assert!(matches!(
            scaled().splice_app(&img, &[1, 2, 3]),
            Err(ImageError::PayloadSize { expected: 32, actual: 3 })
        ));
    }

    #[test]
    fn test_signed_header_trailer() {
        let layout = scaled();
        let signed = image(0x20 + 10 + 0x08 + 16);
        assert_eq!(layout.signed_header(&signed).unwrap(), &signed[..0x20]);
        assert_eq!(
            layout.signed_trailer(&signed, 10).unwrap(),
            &signed[0x2A..0x32]
        );
        assert!(layout.signed_trailer(&signed, 40).is_err());
    }

    #[test]
    fn test_no_boot() {
        let img = image(136);
        assert_eq!(scaled().no_boot(&img).unwrap(), &img[0x40..]);
        assert!(scaled().no_boot(&img[..10]).is_err());
    }

    #[test]
    fn test_write_raw() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fw.bin");
        let img = image(136);
        fs::write(&src, &img).unwrap();

        let (raw, app) = write_raw(&src, &scaled()).unwrap();
        assert_eq!(raw, dir.path().join("fw_Raw.bin"));
        assert_eq!(fs::read(raw).unwrap(), app);
        assert_eq!(app, img[96..128].to_vec());
    }

    #[test]
    fn test_sibling() {
        assert_eq!(
            sibling(Path::new("/out/fw.bin"), "_Manifest", "json"),
            PathBuf::from("/out/fw_Manifest.json")
        );
    }
}
