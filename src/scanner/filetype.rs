//! Binary format detection using magic bytes.

use std::io::{self, Read};

/// Bytes read from the start of a file for classification.
///
/// Equal to the longest registered magic number.
pub const HEADER_LEN: usize = 8;

/// A known binary format and the prefix that identifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFormatMarker {
    /// Short format name (e.g. "png")
    pub name: &'static str,
    /// Magic number expected at offset 0
    pub magic: &'static [u8],
}

/// Formats whose files are never content-scanned.
pub const BINARY_FORMATS: &[BinaryFormatMarker] = &[
    BinaryFormatMarker { name: "exe", magic: b"MZ" },
    BinaryFormatMarker { name: "png", magic: b"\x89PNG" },
    BinaryFormatMarker { name: "jpg", magic: b"\xFF\xD8\xFF" },
    BinaryFormatMarker { name: "zip", magic: b"PK\x03\x04" },
    BinaryFormatMarker { name: "pdf", magic: b"%PDF" },
    BinaryFormatMarker { name: "rar", magic: b"Rar!" },
    BinaryFormatMarker { name: "gif", magic: b"GIF8" },
    BinaryFormatMarker { name: "elf", magic: b"\x7FELF" },
    BinaryFormatMarker { name: "mp3", magic: b"ID3" },
    BinaryFormatMarker { name: "mp4", magic: b"\x00\x00\x00\x18ftyp" },
];

/// Header-based binary file classifier.
///
/// A heuristic, not a security boundary: a binary without a registered
/// prefix is treated as text.
pub struct BinaryClassifier;

impl BinaryClassifier {
    /// Find the binary format whose magic number starts `header`.
    ///
    /// Headers shorter than [`HEADER_LEN`] are always text-assumed.
    pub fn classify(header: &[u8]) -> Option<&'static BinaryFormatMarker> {
        if header.len() < HEADER_LEN {
            return None;
        }

        BINARY_FORMATS
            .iter()
            .find(|marker| header.starts_with(marker.magic))
    }

    /// Check if a header belongs to a known binary format.
    pub fn is_binary(header: &[u8]) -> bool {
        Self::classify(header).is_some()
    }

    /// Read up to [`HEADER_LEN`] bytes from the start of a stream.
    ///
    /// Returns fewer bytes only when the stream ends first.
    pub fn read_header<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
        let mut header = Vec::with_capacity(HEADER_LEN);
        reader.take(HEADER_LEN as u64).read_to_end(&mut header)?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_len_matches_longest_marker() {
        let longest = BINARY_FORMATS.iter().map(|m| m.magic.len()).max().unwrap();
        assert_eq!(longest, HEADER_LEN);
    }

    #[test]
    fn test_png_detection() {
        let header = b"\x89PNG\r\n\x1a\n";
        assert_eq!(BinaryClassifier::classify(header).map(|m| m.name), Some("png"));
    }

    #[test]
    fn test_pe_detection() {
        let header = b"MZ\x90\x00\x03\x00\x00\x00";
        assert_eq!(BinaryClassifier::classify(header).map(|m| m.name), Some("exe"));
    }

    #[test]
    fn test_mp4_needs_full_prefix() {
        assert!(BinaryClassifier::is_binary(b"\x00\x00\x00\x18ftypisom"));
        assert!(!BinaryClassifier::is_binary(b"\x00\x00\x00\x20ftypisom"));
    }

    #[test]
    fn test_prefix_must_be_at_offset_zero() {
        assert!(!BinaryClassifier::is_binary(b"xx\x89PNG\r\n\x1a\n"));
        assert!(!BinaryClassifier::is_binary(b"<?php // %PDF"));
    }

    #[test]
    fn test_short_headers_are_never_binary() {
        let markers: Vec<&[u8]> = BINARY_FORMATS.iter().map(|m| m.magic).collect();
        for magic in markers {
            for len in 0..HEADER_LEN.min(magic.len() + 1) {
                let header = &magic[..len.min(magic.len())];
                assert!(!BinaryClassifier::is_binary(header));
            }
        }
        assert!(!BinaryClassifier::is_binary(b"MZ"));
        assert!(!BinaryClassifier::is_binary(b"\x89PNG\r\n\x1a"));
    }

    #[test]
    fn test_text_is_not_binary() {
        assert!(!BinaryClassifier::is_binary(b"<?php echo 1; ?>"));
        assert!(!BinaryClassifier::is_binary(b"#!/bin/sh\necho hi\n"));
    }

    #[test]
    fn test_read_header() {
        let mut data: &[u8] = b"\x89PNG\r\n\x1a\nrest of the image";
        let header = BinaryClassifier::read_header(&mut data).unwrap();
        assert_eq!(header.len(), HEADER_LEN);
        assert!(BinaryClassifier::is_binary(&header));

        let mut short: &[u8] = b"abc";
        assert_eq!(BinaryClassifier::read_header(&mut short).unwrap(), b"abc");
    }
}
