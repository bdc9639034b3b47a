//! XMP in JPEG: an APP1 segment starting with the XMP namespace header.

use std::path::Path;

use crate::error::MetadataError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
pub const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const MAX_SEGMENT_LEN: usize = 0xFFFF;

struct Segment<'a> {
    marker: u8,
    /// Whole segment including marker and length bytes.
    bytes: &'a [u8],
    payload: &'a [u8],
}

impl Segment<'_> {
    fn is_xmp(&self) -> bool {
        self.marker == APP1 && self.payload.starts_with(XMP_HEADER)
    }
}

/// Splits a JPEG into its header segments and the remainder starting at SOS.
fn split<'a>(data: &'a [u8], path: &Path) -> Result<(Vec<Segment<'a>>, &'a [u8]), MetadataError> {
    let malformed = |reason: &str| MetadataError::Malformed {
        path: path.to_path_buf(),
        format: "JPEG",
        reason: reason.to_string(),
    };

    if !data.starts_with(&SOI) {
        return Err(malformed("missing SOI marker"));
    }

    let mut segments = Vec::new();
    let mut pos = 2;
    loop {
        if pos >= data.len() {
            return Err(malformed("no scan data before end of file"));
        }
        if data[pos] != 0xFF {
            return Err(malformed("expected marker"));
        }
        // Fill bytes.
        let mut marker_pos = pos;
        while marker_pos + 1 < data.len() && data[marker_pos + 1] == 0xFF {
            marker_pos += 1;
        }
        if marker_pos + 1 >= data.len() {
            return Err(malformed("truncated marker"));
        }
        let marker = data[marker_pos + 1];

        if marker == SOS || marker == EOI {
            return Ok((segments, &data[pos..]));
        }
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos = marker_pos + 2;
            continue;
        }

        let len_pos = marker_pos + 2;
        if len_pos + 2 > data.len() {
            return Err(malformed("truncated segment length"));
        }
        let len = u16::from_be_bytes([data[len_pos], data[len_pos + 1]]) as usize;
        if len < 2 || len_pos + len > data.len() {
            return Err(malformed("segment overruns file"));
        }
        let end = len_pos + len;
        segments.push(Segment {
            marker,
            bytes: &data[pos..end],
            payload: &data[len_pos + 2..end],
        });
        pos = end;
    }
}

/// Returns a copy of `data` whose only XMP segment carries `packet`.
pub fn embed_xmp(data: &[u8], packet: &str, path: &Path) -> Result<Vec<u8>, MetadataError> {
    let segment_len = 2 + XMP_HEADER.len() + packet.len();
    if segment_len > MAX_SEGMENT_LEN {
        return Err(MetadataError::TooLarge {
            format: "JPEG",
            size: packet.len(),
        });
    }

    let (segments, rest) = split(data, path)?;
    let kept: Vec<&Segment<'_>> = segments.iter().filter(|s| !s.is_xmp()).collect();

    // Conventional position: after JFIF/Exif, before everything else.
    let insert_at = kept
        .iter()
        .position(|s| s.marker != APP0 && s.marker != APP1)
        .unwrap_or(kept.len());

    let mut out = Vec::with_capacity(data.len() + segment_len + 2);
    out.extend_from_slice(&SOI);
    for (index, segment) in kept.iter().enumerate() {
        if index == insert_at {
            push_xmp_segment(&mut out, packet, segment_len);
        }
        out.extend_from_slice(segment.bytes);
    }
    if insert_at == kept.len() {
        push_xmp_segment(&mut out, packet, segment_len);
    }
    out.extend_from_slice(rest);
    Ok(out)
}

fn push_xmp_segment(out: &mut Vec<u8>, packet: &str, segment_len: usize) {
    out.extend_from_slice(&[0xFF, APP1]);
    out.extend_from_slice(&(segment_len as u16).to_be_bytes());
    out.extend_from_slice(XMP_HEADER);
    out.extend_from_slice(packet.as_bytes());
}

/// Extracts the XMP packet, if the file carries one.
pub fn read_xmp(data: &[u8], path: &Path) -> Result<Option<String>, MetadataError> {
    let (segments, _) = split(data, path)?;
    Ok(segments
        .iter()
        .find(|s| s.is_xmp())
        .map(|s| String::from_utf8_lossy(&s.payload[XMP_HEADER.len()..]).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SOI, APP0 (JFIF), DQT stub, SOS with two bytes of scan data, EOI.
    fn sample() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00]);
        data.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x04, 0x01, 0x02]);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9]);
        data
    }

    fn path() -> &'static Path {
        Path::new("test.jpg")
    }

    #[test]
    fn test_split_segments_outlive_path() {
        let data = sample();
        let (segments, rest) = {
            let owned = std::path::PathBuf::from("scratch.jpg");
            split(&data, &owned).unwrap()
        };
        let markers: Vec<u8> = segments.iter().map(|s| s.marker).collect();
        assert_eq!(markers, vec![APP0, 0xDB]);
        assert_eq!(rest[1], SOS);
    }

    #[test]
    fn test_embed_then_read() {
        let out = embed_xmp(&sample(), "<x>packet</x>", path()).unwrap();
        assert_eq!(read_xmp(&out, path()).unwrap().as_deref(), Some("<x>packet</x>"));
    }

    #[test]
    fn test_embed_goes_after_jfif() {
        let out = embed_xmp(&sample(), "p", path()).unwrap();
        // SOI (2) + APP0 (9) then our APP1.
        assert_eq!(&out[11..13], &[0xFF, APP1]);
        assert!(out.ends_with(&[0x12, 0x34, 0xFF, 0xD9]));
    }

    #[test]
    fn test_embed_replaces_previous_packet() {
        let once = embed_xmp(&sample(), "first", path()).unwrap();
        let twice = embed_xmp(&once, "second", path()).unwrap();
        assert_eq!(read_xmp(&twice, path()).unwrap().as_deref(), Some("second"));
        assert_eq!(twice.len(), sample().len() + 4 + XMP_HEADER.len() + "second".len());
    }

    #[test]
    fn test_read_without_xmp() {
        assert_eq!(read_xmp(&sample(), path()).unwrap(), None);
    }

    #[test]
    fn test_not_a_jpeg() {
        let result = embed_xmp(b"\x89PNG", "p", path());
        assert!(matches!(result, Err(MetadataError::Malformed { .. })));
    }

    #[test]
    fn test_truncated_segment() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x40, 0x00];
        assert!(matches!(
            read_xmp(&data, path()),
            Err(MetadataError::Malformed { .. })
        ));
    }

    #[test]
    fn test_packet_too_large() {
        let packet = "x".repeat(70_000);
        assert!(matches!(
            embed_xmp(&sample(), &packet, path()),
            Err(MetadataError::TooLarge { .. })
        ));
    }
}
