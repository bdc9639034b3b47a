//! XMP in PNG: an uncompressed `iTXt` chunk with keyword `XML:com.adobe.xmp`.

use std::path::Path;

use crate::error::MetadataError;

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";

struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
    /// Whole chunk: length, type, data and CRC.
    bytes: &'a [u8],
}

impl Chunk<'_> {
    fn is_xmp(&self) -> bool {
        &self.kind == b"iTXt"
            && self.data.starts_with(XMP_KEYWORD)
            && self.data.get(XMP_KEYWORD.len()) == Some(&0)
    }
}

fn chunks<'a>(data: &'a [u8], path: &Path) -> Result<Vec<Chunk<'a>>, MetadataError> {
    let malformed = |reason: &str| MetadataError::Malformed {
        path: path.to_path_buf(),
        format: "PNG",
        reason: reason.to_string(),
    };

    if !data.starts_with(&SIGNATURE) {
        return Err(malformed("missing PNG signature"));
    }

    let mut out = Vec::new();
    let mut pos = SIGNATURE.len();
    while pos < data.len() {
        if pos + 8 > data.len() {
            return Err(malformed("truncated chunk header"));
        }
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let end = pos
            .checked_add(12)
            .and_then(|p| p.checked_add(len))
            .filter(|&e| e <= data.len())
            .ok_or_else(|| malformed("chunk overruns file"))?;
        let kind = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
        out.push(Chunk {
            kind,
            data: &data[pos + 8..pos + 8 + len],
            bytes: &data[pos..end],
        });
        pos = end;
        if &kind == b"IEND" {
            break;
        }
    }

    if out.first().map(|c| &c.kind) != Some(b"IHDR") {
        return Err(malformed("first chunk is not IHDR"));
    }
    Ok(out)
}

fn xmp_chunk(packet: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(XMP_KEYWORD.len() + 5 + packet.len());
    body.extend_from_slice(XMP_KEYWORD);
    // Null separator, compression flag, compression method, empty language
    // tag and empty translated keyword.
    body.extend_from_slice(&[0, 0, 0, 0, 0]);
    body.extend_from_slice(packet.as_bytes());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(b"iTXt");
    hasher.update(&body);
    let crc = hasher.finalize();

    let mut chunk = Vec::with_capacity(body.len() + 12);
    chunk.extend_from_slice(&(body.len() as u32).to_be_bytes());
    chunk.extend_from_slice(b"iTXt");
    chunk.extend_from_slice(&body);
    chunk.extend_from_slice(&crc.to_be_bytes());
    chunk
}

/// Returns a copy of `data` whose only XMP chunk carries `packet`, placed after IHDR.
pub fn embed_xmp(data: &[u8], packet: &str, path: &Path) -> Result<Vec<u8>, MetadataError> {
    if packet.len() > i32::MAX as usize {
        return Err(MetadataError::TooLarge {
            format: "PNG",
            size: packet.len(),
        });
    }

    let chunks = chunks(data, path)?;
    let new_chunk = xmp_chunk(packet);

    let mut out = Vec::with_capacity(data.len() + new_chunk.len());
    out.extend_from_slice(&SIGNATURE);
    for (index, chunk) in chunks.iter().enumerate() {
        if chunk.is_xmp() {
            continue;
        }
        out.extend_from_slice(chunk.bytes);
        if index == 0 {
            out.extend_from_slice(&new_chunk);
        }
    }
    Ok(out)
}

/// Extracts the XMP packet, if the file carries one.
pub fn read_xmp(data: &[u8], path: &Path) -> Result<Option<String>, MetadataError> {
    let chunks = chunks(data, path)?;
    let Some(chunk) = chunks.iter().find(|c| c.is_xmp()) else {
        return Ok(None);
    };

    let malformed = |reason: &str| MetadataError::Malformed {
        path: path.to_path_buf(),
        format: "PNG",
        reason: reason.to_string(),
    };

    let rest = &chunk.data[XMP_KEYWORD.len() + 1..];
    let (&compressed, rest) = rest
        .split_first()
        .ok_or_else(|| malformed("truncated iTXt chunk"))?;
    if compressed != 0 {
        return Err(malformed("compressed XMP is not supported"));
    }
    // Skip compression method, then the language tag and translated keyword.
    let rest = rest.get(1..).ok_or_else(|| malformed("truncated iTXt chunk"))?;
    let mut fields = rest.splitn(3, |&b| b == 0);
    let (_language, _translated, text) = match (fields.next(), fields.next(), fields.next()) {
        (Some(l), Some(t), Some(text)) => (l, t, text),
        _ => return Err(malformed("truncated iTXt chunk")),
    };
    Ok(Some(String::from_utf8_lossy(text).into_owned()))
}
