//! WOFF 1.0 encoding.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::sfnt::{pad4, Sfnt};

const SIGNATURE: u32 = 0x774F_4646;
const HEADER_LEN: usize = 44;
const DIRECTORY_ENTRY_LEN: usize = 20;

/// Wrap an sfnt into a WOFF 1.0 file.
///
/// Each table is zlib-compressed unless compression does not shrink it, in
/// which case it is stored as-is.
pub fn encode(font: &Sfnt<'_>) -> std::io::Result<Vec<u8>> {
    let mut payloads = Vec::with_capacity(font.tables.len());
    for table in &font.tables {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(table.data)?;
        let compressed = encoder.finish()?;
        if compressed.len() < table.data.len() {
            payloads.push(compressed);
        } else {
            payloads.push(table.data.to_vec());
        }
    }

    let mut directory = Vec::with_capacity(font.tables.len() * DIRECTORY_ENTRY_LEN);
    let mut body = Vec::new();
    let data_start = HEADER_LEN + font.tables.len() * DIRECTORY_ENTRY_LEN;

    for (table, payload) in font.tables.iter().zip(&payloads) {
        let offset = data_start + body.len();
        directory.extend_from_slice(&table.tag);
        directory.extend_from_slice(&(offset as u32).to_be_bytes());
        directory.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        directory.extend_from_slice(&(table.data.len() as u32).to_be_bytes());
        directory.extend_from_slice(&table.checksum.to_be_bytes());

        body.extend_from_slice(payload);
        body.resize(pad4(body.len()), 0);
    }

    let total = data_start + body.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&SIGNATURE.to_be_bytes());
    out.extend_from_slice(&font.flavor.to_be_bytes());
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(font.tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&font.sfnt_size().to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    // metadata and private blocks are absent
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&body);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::sfnt::{build_sfnt, parse, FLAVOR_TRUETYPE};
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn be32(bytes: &[u8], at: usize) -> u32 {
        u32::from_be_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn writes_header_and_recoverable_tables() {
        let glyf = vec![0x42; 400];
        let font = build_sfnt(FLAVOR_TRUETYPE, &[(b"glyf", glyf.clone()), (b"OS/2", vec![7, 1, 3])]);
        let sfnt = parse(&font).unwrap();

        let woff = encode(&sfnt).unwrap();

        assert_eq!(&woff[0..4], b"wOFF");
        assert_eq!(be32(&woff, 4), FLAVOR_TRUETYPE);
        assert_eq!(be32(&woff, 8) as usize, woff.len());
        assert_eq!(u16::from_be_bytes([woff[12], woff[13]]), 2);
        assert_eq!(woff.len() % 4, 0);

        // "OS/2" sorts before "glyf"; tiny tables stay uncompressed.
        let first = HEADER_LEN;
        assert_eq!(&woff[first..first + 4], b"OS/2");
        assert_eq!(be32(&woff, first + 8), 3);

        let second = HEADER_LEN + DIRECTORY_ENTRY_LEN;
        assert_eq!(&woff[second..second + 4], b"glyf");
        let offset = be32(&woff, second + 4) as usize;
        let comp_len = be32(&woff, second + 8) as usize;
        assert!(comp_len < glyf.len());

        let mut restored = Vec::new();
        ZlibDecoder::new(&woff[offset..offset + comp_len])
            .read_to_end(&mut restored)
            .unwrap();
        assert_eq!(restored, glyf);
    }
}
