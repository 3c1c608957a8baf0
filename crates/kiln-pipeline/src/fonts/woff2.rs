//! WOFF2 encoding with null table transforms.

use std::io::Write;

use super::sfnt::{pad4, Sfnt, SfntTable};

const SIGNATURE: u32 = 0x774F_4632;
const HEADER_LEN: usize = 48;

/// Tags with a one-byte shorthand in the WOFF2 table directory.
const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];

const ARBITRARY_TAG: u8 = 0x3F;
/// Transform version 3 marks glyf/loca as stored untransformed.
const NULL_GLYF_TRANSFORM: u8 = 3 << 6;

/// Encode an sfnt as WOFF2 with every table stored untransformed.
pub fn encode(font: &Sfnt<'_>) -> std::io::Result<Vec<u8>> {
    let tables = directory_order(&font.tables);

    let mut directory = Vec::new();
    let mut stream = Vec::new();
    for table in &tables {
        write_directory_entry(&mut directory, table);
        stream.extend_from_slice(table.data);
    }

    let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, 11, 22);
    writer.write_all(&stream)?;
    let compressed = writer.into_inner();

    let total = pad4(HEADER_LEN + directory.len() + compressed.len());

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&SIGNATURE.to_be_bytes());
    out.extend_from_slice(&font.flavor.to_be_bytes());
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&font.sfnt_size().to_be_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    // metadata and private blocks are absent
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    out.resize(total, 0);

    Ok(out)
}

/// Tag order with `loca` placed directly after `glyf`.
fn directory_order<'a, 'b>(tables: &'b [SfntTable<'a>]) -> Vec<&'b SfntTable<'a>> {
    let mut ordered: Vec<&SfntTable<'a>> =
        tables.iter().filter(|t| &t.tag != b"loca").collect();

    if let Some(loca) = tables.iter().find(|t| &t.tag == b"loca") {
        match ordered.iter().position(|t| &t.tag == b"glyf") {
            Some(glyf) => ordered.insert(glyf + 1, loca),
            None => ordered.push(loca),
        }
    }

    ordered
}

fn write_directory_entry(out: &mut Vec<u8>, table: &SfntTable<'_>) {
    let transform = if &table.tag == b"glyf" || &table.tag == b"loca" {
        NULL_GLYF_TRANSFORM
    } else {
        0
    };

    match KNOWN_TAGS.iter().position(|known| *known == &table.tag) {
        Some(index) => out.push(index as u8 | transform),
        None => {
            out.push(ARBITRARY_TAG | transform);
            out.extend_from_slice(&table.tag);
        }
    }

    write_base128(out, table.data.len() as u32);
}

/// Append `value` as a UIntBase128: big-endian 7-bit groups, high bit set
/// on every byte but the last.
pub(crate) fn write_base128(out: &mut Vec<u8>, mut value: u32) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    loop {
        groups[count] = (value & 0x7F) as u8;
        count += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }

    for index in (0..count).rev() {
        let continuation = if index == 0 { 0 } else { 0x80 };
        out.push(groups[index] | continuation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::sfnt::{build_sfnt, parse, FLAVOR_TRUETYPE};
    use std::io::Read;

    #[test]
    fn encodes_base128() {
        let mut out = Vec::new();
        write_base128(&mut out, 0);
        write_base128(&mut out, 127);
        write_base128(&mut out, 128);
        write_base128(&mut out, 16_384);

        assert_eq!(out, vec![0x00, 0x7F, 0x81, 0x00, 0x81, 0x80, 0x00]);
    }

    #[test]
    fn places_loca_after_glyf() {
        let font = build_sfnt(
            FLAVOR_TRUETYPE,
            &[
                (b"head", vec![1; 54]),
                (b"loca", vec![2; 8]),
                (b"glyf", vec![3; 12]),
                (b"cmap", vec![4; 6]),
            ],
        );
        let sfnt = parse(&font).unwrap();

        let tags: Vec<String> = directory_order(&sfnt.tables)
            .iter()
            .map(|t| t.tag_str())
            .collect();

        assert_eq!(tags, vec!["cmap", "glyf", "loca", "head"]);
    }

    #[test]
    fn writes_directory_and_brotli_stream() {
        let font = build_sfnt(
            FLAVOR_TRUETYPE,
            &[(b"glyf", vec![3; 12]), (b"loca", vec![2; 8]), (b"ZZZZ", vec![9; 5])],
        );
        let sfnt = parse(&font).unwrap();

        let woff2 = encode(&sfnt).unwrap();

        assert_eq!(&woff2[0..4], b"wOF2");
        assert_eq!(woff2.len() % 4, 0);
        assert_eq!(
            u32::from_be_bytes(woff2[8..12].try_into().unwrap()) as usize,
            woff2.len()
        );

        // Sorted: "ZZZZ" (arbitrary), glyf, loca.
        let dir = &woff2[HEADER_LEN..];
        assert_eq!(dir[0], ARBITRARY_TAG);
        assert_eq!(&dir[1..5], b"ZZZZ");
        assert_eq!(dir[5], 5);
        assert_eq!(dir[6], 10 | NULL_GLYF_TRANSFORM);
        assert_eq!(dir[7], 12);
        assert_eq!(dir[8], 11 | NULL_GLYF_TRANSFORM);
        assert_eq!(dir[9], 8);

        let compressed_len = u32::from_be_bytes(woff2[20..24].try_into().unwrap()) as usize;
        let start = HEADER_LEN + 10;
        let mut stream = Vec::new();
        brotli::Decompressor::new(&woff2[start..start + compressed_len], 4096)
            .read_to_end(&mut stream)
            .unwrap();

        let mut expected = vec![9u8; 5];
        expected.extend(vec![3u8; 12]);
        expected.extend(vec![2u8; 8]);
        assert_eq!(stream, expected);
    }
}
