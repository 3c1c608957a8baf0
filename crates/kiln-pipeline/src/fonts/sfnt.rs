//! Minimal sfnt (TrueType/OpenType) table directory reader.

/// `0x00010000`, TrueType outlines.
pub const FLAVOR_TRUETYPE: u32 = 0x0001_0000;
/// `OTTO`, CFF outlines.
pub const FLAVOR_CFF: u32 = 0x4F54_544F;
/// `true`, legacy Apple TrueType.
pub const FLAVOR_APPLE: u32 = 0x7472_7565;

/// Errors raised while reading sfnt data.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FontError {
    #[error("Font data truncated at offset {0}")]
    Truncated(usize),

    #[error("Unsupported sfnt flavor 0x{0:08x}")]
    UnsupportedFlavor(u32),

    #[error("Table '{tag}' lies outside the font data")]
    TableOutOfBounds { tag: String },

    #[error("Font has no tables")]
    Empty,
}

/// One table from the sfnt table directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SfntTable<'a> {
    pub tag: [u8; 4],
    pub checksum: u32,
    pub data: &'a [u8],
}

impl SfntTable<'_> {
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// A parsed sfnt font.
#[derive(Debug, Clone)]
pub struct Sfnt<'a> {
    pub flavor: u32,

    /// Tables sorted by tag
    pub tables: Vec<SfntTable<'a>>,
}

impl Sfnt<'_> {
    /// Size of the uncompressed sfnt: header, directory and padded tables.
    pub fn sfnt_size(&self) -> u32 {
        let tables: usize = self.tables.iter().map(|t| pad4(t.data.len())).sum();
        (12 + 16 * self.tables.len() + tables) as u32
    }
}

/// Parse the offset table and table directory of a single font.
pub fn parse(bytes: &[u8]) -> Result<Sfnt<'_>, FontError> {
    let flavor = read_u32(bytes, 0)?;
    if ![FLAVOR_TRUETYPE, FLAVOR_CFF, FLAVOR_APPLE].contains(&flavor) {
        return Err(FontError::UnsupportedFlavor(flavor));
    }

    let num_tables = read_u16(bytes, 4)? as usize;
    if num_tables == 0 {
        return Err(FontError::Empty);
    }

    let mut tables = Vec::with_capacity(num_tables);
    for index in 0..num_tables {
        let record = 12 + index * 16;
        let tag: [u8; 4] = bytes
            .get(record..record + 4)
            .and_then(|t| t.try_into().ok())
            .ok_or(FontError::Truncated(record))?;
        let checksum = read_u32(bytes, record + 4)?;
        let offset = read_u32(bytes, record + 8)? as usize;
        let length = read_u32(bytes, record + 12)? as usize;

        let data = offset
            .checked_add(length)
            .and_then(|end| bytes.get(offset..end))
            .ok_or_else(|| FontError::TableOutOfBounds {
                tag: String::from_utf8_lossy(&tag).into_owned(),
            })?;

        tables.push(SfntTable {
            tag,
            checksum,
            data,
        });
    }

    tables.sort_by(|a, b| a.tag.cmp(&b.tag));
    Ok(Sfnt { flavor, tables })
}

pub(crate) fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

fn read_u16(bytes: &[u8], at: usize) -> Result<u16, FontError> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(FontError::Truncated(at))
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, FontError> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(FontError::Truncated(at))
}

/// Assemble an sfnt from `(tag, data)` pairs; test fixtures only.
#[cfg(test)]
pub(crate) fn build_sfnt(flavor: u32, tables: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&flavor.to_be_bytes());
    out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&[0u8; 6]);

    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in tables {
        out.extend_from_slice(*tag);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        body.resize(pad4(body.len()), 0);
        offset = 12 + 16 * tables.len() + body.len();
    }
    out.extend_from_slice(&body);
    out
}
