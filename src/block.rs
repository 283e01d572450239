//! Block headers of the named-block container format.
//!
//! ```text
//! <name> : < <totalBytes> > <int> <int> ...\n
//! <totalBytes bytes of payload, the last one being '\n'>
//! ```
//!
//! `totalBytes` counts the trailing newline, so a payload of `n` bytes is
//! declared as `n + 1`. A declared size of `0` marks a header-only block; its
//! descriptor stores `total_bytes == -1`.

use std::io::{self, Write};

/// Parsed header of one block plus where its payload lives.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDescriptor {
    /// Absolute file offset of the first payload byte.
    pub payload_offset: u64,
    /// Payload size without the trailing newline; `-1` for header-only blocks.
    pub total_bytes: i64,
    /// Integers following the size field. The first one is the element count.
    pub header_ints: Vec<i64>,
}

impl BlockDescriptor {
    #[inline]
    pub fn is_header_only(&self) -> bool {
        self.total_bytes < 0
    }

    /// Element count declared in the header, if any.
    pub fn element_count(&self) -> Option<i64> {
        self.header_ints.first().copied()
    }

    /// Bytes to skip after the header line to reach the next header.
    pub(crate) fn stored_len(&self) -> u64 {
        (self.total_bytes + 1) as u64
    }
}

/// One header line split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderLine {
    pub name: String,
    pub declared_bytes: i64,
    pub header_ints: Vec<i64>,
}

/// What a raw line of the file turned out to be.
#[derive(Debug, PartialEq)]
pub enum Line {
    /// Comment (`#...`) or blank line.
    Skip,
    Header(HeaderLine),
}

/// Classify and parse one line read from the container, newline included.
///
/// Returns `None` when the line is neither a comment nor a valid header.
pub fn parse_line(raw: &[u8]) -> Option<Line> {
    if raw.first() == Some(&b'#') || raw.first() == Some(&b'\n') || raw == b"\r\n" {
        return Some(Line::Skip);
    }
    let text = std::str::from_utf8(raw).ok()?;
    let text = text.trim_end_matches(['\n', '\r']);
    if text.trim().is_empty() {
        return Some(Line::Skip);
    }

    let open  = text.find('<')?;
    let close = open + text[open..].find('>')?;

    let name = text[..open].trim_end().strip_suffix(':')?.trim();
    if name.is_empty() {
        return None;
    }
    let declared_bytes = text[open + 1..close].trim().parse::<i64>().ok()?;
    if declared_bytes < 0 {
        return None;
    }
    let header_ints = text[close + 1..]
        .split_whitespace()
        .map(|tok| tok.parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    Some(Line::Header(HeaderLine {
        name: name.to_owned(),
        declared_bytes,
        header_ints,
    }))
}

/// Write exactly one header line.
pub fn write_header_line<W: Write>(
    mut writer: W,
    name: &str,
    declared_bytes: u64,
    header_ints: &[i64],
) -> io::Result<()> {
    write!(writer, "{name} : < {declared_bytes} >")?;
    for value in header_ints {
        write!(writer, " {value}")?;
    }
    writer.write_all(b"\n")
}
