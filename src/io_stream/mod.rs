//! Container reader and writer.
//!
//! # Reader
//! [`ContainerReader`] scans every header line once on open, recording where
//! each payload lives, and seeks past the payload without reading it. Payloads
//! are read on first access and cached. After the scan the byte order is
//! established from the magic-number block; a file whose magic number matches
//! in neither order is rejected.
//!
//! # Writer
//! [`ContainerWriter`] always writes native byte order. It never buffers whole
//! files; each call emits one header line and, if any, one payload.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};

use ndarray::Array2;
use thiserror::Error;

use crate::block::{parse_line, write_header_line, BlockDescriptor, Line};
use crate::endian::{self, Element, Endian, MAGIC_BLOCK_NAME, MAGIC_NUMBER};

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Malformed block header at byte {offset}: {line:?}")]
    MalformedHeader { offset: u64, line: String },
    #[error("Byte order could not be established: magic number block holds neither order of {MAGIC_NUMBER}")]
    ByteOrder,
    #[error("Block '{name}' declares {declared} payload bytes but the file ends first")]
    Truncated { name: String, declared: i64 },
    #[error("Block '{0}' appears more than once")]
    DuplicateBlock(String),
    #[error("Block '{0}' not found")]
    NotFound(String),
    #[error("Block '{0}' has no data")]
    NoData(String),
    #[error("Block '{name}' cannot be read as {type_name}: {reason}")]
    ShapeMismatch { name: String, type_name: &'static str, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ContainerError {
    /// True for the two "block not available" conditions an optional catalog
    /// entry may legitimately hit.
    pub fn is_missing(&self) -> bool {
        matches!(self, ContainerError::NotFound(_) | ContainerError::NoData(_))
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

struct Entry {
    descriptor: BlockDescriptor,
    raw:        Option<Vec<u8>>,
}

pub struct ContainerReader<R: Read + Seek> {
    reader:     BufReader<R>,
    blocks:     HashMap<String, Entry>,
    order:      Vec<String>,
    byte_order: Endian,
}

impl<R: Read + Seek> ContainerReader<R> {
    /// Scan all headers and establish the byte order.
    pub fn new(reader: R) -> Result<Self, ContainerError> {
        let mut this = Self {
            reader:     BufReader::new(reader),
            blocks:     HashMap::new(),
            order:      Vec::new(),
            byte_order: Endian::native(),
        };
        this.parse_headers()?;
        this.detect_byte_order()?;
        Ok(this)
    }

    fn parse_headers(&mut self) -> Result<(), ContainerError> {
        let file_len = self.reader.seek(SeekFrom::End(0))?;
        self.reader.seek(SeekFrom::Start(0))?;

        let mut line = Vec::new();
        loop {
            let line_start = self.reader.stream_position()?;
            line.clear();
            if self.reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }

            let header = match parse_line(&line) {
                Some(Line::Skip)      => continue,
                Some(Line::Header(h)) => h,
                None => {
                    return Err(ContainerError::MalformedHeader {
                        offset: line_start,
                        line:   String::from_utf8_lossy(&line).trim_end().to_owned(),
                    })
                }
            };

            let descriptor = BlockDescriptor {
                payload_offset: self.reader.stream_position()?,
                total_bytes:    header.declared_bytes - 1,
                header_ints:    header.header_ints,
            };
            let skip = descriptor.stored_len();
            if descriptor.payload_offset + skip > file_len {
                return Err(ContainerError::Truncated {
                    name:     header.name,
                    declared: header.declared_bytes,
                });
            }
            if self.blocks.contains_key(&header.name) {
                return Err(ContainerError::DuplicateBlock(header.name));
            }

            self.reader.seek_relative(skip as i64)?;
            self.order.push(header.name.clone());
            self.blocks.insert(header.name, Entry { descriptor, raw: None });
        }
        Ok(())
    }

    fn detect_byte_order(&mut self) -> Result<(), ContainerError> {
        if !self.blocks.contains_key(MAGIC_BLOCK_NAME) {
            return Ok(());
        }
        let payload = match self.raw_data(MAGIC_BLOCK_NAME) {
            Ok(payload) => payload,
            Err(ContainerError::NoData(_)) => return Err(ContainerError::ByteOrder),
            Err(e) => return Err(e),
        };
        self.byte_order = endian::detect(payload).ok_or(ContainerError::ByteOrder)?;
        Ok(())
    }

    /// Byte order established for this file.
    pub fn byte_order(&self) -> Endian {
        self.byte_order
    }

    /// Block names in file order.
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Result<&BlockDescriptor, ContainerError> {
        self.blocks
            .get(name)
            .map(|e| &e.descriptor)
            .ok_or_else(|| ContainerError::NotFound(name.to_owned()))
    }

    /// Raw payload bytes of a block, without the trailing newline.
    ///
    /// Read from the underlying stream on first access and cached thereafter.
    pub fn raw_data(&mut self, name: &str) -> Result<&[u8], ContainerError> {
        let entry = self.blocks
            .get_mut(name)
            .ok_or_else(|| ContainerError::NotFound(name.to_owned()))?;

        if entry.descriptor.is_header_only() {
            return Err(ContainerError::NoData(name.to_owned()));
        }
        if entry.raw.is_none() {
            let mut buf = vec![0u8; entry.descriptor.total_bytes as usize];
            self.reader.seek(SeekFrom::Start(entry.descriptor.payload_offset))?;
            self.reader.read_exact(&mut buf)?;
            entry.raw = Some(buf);
        }
        Ok(entry.raw.as_deref().unwrap_or_default())
    }

    /// Reinterpret a block as a `[components, elements]` array of `T`.
    ///
    /// The first header integer is the element count; the component count is
    /// derived from the payload size and must agree with the second header
    /// integer whenever it is greater than one.
    pub fn data_block<T: Element>(&mut self, name: &str) -> Result<Array2<T>, ContainerError> {
        let byte_order = self.byte_order;
        self.raw_data(name)?;
        let entry = &self.blocks[name];
        let raw = entry.raw.as_deref().unwrap_or_default();
        let (components, elements) = block_shape::<T>(name, &entry.descriptor)?;

        let mut values = vec![T::default(); components * elements];
        T::decode_into(raw, byte_order, &mut values);
        Array2::from_shape_vec((components, elements), values).map_err(|e| {
            ContainerError::ShapeMismatch {
                name:      name.to_owned(),
                type_name: T::TYPE_NAME,
                reason:    e.to_string(),
            }
        })
    }
}

fn block_shape<T: Element>(
    name: &str,
    descriptor: &BlockDescriptor,
) -> Result<(usize, usize), ContainerError> {
    let mismatch = |reason: String| ContainerError::ShapeMismatch {
        name: name.to_owned(),
        type_name: T::TYPE_NAME,
        reason,
    };

    let elements = descriptor
        .element_count()
        .ok_or_else(|| mismatch("header carries no element count".into()))?;
    if elements < 0 {
        return Err(mismatch(format!("negative element count {elements}")));
    }
    let elements = usize::try_from(elements)
        .map_err(|_| mismatch(format!("element count {elements} does not fit in memory")))?;
    let total = descriptor.total_bytes as usize;

    if elements == 0 {
        if total != 0 {
            return Err(mismatch(format!("{total} payload bytes for zero elements")));
        }
        let declared = descriptor.header_ints.get(1).copied().unwrap_or(1).max(1);
        return Ok((declared as usize, 0));
    }

    let bytes_per_component = elements
        .checked_mul(T::SIZE)
        .ok_or_else(|| mismatch(format!("element count {elements} overflows the payload size")))?;
    if total % bytes_per_component != 0 {
        return Err(mismatch(format!(
            "{total} bytes is not a whole number of components of {elements} elements"
        )));
    }
    let components = total / bytes_per_component;
    if components > 1 {
        let declared = descriptor.header_ints.get(1).copied();
        if declared != Some(components as i64) {
            return Err(mismatch(format!(
                "computed {components} components, header declares {declared:?}"
            )));
        }
    }
    Ok((components, elements))
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct ContainerWriter<W: Write> {
    writer: W,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Comment preamble followed by the magic-number block.
    pub fn write_file_header(&mut self) -> io::Result<()> {
        write!(
            self.writer,
            "# PHASTA Input File Version 2.0\n\
             # Byte Order Magic Number : {MAGIC_NUMBER}\n\
             # Output generated by phasta-setup:\n"
        )?;
        let magic = Array2::from_elem((1, 1), MAGIC_NUMBER);
        self.write_data_block(MAGIC_BLOCK_NAME, &magic, &[])
    }

    /// Emit a single header line and nothing else.
    pub fn write_header(&mut self, name: &str, total_bytes: u64, header_ints: &[i64]) -> io::Result<()> {
        write_header_line(&mut self.writer, name, total_bytes, header_ints)
    }

    /// Header with `len + 1` declared bytes, the payload, then a newline.
    pub fn write_raw_data(&mut self, name: &str, raw: &[u8], header_ints: &[i64]) -> io::Result<()> {
        self.write_header(name, raw.len() as u64 + 1, header_ints)?;
        self.writer.write_all(raw)?;
        self.writer.write_all(b"\n")
    }

    /// Write a `[components, elements]` array. The header starts with the
    /// element count and, for more than one component, the component count.
    pub fn write_data_block<T: Element>(
        &mut self,
        name: &str,
        data: &Array2<T>,
        extra_header_ints: &[i64],
    ) -> io::Result<()> {
        let (components, elements) = data.dim();
        let mut header = Vec::with_capacity(2 + extra_header_ints.len());
        header.push(elements as i64);
        if components > 1 {
            header.push(components as i64);
        }
        header.extend_from_slice(extra_header_ints);

        let mut raw = Vec::with_capacity(components * elements * T::SIZE);
        match data.as_slice() {
            Some(contiguous) => T::encode_native(contiguous, &mut raw),
            None => {
                let owned: Vec<T> = data.iter().copied().collect();
                T::encode_native(&owned, &mut raw);
            }
        }
        self.write_raw_data(name, &raw, &header)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
