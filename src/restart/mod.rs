//! Selective replacement of fields inside an existing restart container.
//!
//! The source file is scanned once, every block not targeted for replacement
//! is copied through verbatim in file order, and the replaced blocks are
//! re-assembled through the restart catalog. The result is written to a
//! temporary file in the same directory and persisted over the original only
//! once it is complete.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::catalog::{write_fields, Catalog, FieldError, FieldMap};
use crate::block::BlockDescriptor;
use crate::endian::{Element, Endian, MAGIC_BLOCK_NAME};
use crate::io_stream::{ContainerReader, ContainerWriter};

/// Block whose header carries the time step of a restart file.
const SOLUTION_BLOCK: &str = "solution";

/// What [`augment_restart`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AugmentSummary {
    /// Fields written into the new container.
    pub replaced_fields: Vec<String>,
    /// Fields ignored because the restart catalog does not know them.
    pub skipped_fields:  Vec<String>,
    /// Blocks copied through unchanged.
    pub copied_blocks:   Vec<String>,
}

/// Time step carried by an `f64` block header: the first integer after the
/// element count and, for multi-component payloads, the component count.
fn time_step_of(descriptor: &BlockDescriptor) -> i64 {
    let elements = descriptor.element_count().unwrap_or(0);
    let per_component = elements.saturating_mul(<f64 as Element>::SIZE as i64);
    let multi_component = per_component > 0 && descriptor.total_bytes / per_component > 1;
    let skip = if multi_component { 2 } else { 1 };
    descriptor.header_ints.get(skip).copied().unwrap_or(0)
}

/// Replace `fields` inside the restart container at `path`.
///
/// Fields unknown to the restart catalog are skipped with a warning. The
/// container must be in native byte order. On any error the original file is
/// left untouched.
pub fn augment_restart(path: &Path, fields: &FieldMap) -> Result<AugmentSummary, FieldError> {
    let catalog = Catalog::restart();
    let mut summary = AugmentSummary::default();

    let mut targeted: BTreeSet<&str> = BTreeSet::from([MAGIC_BLOCK_NAME]);
    let mut new_fields = FieldMap::new();
    for (name, data) in fields {
        match catalog.find_field(name) {
            Some((array, _)) => {
                info!("Appending solution data '{}'", name);
                targeted.insert(array.block);
                new_fields.insert(name.clone(), data.clone());
                summary.replaced_fields.push(name.clone());
            }
            None => {
                warn!("Cannot write solution '{}' to the restart file. Skipping.", name);
                summary.skipped_fields.push(name.clone());
            }
        }
    }

    let mut reader = ContainerReader::new(File::open(path)?)?;
    if reader.byte_order() != Endian::native() {
        return Err(FieldError::ForeignByteOrder(reader.byte_order().name()));
    }
    let time_step = reader.descriptor(SOLUTION_BLOCK).map(time_step_of).unwrap_or(0);

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir)?;
    let mut writer = ContainerWriter::new(BufWriter::new(temp.as_file()));
    writer.write_file_header()?;

    let names: Vec<String> = reader.block_names().map(str::to_owned).collect();
    for name in names {
        if targeted.contains(name.as_str()) {
            continue;
        }
        let descriptor = reader.descriptor(&name)?.clone();
        if descriptor.is_header_only() {
            writer.write_header(&name, 0, &descriptor.header_ints)?;
        } else {
            let raw = reader.raw_data(&name)?;
            writer.write_raw_data(&name, raw, &descriptor.header_ints)?;
        }
        summary.copied_blocks.push(name);
    }

    write_fields(&mut writer, &catalog, &new_fields, time_step)?;
    writer.flush()?;
    drop(writer);
    drop(reader);

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| FieldError::Io(e.error))?;
    Ok(summary)
}
