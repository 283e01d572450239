//! Static catalogs binding container blocks to named solution fields.
//!
//! A catalog is an ordered list of [`ArrayDescriptor`]s, each of which names
//! one container block and slices its component axis into logical fields.
//! Catalogs are immutable; [`read_fields`] and [`write_fields`] are plain
//! functions that take one and return or consume a fresh [`FieldMap`].

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use ndarray::{s, Array2};
use thiserror::Error;

use crate::io_stream::{ContainerError, ContainerReader, ContainerWriter};

/// Decoded fields keyed by name, each shaped `[components, elements]`.
pub type FieldMap = BTreeMap<String, Array2<f64>>;

#[derive(Error, Debug)]
pub enum FieldError {
    #[error("Required block '{block}' is missing")]
    MissingBlock { block: String, #[source] source: ContainerError },
    #[error("Field '{0}' is not described by the catalog")]
    UnknownField(String),
    #[error("Field '{field}' has {found} components, catalog expects {expected}")]
    ComponentMismatch { field: String, expected: usize, found: usize },
    #[error("Fields for block '{block}' disagree on element count ({first} vs {other})")]
    ElementMismatch { block: String, first: usize, other: usize },
    #[error("Field '{field}' spans components {start}..{end} but block '{block}' only has {available}")]
    ComponentRange { field: String, block: String, start: usize, end: usize, available: usize },
    #[error("File {0} is not a solution file; only 'restart.*' and 'ybar.*' are supported")]
    UnrecognizedFile(PathBuf),
    #[error("Container is {0}; blocks can only be copied through in native byte order")]
    ForeignByteOrder(&'static str),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name:        &'static str,
    pub start:       usize,
    pub components:  usize,
}

impl FieldDescriptor {
    const fn new(name: &'static str, start: usize, components: usize) -> Self {
        Self { name, start, components }
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.components
    }
}

/// One block of the catalog. All blocks hold `f64` data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDescriptor {
    pub block:    &'static str,
    pub optional: bool,
    pub fields:   Vec<FieldDescriptor>,
}

impl ArrayDescriptor {
    /// Component count of the assembled block: the highest slot any field uses.
    pub fn total_components(&self) -> usize {
        self.fields.iter().map(FieldDescriptor::end).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub name:   &'static str,
    pub arrays: Vec<ArrayDescriptor>,
}

impl Catalog {
    /// Solution checkpoint written by the solver every N steps.
    pub fn restart() -> Self {
        let solution_fields = |suffix: &str| -> Vec<FieldDescriptor> {
            match suffix {
                "" => vec![
                    FieldDescriptor::new("pressure", 0, 1),
                    FieldDescriptor::new("velocity", 1, 3),
                    FieldDescriptor::new("concentration", 4, 1),
                ],
                _ => vec![
                    FieldDescriptor::new("pressure derivative", 0, 1),
                    FieldDescriptor::new("velocity derivative", 1, 3),
                    FieldDescriptor::new("concentration derivative", 4, 1),
                ],
            }
        };
        Self {
            name: "restart",
            arrays: vec![
                ArrayDescriptor { block: "solution", optional: false, fields: solution_fields("") },
                ArrayDescriptor {
                    block: "time derivative of solution",
                    optional: true,
                    fields: solution_fields("derivative"),
                },
                ArrayDescriptor {
                    block: "displacement",
                    optional: true,
                    fields: vec![FieldDescriptor::new("displacement", 0, 3)],
                },
                ArrayDescriptor {
                    block: "displacement_ref",
                    optional: true,
                    fields: vec![FieldDescriptor::new("displacement_ref", 0, 3)],
                },
            ],
        }
    }

    /// Time-averaged solution, read from the first component of a
    /// single-component `ybar` block.
    pub fn ybar() -> Self {
        Self {
            name: "ybar",
            arrays: vec![ArrayDescriptor {
                block: "ybar",
                optional: false,
                fields: vec![FieldDescriptor::new("ybar", 0, 1)],
            }],
        }
    }

    /// Pick a catalog from a solver output file name (`restart.*`, `ybar.*`).
    pub fn for_file_name(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with("restart") {
            Some(Self::restart())
        } else if name.starts_with("ybar") {
            Some(Self::ybar())
        } else {
            None
        }
    }

    pub fn find_field(&self, field: &str) -> Option<(&ArrayDescriptor, &FieldDescriptor)> {
        self.arrays.iter().find_map(|array| {
            array.fields.iter().find(|f| f.name == field).map(|f| (array, f))
        })
    }
}

/// Decode every block of `catalog` and slice out its fields.
///
/// Optional blocks that are absent or header-only are skipped.
pub fn read_fields<R: Read + Seek>(
    reader: &mut ContainerReader<R>,
    catalog: &Catalog,
) -> Result<FieldMap, FieldError> {
    let mut fields = FieldMap::new();
    for array in &catalog.arrays {
        let block = match reader.data_block::<f64>(array.block) {
            Ok(block) => block,
            Err(e) if e.is_missing() && array.optional => continue,
            Err(e) if e.is_missing() => {
                return Err(FieldError::MissingBlock { block: array.block.to_owned(), source: e })
            }
            Err(e) => return Err(e.into()),
        };

        let available = block.nrows();
        for field in &array.fields {
            if field.end() > available {
                return Err(FieldError::ComponentRange {
                    field:  field.name.to_owned(),
                    block:  array.block.to_owned(),
                    start:  field.start,
                    end:    field.end(),
                    available,
                });
            }
            let slice = block.slice(s![field.start..field.end(), ..]).to_owned();
            fields.insert(field.name.to_owned(), slice);
        }
    }
    Ok(fields)
}

/// Assemble the supplied fields into their blocks and write them.
///
/// Blocks with no supplied field are skipped. Component slots not covered by
/// a supplied field are zero. Each written block header ends in `time_step`.
pub fn write_fields<W: Write>(
    writer: &mut ContainerWriter<W>,
    catalog: &Catalog,
    fields: &FieldMap,
    time_step: i64,
) -> Result<(), FieldError> {
    let mut grouped: BTreeMap<&str, Vec<(&FieldDescriptor, &Array2<f64>)>> = BTreeMap::new();
    for (name, data) in fields {
        let (array, field) = catalog
            .find_field(name)
            .ok_or_else(|| FieldError::UnknownField(name.clone()))?;
        if data.nrows() != field.components {
            return Err(FieldError::ComponentMismatch {
                field:    name.clone(),
                expected: field.components,
                found:    data.nrows(),
            });
        }
        grouped.entry(array.block).or_default().push((field, data));
    }

    for array in &catalog.arrays {
        let Some(members) = grouped.get(array.block) else { continue };
        let elements = members[0].1.ncols();
        if let Some((_, odd)) = members.iter().find(|(_, d)| d.ncols() != elements) {
            return Err(FieldError::ElementMismatch {
                block: array.block.to_owned(),
                first: elements,
                other: odd.ncols(),
            });
        }

        let mut block = Array2::<f64>::zeros((array.total_components(), elements));
        for (field, data) in members {
            block.slice_mut(s![field.start..field.end(), ..]).assign(*data);
        }
        writer.write_data_block(array.block, &block, &[time_step])?;
    }
    Ok(())
}
