pub mod endian;
pub mod block;
pub mod io_stream;
pub mod catalog;
pub mod restart;
pub mod manifest;
pub mod mesh;
pub mod material;
pub mod study;

pub use endian::{Endian, MAGIC_BLOCK_NAME, MAGIC_NUMBER};
pub use block::BlockDescriptor;
pub use io_stream::{ContainerError, ContainerReader, ContainerWriter};
pub use catalog::{read_fields, write_fields, Catalog, FieldError, FieldMap};
pub use restart::augment_restart;
pub use manifest::FileManifest;
pub use mesh::{FaceIdentifier, FaceType, MeshData, MeshModel, SolidModel};
pub use material::{ScriptEvaluator, WallMaterial};
pub use study::{load_solution, ExportError, ExportOptions, ExportReport, Exporter};
pub use study::parameters::{SolverParameters, StudyDescription};
