//! Solver setup export.
//!
//! ```text
//! faces → geometry → materials → conditions → solver.inp → flush → presolver → restart
//! ```
//!
//! Every stage up to `solver.inp` writes into a [`FileManifest`]. The manifest
//! is flushed to the output directory only after all of them succeeded, so a
//! validation or evaluation failure leaves the directory untouched. The
//! presolver and the restart augmentation run afterwards and operate on disk.

pub mod conditions;
pub mod faces;
pub mod flow_profile;
pub(crate) mod geometry;
pub mod parameters;
pub mod presolver;
pub mod solver_inp;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::catalog::{read_fields, Catalog, FieldError, FieldMap};
use crate::io_stream::ContainerReader;
use crate::manifest::FileManifest;
use crate::material::{compute_material_tables, MaterialError, MaterialTables, ScriptEvaluator, WallDefaults};
use crate::mesh::{MeshData, MeshModel, SolidModel};
use crate::restart::{augment_restart, AugmentSummary};

use conditions::{ConditionKind, ConditionWriter, ValidationError};
use faces::{FaceIndex, FaceOrdering, Surface};
use parameters::StudyDescription;
use presolver::{run_presolver, PresolverError};
use solver_inp::SolverInp;

/// Presolver command script, relative to the output directory.
pub const SUPRE_FILE: &str = "presolver/the.supre";
const RESTART_FILE: &str = "restart.0.1";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid boundary conditions: {0}")]
    Validation(#[from] ValidationError),
    #[error("Material evaluation failed: {0}")]
    Material(#[from] MaterialError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Presolver(#[from] PresolverError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where and how to export.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub output_dir:    PathBuf,
    /// Presolver executable. Without one the export stops after staging.
    pub presolver:     Option<PathBuf>,
    /// Overrides the study's face ordering.
    pub face_ordering: Option<FaceOrdering>,
    /// Node-major fields, as returned by [`load_solution`], to write into the
    /// generated restart.
    pub solution:      Option<FieldMap>,
}

#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// Files written, relative to the output directory.
    pub files:            Vec<PathBuf>,
    pub surfaces:         Vec<Surface>,
    pub presolver_ran:    bool,
    pub restart_augmented: Option<AugmentSummary>,
}

fn timed<T>(stage: &str, f: impl FnOnce() -> Result<T, ExportError>) -> Result<T, ExportError> {
    let start = Instant::now();
    let out = f()?;
    info!("{} in {} ms", stage, start.elapsed().as_millis());
    Ok(out)
}

/// Runs exports against one mesh.
pub struct Exporter<'a> {
    mesh:    &'a dyn MeshData,
    model:   &'a dyn SolidModel,
    scripts: Option<&'a dyn ScriptEvaluator>,
}

impl<'a> Exporter<'a> {
    pub fn new(mesh: &'a dyn MeshData, model: &'a dyn SolidModel) -> Self {
        Self { mesh, model, scripts: None }
    }

    pub fn with_script_evaluator(mut self, scripts: &'a dyn ScriptEvaluator) -> Self {
        self.scripts = Some(scripts);
        self
    }

    /// Run the whole export. Failures are logged and returned; whatever was
    /// already written to disk stays in place.
    pub fn export(&self, study: &StudyDescription, options: &ExportOptions) -> Result<ExportReport, ExportError> {
        let result = self.run(study, options);
        if let Err(e) = &result {
            error!("Export failed: {}", e);
        }
        result
    }

    /// Stage every generated file without touching the disk.
    pub fn stage(
        &self,
        study: &StudyDescription,
        ordering: FaceOrdering,
    ) -> Result<(FileManifest, FaceIndex), ExportError> {
        let (mesh, model) = (self.mesh, self.model);
        conditions::validate(&study.boundary_conditions, &study.materials)?;

        let faces = FaceIndex::compute(model, &study.vessel_path_names, ordering);
        let mut inp = SolverInp::from_parameters(&study.solver_parameters, &faces, &study.scalars);
        let mut manifest = FileManifest::new();

        geometry::write_supre_header(mesh, &mut manifest)?;
        geometry::write_surface_ids(&faces, &mut manifest)?;

        timed("Written nbc and ebc files", || Ok(geometry::write_nbc_ebc(mesh, model, &faces, &mut manifest)?))?;
        timed("Written coordinates", || Ok(geometry::write_coordinates(mesh, &mut manifest)?))?;
        timed("Written connectivity", || Ok(geometry::write_connectivity(mesh, &mut manifest)?))?;
        timed("Written adjacency", || Ok(geometry::write_adjacency(mesh, &mut manifest)?))?;

        let swb = !study.materials.is_empty();
        if swb {
            let tables = timed("Computed materials", || self.materials(study))?;
            write_material_tables(&tables, &mut manifest)?;
        }

        timed("Written boundary conditions", || {
            let writer = ConditionWriter { mesh, model, faces: &faces, swb };
            writer.write(&study.boundary_conditions, &mut manifest, &mut inp)
        })?;

        manifest.file("solver.inp").write_all(inp.render().as_bytes())?;

        let supre = manifest.file(SUPRE_FILE);
        writeln!(supre, "write_geombc  geombc.dat.1")?;
        writeln!(supre, "write_restart  {RESTART_FILE}")?;
        manifest.file("numstart.dat").write_all(b"0\n")?;

        Ok((manifest, faces))
    }

    fn run(&self, study: &StudyDescription, options: &ExportOptions) -> Result<ExportReport, ExportError> {
        let ordering = options.face_ordering.unwrap_or(study.face_ordering);
        let (manifest, faces) = self.stage(study, ordering)?;

        fs::create_dir_all(&options.output_dir)?;
        let files = timed("Flushed staged files", || Ok(manifest.flush(&options.output_dir)?))?;
        let mut report = ExportReport {
            files,
            surfaces: faces.iter().cloned().collect(),
            ..Default::default()
        };

        let Some(executable) = &options.presolver else {
            warn!("No presolver configured; geombc and restart files were not generated");
            if options.solution.is_some() {
                warn!("Skipping solution transfer: no restart file to write into");
            }
            return Ok(report);
        };

        let script = options.output_dir.join(SUPRE_FILE);
        let moved = timed("Ran presolver", || Ok(run_presolver(executable, &script, &options.output_dir)?))?;
        report.presolver_ran = true;
        report.files.extend(moved.iter().filter_map(|p| p.strip_prefix(&options.output_dir).ok().map(Path::to_path_buf)));

        if let Some(solution) = &options.solution {
            let fields: FieldMap = solution.iter().map(|(k, v)| (k.clone(), v.t().to_owned())).collect();
            let restart = options.output_dir.join(RESTART_FILE);
            let summary = timed("Appended solutions", || Ok(augment_restart(&restart, &fields)?))?;
            report.restart_augmented = Some(summary);
        }
        info!("Done");
        Ok(report)
    }

    fn materials(&self, study: &StudyDescription) -> Result<MaterialTables, ExportError> {
        let wall = study.boundary_conditions.iter().find_map(|bc| match &bc.kind {
            ConditionKind::DeformableWall(w) => Some((bc, *w)),
            _ => None,
        });
        let Some((bc, wall)) = wall else {
            return Err(ValidationError::MissingCompanion { kind: "WallMaterial", requires: "DeformableWall" }.into());
        };
        let defaults = WallDefaults { youngs_modulus: wall.youngs_modulus, thickness: wall.thickness };
        Ok(compute_material_tables(self.mesh, self.model, &bc.faces, &study.materials, defaults, self.scripts)?)
    }
}

/// `SWB_ISO.dat` always, `SWB_ANISO.dat` when any face is anisotropic.
fn write_material_tables(tables: &MaterialTables, manifest: &mut FileManifest) -> io::Result<()> {
    let iso = manifest.file("SWB_ISO.dat");
    for (face, row) in &tables.isotropic {
        writeln!(iso, "{} {:?} {:?}", face + 1, row.thickness, row.youngs_modulus)?;
    }
    if tables.anisotropic.is_empty() {
        return Ok(());
    }
    let aniso = manifest.file("SWB_ANISO.dat");
    for (face, row) in &tables.anisotropic {
        write!(aniso, "{} {:?}", face + 1, row.thickness)?;
        for k in row.stiffness {
            write!(aniso, " {k:?}")?;
        }
        writeln!(aniso)?;
    }
    Ok(())
}

/// Read a study description from a JSON file.
pub fn read_study(path: &Path) -> Result<StudyDescription, ExportError> {
    Ok(StudyDescription::from_json(&fs::read_to_string(path)?)?)
}

/// Read a mesh model from a JSON file.
pub fn read_model(path: &Path) -> Result<MeshModel, ExportError> {
    Ok(MeshModel::from_json(&fs::read_to_string(path)?)?)
}

/// Decode a `restart.*` or `ybar.*` container into node-major fields shaped
/// `[elements, components]`.
pub fn load_solution(path: &Path) -> Result<FieldMap, FieldError> {
    let catalog = Catalog::for_file_name(path).ok_or_else(|| FieldError::UnrecognizedFile(path.to_path_buf()))?;
    let mut reader = ContainerReader::new(File::open(path)?)?;
    let fields = read_fields(&mut reader, &catalog)?;
    Ok(fields.into_iter().map(|(name, data)| (name, data.t().to_owned())).collect())
}
