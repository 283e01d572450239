//! Per-face wall material evaluation.
//!
//! A [`WallMaterial`] is attached to wall faces and carries one
//! [`MaterialData`] per property. Each datum evaluates to a value per
//! component for every mesh face, either from a constant, by piecewise-linear
//! interpolation in a table, or through a caller-supplied [`ScriptEvaluator`].
//! A datum with nothing authored yields `None` and the caller substitutes the
//! deformable-wall default.

pub mod tensor;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mesh::{vec3, FaceIdentifier, MeshData, MeshFaceInfo, SolidModel};

pub const YOUNGS_MODULUS: &str = "Young's modulus";
pub const ANISO_YOUNGS_MODULUS: &str = "Young's modulus (anisotropic)";
pub const THICKNESS: &str = "Thickness";

pub const ANISO_COMPONENTS: [&str; 6] = [
    "C_qqqq",
    "C_qqzz",
    "C_zzzz",
    "0.25*(C_qzqz+C_qzzq+C_zqzq+C_zqqz)",
    "C_rqrq",
    "C_rzrz",
];

#[derive(Error, Debug)]
pub enum MaterialError {
    #[error("Material '{name}' has {found} values for {expected} components")]
    ComponentCount { name: String, expected: usize, found: usize },
    #[error("Table of material '{name}' needs {expected} columns per row, row {row} has {found}")]
    TableShape { name: String, row: usize, expected: usize, found: usize },
    #[error("Material '{0}' is scripted but no script evaluator is available")]
    ScriptUnavailable(String),
    #[error("Script of material '{name}' failed: {reason}")]
    Script { name: String, reason: String },
    #[error("No vessel path frame found for mesh face {0}")]
    MissingPathFrame(usize),
    #[error("Mesh face {0} is degenerate")]
    DegenerateFace(usize),
    #[error("Table of material '{name}' cannot be evaluated at {input}")]
    NonFiniteInput { name: String, input: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Representation {
    #[default]
    Constant,
    Table,
    Script,
}

/// Quantity a material table is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputVariable {
    #[default]
    ArcLength,
    LocalRadius,
    X,
    Y,
    Z,
}

/// Rows of `[input, c1, .., cn]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub samples: Vec<Vec<f64>>,
    #[serde(default)]
    pub input:   InputVariable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialData {
    pub name: String,
    pub component_names: Vec<String>,
    #[serde(default)]
    pub representation: Representation,
    /// Constant value per component. Empty means not authored.
    #[serde(default)]
    pub values: Vec<f64>,
    #[serde(default)]
    pub table: TableData,
    #[serde(default)]
    pub script: String,
}

impl MaterialData {
    pub fn new(name: &str, component_names: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            component_names: component_names.iter().map(|s| (*s).to_owned()).collect(),
            representation: Representation::Constant,
            values: Vec::new(),
            table: TableData::default(),
            script: String::new(),
        }
    }

    pub fn component_count(&self) -> usize {
        self.component_names.len().max(1)
    }

    /// Value per component at one mesh face, or `None` when nothing is
    /// authored for this representation.
    pub fn evaluate(
        &self,
        sample: &FaceSample,
        scripts: Option<&dyn ScriptEvaluator>,
    ) -> Result<Option<Vec<f64>>, MaterialError> {
        let n = self.component_count();
        let values = match self.representation {
            Representation::Constant => {
                if self.values.is_empty() {
                    return Ok(None);
                }
                self.values.clone()
            }
            Representation::Table => {
                if self.table.samples.is_empty() {
                    return Ok(None);
                }
                let x = sample.input(self.table.input)?;
                self.interpolate(x)?
            }
            Representation::Script => {
                if self.script.trim().is_empty() {
                    return Ok(None);
                }
                let evaluator = scripts.ok_or_else(|| MaterialError::ScriptUnavailable(self.name.clone()))?;
                evaluator
                    .evaluate(&self.script, sample)
                    .map_err(|reason| MaterialError::Script { name: self.name.clone(), reason })?
            }
        };
        if values.len() != n {
            return Err(MaterialError::ComponentCount {
                name: self.name.clone(),
                expected: n,
                found: values.len(),
            });
        }
        Ok(Some(values))
    }

    /// Piecewise-linear in the input column, clamped at both ends.
    fn interpolate(&self, x: f64) -> Result<Vec<f64>, MaterialError> {
        let width = self.component_count() + 1;
        if let Some((row, bad)) = self.table.samples.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(MaterialError::TableShape {
                name: self.name.clone(),
                row,
                expected: width,
                found: bad.len(),
            });
        }

        if x.is_nan() {
            return Err(MaterialError::NonFiniteInput { name: self.name.clone(), input: x });
        }

        let mut rows: Vec<&Vec<f64>> = self.table.samples.iter().collect();
        rows.sort_by(|a, b| a[0].total_cmp(&b[0]));

        let first = rows[0];
        let last = rows[rows.len() - 1];
        if x <= first[0] {
            return Ok(first[1..].to_vec());
        }
        if x >= last[0] {
            return Ok(last[1..].to_vec());
        }
        let upper = rows.iter().position(|r| r[0] >= x).unwrap_or(rows.len() - 1).max(1);
        let (lo, hi) = (rows[upper - 1], rows[upper]);
        let span = hi[0] - lo[0];
        let t = if span > 0.0 { (x - lo[0]) / span } else { 0.0 };
        Ok(lo[1..].iter().zip(&hi[1..]).map(|(a, b)| a + t * (b - a)).collect())
    }
}

/// Evaluates scripted material data.
///
/// The exporter does not embed a scripting language; callers that support
/// scripted materials plug one in here.
pub trait ScriptEvaluator {
    fn evaluate(&self, source: &str, sample: &FaceSample) -> Result<Vec<f64>, String>;
}

/// What a material datum can depend on at one mesh face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceSample {
    /// 0-based global mesh face index.
    pub face_index: usize,
    pub centroid:   [f64; 3],
    pub arc_length: Option<f64>,
    pub radius:     Option<f64>,
}

impl FaceSample {
    pub fn new(mesh: &dyn MeshData, model: &dyn SolidModel, id: &FaceIdentifier, tri: &MeshFaceInfo) -> Self {
        let centroid = tri
            .nodes
            .iter()
            .map(|&n| vec3(mesh.node_coordinates(n)))
            .sum::<nalgebra::Vector3<f64>>()
            / 3.0;
        let centroid = [centroid.x, centroid.y, centroid.z];
        let path = model.nearest_path_point(id, centroid);
        Self {
            face_index: tri.face,
            centroid,
            arc_length: path.map(|p| p.arc_length),
            radius:     path.map(|p| p.radius),
        }
    }

    fn input(&self, variable: InputVariable) -> Result<f64, MaterialError> {
        match variable {
            InputVariable::ArcLength   => self.arc_length.ok_or(MaterialError::MissingPathFrame(self.face_index)),
            InputVariable::LocalRadius => self.radius.ok_or(MaterialError::MissingPathFrame(self.face_index)),
            InputVariable::X => Ok(self.centroid[0]),
            InputVariable::Y => Ok(self.centroid[1]),
            InputVariable::Z => Ok(self.centroid[2]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialKind {
    Isotropic,
    Anisotropic,
}

/// Material assigned to a set of wall faces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallMaterial {
    pub kind:  MaterialKind,
    #[serde(default)]
    pub faces: Vec<FaceIdentifier>,
    pub data:  Vec<MaterialData>,
}

impl WallMaterial {
    pub fn isotropic() -> Self {
        Self {
            kind: MaterialKind::Isotropic,
            faces: Vec::new(),
            data: vec![MaterialData::new(YOUNGS_MODULUS, &[]), MaterialData::new(THICKNESS, &[])],
        }
    }

    pub fn anisotropic() -> Self {
        Self {
            kind: MaterialKind::Anisotropic,
            faces: Vec::new(),
            data: vec![
                MaterialData::new(ANISO_YOUNGS_MODULUS, &ANISO_COMPONENTS),
                MaterialData::new(THICKNESS, &[]),
            ],
        }
    }

    pub fn datum(&self, name: &str) -> Option<&MaterialData> {
        self.data.iter().find(|d| d.name == name)
    }

    pub fn datum_mut(&mut self, name: &str) -> Option<&mut MaterialData> {
        self.data.iter_mut().find(|d| d.name == name)
    }
}

/// Deformable-wall values used wherever a material leaves a face unauthored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallDefaults {
    pub youngs_modulus: f64,
    pub thickness:      f64,
}

/// Row of `SWB_ISO.dat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicRow {
    pub thickness:      f64,
    pub youngs_modulus: f64,
}

/// Row of `SWB_ANISO.dat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnisotropicRow {
    pub thickness: f64,
    pub stiffness: [f64; 15],
}

/// Evaluated material rows keyed by 0-based mesh face index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialTables {
    pub isotropic:   BTreeMap<usize, IsotropicRow>,
    pub anisotropic: BTreeMap<usize, AnisotropicRow>,
}

fn scalar_or(
    datum: Option<&MaterialData>,
    sample: &FaceSample,
    scripts: Option<&dyn ScriptEvaluator>,
    default: f64,
) -> Result<f64, MaterialError> {
    match datum {
        Some(d) => Ok(d.evaluate(sample, scripts)?.and_then(|v| v.first().copied()).unwrap_or(default)),
        None => Ok(default),
    }
}

/// Evaluate every material over its faces.
///
/// `wall_faces` are the faces of the deformable wall; each of their mesh
/// faces gets an isotropic row, from an isotropic material when one covers
/// it and from `defaults` otherwise. Anisotropic materials produce one
/// rotated stiffness row per covered mesh face.
pub fn compute_material_tables(
    mesh: &dyn MeshData,
    model: &dyn SolidModel,
    wall_faces: &[FaceIdentifier],
    materials: &[WallMaterial],
    defaults: WallDefaults,
    scripts: Option<&dyn ScriptEvaluator>,
) -> Result<MaterialTables, MaterialError> {
    let mut tables = MaterialTables::default();
    let present = |id: &&FaceIdentifier| model.face_index(id).is_some();

    for id in wall_faces.iter().filter(present) {
        for tri in mesh.face_triangles(id) {
            tables.isotropic.insert(tri.face, IsotropicRow {
                thickness: defaults.thickness,
                youngs_modulus: defaults.youngs_modulus,
            });
        }
    }

    for material in materials {
        let thickness = material.datum(THICKNESS);
        for id in material.faces.iter().filter(present) {
            for tri in mesh.face_triangles(id) {
                let sample = FaceSample::new(mesh, model, id, &tri);
                let t = scalar_or(thickness, &sample, scripts, defaults.thickness)?;
                match material.kind {
                    MaterialKind::Isotropic => {
                        let e = scalar_or(material.datum(YOUNGS_MODULUS), &sample, scripts, defaults.youngs_modulus)?;
                        tables.isotropic.insert(tri.face, IsotropicRow { thickness: t, youngs_modulus: e });
                    }
                    MaterialKind::Anisotropic => {
                        let components = match material.datum(ANISO_YOUNGS_MODULUS) {
                            Some(d) => d.evaluate(&sample, scripts)?,
                            None => None,
                        };
                        let mut c = [defaults.youngs_modulus; 6];
                        if let Some(values) = components {
                            for (slot, v) in c.iter_mut().zip(values) {
                                *slot = v;
                            }
                        }
                        let stiffness = rotated_stiffness(mesh, model, id, &tri, &c)?;
                        tables.anisotropic.insert(tri.face, AnisotropicRow { thickness: t, stiffness });
                    }
                }
            }
        }
    }
    Ok(tables)
}

/// Rotate the authored tensor from the path frame into the face frame and
/// project it.
fn rotated_stiffness(
    mesh: &dyn MeshData,
    model: &dyn SolidModel,
    id: &FaceIdentifier,
    tri: &MeshFaceInfo,
    components: &[f64; 6],
) -> Result<[f64; 15], MaterialError> {
    let [p0, p1, p2] = tri.nodes.map(|n| vec3(mesh.node_coordinates(n)));
    let geometric = tensor::geometric_triad(p0, p1, p2).ok_or(MaterialError::DegenerateFace(tri.face))?;

    let centroid = (p0 + p1 + p2) / 3.0;
    let path = model
        .nearest_path_point(id, [centroid.x, centroid.y, centroid.z])
        .ok_or(MaterialError::MissingPathFrame(tri.face))?;
    let material = tensor::path_triad(vec3(path.tangent), vec3(path.normal))
        .ok_or(MaterialError::MissingPathFrame(tri.face))?;

    let rot = tensor::rotation_between(&geometric, &material);
    let c = tensor::rotate(&tensor::elasticity_tensor(components), &rot);
    Ok(tensor::upper_triangle(&tensor::project(&c)))
}
