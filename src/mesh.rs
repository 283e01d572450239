//! Mesh and solid-model collaborators consumed by the exporter.
//!
//! The exporter never owns a mesh data structure. It talks to two traits,
//! [`MeshData`] for the volume mesh and [`SolidModel`] for the tagged boundary
//! faces and the vessel paths. [`MeshModel`] is a plain serde implementation
//! of both, loaded from JSON by the CLI and built by hand in tests.

use std::collections::{BTreeMap, HashMap};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Kind of a tagged boundary face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FaceType {
    Wall,
    CapInflow,
    CapOutflow,
}

impl FaceType {
    /// File name prefix of the face's surface tag files.
    pub fn prefix(self) -> &'static str {
        match self {
            FaceType::Wall       => "wall_",
            FaceType::CapInflow  => "inflow_",
            FaceType::CapOutflow => "outflow_",
        }
    }
}

/// Identity of one tagged boundary face: its kind plus the vessel paths it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceIdentifier {
    pub face_type: FaceType,
    pub parent_solids: Vec<String>,
}

impl FaceIdentifier {
    pub fn new<S: Into<String>>(face_type: FaceType, parents: impl IntoIterator<Item = S>) -> Self {
        Self { face_type, parent_solids: parents.into_iter().map(Into::into).collect() }
    }
}

/// One triangle of the boundary mesh: owning element, global face index and
/// the three corner nodes. All indices are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshFaceInfo {
    pub element: usize,
    pub face:    usize,
    pub nodes:   [usize; 3],
}

/// Point on a vessel centreline with its local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub position:   [f64; 3],
    pub tangent:    [f64; 3],
    pub normal:     [f64; 3],
    pub arc_length: f64,
    pub radius:     f64,
}

pub trait MeshData {
    fn node_count(&self) -> usize;
    fn element_count(&self) -> usize;
    fn edge_count(&self) -> usize;
    fn face_count(&self) -> usize;
    fn node_coordinates(&self, node: usize) -> [f64; 3];
    /// The four corner nodes of a tetrahedron.
    fn element_nodes(&self, element: usize) -> [usize; 4];
    fn adjacent_elements(&self, element: usize) -> &[usize];
    /// Mesh nodes lying on a tagged face, in no particular order.
    fn face_nodes(&self, face: &FaceIdentifier) -> Vec<usize>;
    fn face_triangles(&self, face: &FaceIdentifier) -> Vec<MeshFaceInfo>;
}

pub trait SolidModel {
    fn face_identifiers(&self) -> &[FaceIdentifier];
    /// Position of `face` in [`face_identifiers`](Self::face_identifiers),
    /// or `None` when the model does not contain it.
    fn face_index(&self, face: &FaceIdentifier) -> Option<usize>;
    fn face_normal(&self, face: &FaceIdentifier) -> [f64; 3];
    fn distance_to_face_edge(&self, face: &FaceIdentifier, point: [f64; 3]) -> f64;
    /// Closest centreline point of the vessels owning `face`.
    fn nearest_path_point(&self, face: &FaceIdentifier, point: [f64; 3]) -> Option<PathPoint>;
}

#[inline]
pub(crate) fn vec3(p: [f64; 3]) -> Vector3<f64> {
    Vector3::new(p[0], p[1], p[2])
}

// ── MeshModel ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFace {
    pub identifier: FaceIdentifier,
    pub normal:     [f64; 3],
    pub triangles:  Vec<MeshFaceInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshModel {
    pub nodes:     Vec<[f64; 3]>,
    pub elements:  Vec<[usize; 4]>,
    #[serde(default)]
    pub adjacency: Vec<Vec<usize>>,
    #[serde(default)]
    pub edge_count: usize,
    #[serde(default)]
    pub face_count: usize,
    pub faces:     Vec<ModelFace>,
    /// Centrelines keyed by vessel path id.
    #[serde(default)]
    pub paths:     BTreeMap<String, Vec<PathPoint>>,
    #[serde(skip)]
    pub(crate) identifiers: Vec<FaceIdentifier>,
    #[serde(skip)]
    pub(crate) lookup: HashMap<FaceIdentifier, usize>,
}

impl MeshModel {
    /// Parse a model from JSON, check its indices and build its face lookup.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let model: MeshModel = serde_json::from_str(text)?;
        model.validate().map_err(<serde_json::Error as serde::de::Error>::custom)?;
        Ok(model.indexed())
    }

    /// Every node, element and adjacency index must point inside the mesh.
    pub fn validate(&self) -> Result<(), String> {
        let (nodes, elements) = (self.nodes.len(), self.elements.len());
        for (e, corners) in self.elements.iter().enumerate() {
            if let Some(n) = corners.iter().find(|&&n| n >= nodes) {
                return Err(format!("element {e} references node {n}, mesh has {nodes} nodes"));
            }
        }
        if self.adjacency.len() > elements {
            return Err(format!("adjacency lists {} elements, mesh has {elements}", self.adjacency.len()));
        }
        for (e, adjacent) in self.adjacency.iter().enumerate() {
            if let Some(a) = adjacent.iter().find(|&&a| a >= elements) {
                return Err(format!("element {e} is adjacent to element {a}, mesh has {elements} elements"));
            }
        }
        for face in &self.faces {
            for tri in &face.triangles {
                if tri.element >= elements {
                    return Err(format!("face triangle {} references element {}, mesh has {elements} elements", tri.face, tri.element));
                }
                if let Some(n) = tri.nodes.iter().find(|&&n| n >= nodes) {
                    return Err(format!("face triangle {} references node {n}, mesh has {nodes} nodes", tri.face));
                }
            }
        }
        Ok(())
    }

    /// Rebuild the face lookup after `faces` changed.
    pub fn indexed(mut self) -> Self {
        self.identifiers = self.faces.iter().map(|f| f.identifier.clone()).collect();
        self.lookup = self.identifiers.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
        self
    }

    fn model_face(&self, face: &FaceIdentifier) -> Option<&ModelFace> {
        self.lookup.get(face).map(|&i| &self.faces[i])
    }
}

impl MeshData for MeshModel {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn element_count(&self) -> usize {
        self.elements.len()
    }

    fn edge_count(&self) -> usize {
        self.edge_count
    }

    fn face_count(&self) -> usize {
        self.face_count
    }

    fn node_coordinates(&self, node: usize) -> [f64; 3] {
        self.nodes[node]
    }

    fn element_nodes(&self, element: usize) -> [usize; 4] {
        self.elements[element]
    }

    fn adjacent_elements(&self, element: usize) -> &[usize] {
        self.adjacency.get(element).map(Vec::as_slice).unwrap_or(&[])
    }

    fn face_nodes(&self, face: &FaceIdentifier) -> Vec<usize> {
        let mut nodes: Vec<usize> = self
            .face_triangles(face)
            .iter()
            .flat_map(|t| t.nodes)
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    fn face_triangles(&self, face: &FaceIdentifier) -> Vec<MeshFaceInfo> {
        self.model_face(face).map(|f| f.triangles.clone()).unwrap_or_default()
    }
}

impl SolidModel for MeshModel {
    fn face_identifiers(&self) -> &[FaceIdentifier] {
        &self.identifiers
    }

    fn face_index(&self, face: &FaceIdentifier) -> Option<usize> {
        self.lookup.get(face).copied()
    }

    fn face_normal(&self, face: &FaceIdentifier) -> [f64; 3] {
        self.model_face(face).map(|f| f.normal).unwrap_or([0.0; 3])
    }

    /// Distance to the closest boundary edge of the face's triangulation. An
    /// edge is on the boundary when exactly one triangle uses it.
    fn distance_to_face_edge(&self, face: &FaceIdentifier, point: [f64; 3]) -> f64 {
        let mut edge_use: HashMap<(usize, usize), u32> = HashMap::new();
        for tri in self.face_triangles(face) {
            let [a, b, c] = tri.nodes;
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *edge_use.entry((u.min(v), u.max(v))).or_insert(0) += 1;
            }
        }

        let p = vec3(point);
        edge_use
            .into_iter()
            .filter(|&(_, count)| count == 1)
            .map(|((u, v), _)| {
                point_segment_distance(p, vec3(self.nodes[u]), vec3(self.nodes[v]))
            })
            .fold(f64::INFINITY, f64::min)
    }

    fn nearest_path_point(&self, face: &FaceIdentifier, point: [f64; 3]) -> Option<PathPoint> {
        let p = vec3(point);
        face.parent_solids
            .iter()
            .filter_map(|id| self.paths.get(id))
            .flatten()
            .min_by(|a, b| {
                let da = (vec3(a.position) - p).norm_squared();
                let db = (vec3(b.position) - p).norm_squared();
                da.total_cmp(&db)
            })
            .copied()
    }
}

fn point_segment_distance(p: Vector3<f64>, a: Vector3<f64>, b: Vector3<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}
