//! Surface id assignment for tagged boundary faces.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::mesh::{FaceIdentifier, FaceType, SolidModel};

/// Surface id of `all_exterior_faces`.
pub const ALL_EXTERIOR_FACES_ID: u32 = 1;

/// Which face kinds receive the lowest surface ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FaceOrdering {
    /// Walls, then inflow caps, then outflow caps.
    #[default]
    WallsFirst,
    /// Inflow caps, then outflow caps, then walls.
    CapsFirst,
}

impl FaceOrdering {
    fn priority(self, face_type: FaceType) -> u8 {
        match (self, face_type) {
            (FaceOrdering::WallsFirst, FaceType::Wall)       => 1,
            (FaceOrdering::WallsFirst, FaceType::CapInflow)  => 2,
            (FaceOrdering::WallsFirst, FaceType::CapOutflow) => 3,
            (FaceOrdering::CapsFirst,  FaceType::CapInflow)  => 1,
            (FaceOrdering::CapsFirst,  FaceType::CapOutflow) => 2,
            (FaceOrdering::CapsFirst,  FaceType::Wall)       => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Surface {
    pub id:         u32,
    /// Base name of the surface's `.nbc`/`.ebc` files.
    pub name:       String,
    pub identifier: FaceIdentifier,
}

/// Surfaces in ascending id order with a lookup by identifier.
#[derive(Debug, Clone, Default)]
pub struct FaceIndex {
    surfaces: Vec<Surface>,
    lookup:   HashMap<FaceIdentifier, usize>,
}

impl FaceIndex {
    /// Assign ids to every face of `model`.
    ///
    /// Faces are sorted by kind priority, then by name; ties keep model
    /// order. Ids start at 2.
    pub fn compute(
        model: &dyn SolidModel,
        path_names: &BTreeMap<String, String>,
        ordering: FaceOrdering,
    ) -> Self {
        let mut surfaces: Vec<Surface> = model
            .face_identifiers()
            .iter()
            .map(|id| Surface { id: 0, name: surface_name(id, path_names), identifier: id.clone() })
            .collect();

        surfaces.sort_by(|a, b| {
            let pa = ordering.priority(a.identifier.face_type);
            let pb = ordering.priority(b.identifier.face_type);
            pa.cmp(&pb).then_with(|| a.name.cmp(&b.name))
        });
        for (i, surface) in surfaces.iter_mut().enumerate() {
            surface.id = i as u32 + ALL_EXTERIOR_FACES_ID + 1;
        }

        let lookup = surfaces
            .iter()
            .enumerate()
            .map(|(i, s)| (s.identifier.clone(), i))
            .collect();
        Self { surfaces, lookup }
    }

    pub fn get(&self, id: &FaceIdentifier) -> Option<&Surface> {
        self.lookup.get(id).map(|&i| &self.surfaces[i])
    }

    /// Surfaces in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.iter()
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Ids of the surfaces whose kind passes `keep`, ascending.
    pub fn ids_where(&self, keep: impl Fn(FaceType) -> bool) -> Vec<u32> {
        self.surfaces
            .iter()
            .filter(|s| keep(s.identifier.face_type))
            .map(|s| s.id)
            .collect()
    }
}

/// `<prefix><parent>_<parent>...`, spaces replaced by underscores.
fn surface_name(id: &FaceIdentifier, path_names: &BTreeMap<String, String>) -> String {
    let parents: Vec<String> = id
        .parent_solids
        .iter()
        .map(|uid| path_names.get(uid).unwrap_or(uid).replace(' ', "_"))
        .collect();
    format!("{}{}", id.face_type.prefix(), parents.join("_"))
}

pub(crate) fn join_ids(ids: &[u32]) -> String {
    ids.iter().map(u32::to_string).collect::<Vec<_>>().join(" ")
}
