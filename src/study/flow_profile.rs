//! Spatial velocity profiles over an inflow/outflow cap.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mesh::{vec3, FaceIdentifier, MeshData, SolidModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfileType {
    #[default]
    Parabolic,
    Womersley,
    Plug,
}

impl ProfileType {
    /// Profile value at `distance` from the cap edge, or `None` for profiles
    /// that cannot be expressed as a pure function of distance.
    fn value(self, distance: f64, max_distance: f64) -> Option<f64> {
        match self {
            ProfileType::Plug => Some(if distance < 1e-6 { 0.0 } else { 1.0 }),
            ProfileType::Parabolic => {
                let s = 1.0 - distance / max_distance;
                Some(2.0 * (1.0 - s * s))
            }
            ProfileType::Womersley => None,
        }
    }
}

/// Per-node profile values normalised so that a unit flow rate integrates to
/// one over the cap.
#[derive(Debug, Clone)]
pub struct FlowProfile {
    normal: [f64; 3],
    values: BTreeMap<usize, f64>,
}

impl FlowProfile {
    /// Returns `None` when the profile is unsupported or the cap carries no
    /// flow volume.
    pub fn new(
        profile: ProfileType,
        model: &dyn SolidModel,
        mesh: &dyn MeshData,
        face: &FaceIdentifier,
    ) -> Option<Self> {
        let distances: BTreeMap<usize, f64> = mesh
            .face_nodes(face)
            .into_iter()
            .map(|n| (n, model.distance_to_face_edge(face, mesh.node_coordinates(n))))
            .collect();
        let max_distance = distances.values().copied().fold(0.0, f64::max);
        if max_distance <= 0.0 {
            return None;
        }

        let mut values = BTreeMap::new();
        for (&node, &d) in &distances {
            values.insert(node, profile.value(d, max_distance)?);
        }

        let volume: f64 = mesh
            .face_triangles(face)
            .iter()
            .map(|tri| {
                let [p0, p1, p2] = tri.nodes.map(|n| vec3(mesh.node_coordinates(n)));
                let area = (p1 - p0).cross(&(p2 - p0)).norm() / 2.0;
                let mean: f64 = tri.nodes.iter().map(|n| values.get(n).copied().unwrap_or(0.0)).sum::<f64>() / 3.0;
                area * mean
            })
            .sum();
        if volume <= 0.0 {
            return None;
        }

        values.values_mut().for_each(|v| *v /= volume);
        Some(Self { normal: model.face_normal(face), values })
    }

    /// Mesh nodes of the cap, ascending.
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.values.keys().copied()
    }

    /// Velocity at `node` for the given flow rate.
    pub fn velocity(&self, node: usize, flow_rate: f64) -> [f64; 3] {
        let scale = flow_rate * self.values.get(&node).copied().unwrap_or(0.0);
        self.normal.map(|n| scale * n)
    }
}

/// Trapezoidal time-average of a `(time, flow)` waveform.
pub fn steady_value(waveform: &[[f64; 2]]) -> f64 {
    let (Some(first), Some(last)) = (waveform.first(), waveform.last()) else {
        return 0.0;
    };
    let duration = last[0] - first[0];
    if duration == 0.0 {
        return first[1];
    }
    let integral: f64 = waveform
        .windows(2)
        .map(|w| 0.5 * (w[0][1] + w[1][1]) * (w[1][0] - w[0][0]))
        .sum();
    integral / duration
}
