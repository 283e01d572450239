#![allow(dead_code)]

use phasta_setup::mesh::{FaceIdentifier, FaceType, MeshModel};
use phasta_setup::study::conditions::{BoundaryCondition, ConditionKind};
use phasta_setup::StudyDescription;

/// Square-based pyramid split into four tetrahedra around the base centre.
/// The base is the inflow cap, two side triangles form the wall and the
/// other two the outflow cap.
pub const PYRAMID_JSON: &str = r#"{
    "nodes": [[0,0,0], [2,0,0], [2,2,0], [0,2,0], [1,1,0], [1,1,2]],
    "elements": [[0,1,4,5], [1,2,4,5], [2,3,4,5], [3,0,4,5]],
    "adjacency": [[1,3], [0,2], [1,3], [0,2]],
    "edge_count": 13,
    "face_count": 12,
    "faces": [
        {
            "identifier": {"face_type": "Wall", "parent_solids": ["aorta"]},
            "normal": [0, 0, 0],
            "triangles": [
                {"element": 0, "face": 4, "nodes": [0, 1, 5]},
                {"element": 1, "face": 5, "nodes": [1, 2, 5]}
            ]
        },
        {
            "identifier": {"face_type": "CapInflow", "parent_solids": ["aorta"]},
            "normal": [0, 0, 1],
            "triangles": [
                {"element": 0, "face": 0, "nodes": [0, 1, 4]},
                {"element": 1, "face": 1, "nodes": [1, 2, 4]},
                {"element": 2, "face": 2, "nodes": [2, 3, 4]},
                {"element": 3, "face": 3, "nodes": [3, 0, 4]}
            ]
        },
        {
            "identifier": {"face_type": "CapOutflow", "parent_solids": ["aorta"]},
            "normal": [0, 0, -1],
            "triangles": [
                {"element": 2, "face": 6, "nodes": [2, 3, 5]},
                {"element": 3, "face": 7, "nodes": [3, 0, 5]}
            ]
        }
    ],
    "paths": {
        "aorta": [
            {"position": [1,1,0], "tangent": [0,0,1], "normal": [1,0,0], "arc_length": 0.0, "radius": 1.0},
            {"position": [1,1,2], "tangent": [0,0,1], "normal": [1,0,0], "arc_length": 2.0, "radius": 0.5}
        ]
    }
}"#;

pub fn pyramid() -> MeshModel {
    MeshModel::from_json(PYRAMID_JSON).unwrap()
}

pub fn wall() -> FaceIdentifier {
    FaceIdentifier::new(FaceType::Wall, ["aorta"])
}

pub fn inflow() -> FaceIdentifier {
    FaceIdentifier::new(FaceType::CapInflow, ["aorta"])
}

pub fn outflow() -> FaceIdentifier {
    FaceIdentifier::new(FaceType::CapOutflow, ["aorta"])
}

/// Rigid-wall study: no-slip wall, parabolic inflow, RCR outflow.
pub fn rigid_study() -> StudyDescription {
    let mut study = StudyDescription::default();
    study.vessel_path_names.insert("aorta".into(), "Aorta Main".into());
    study.boundary_conditions = vec![
        BoundaryCondition::new(ConditionKind::NoSlip, vec![wall()]),
        BoundaryCondition::new(
            ConditionKind::PrescribedVelocities {
                profile:  Default::default(),
                waveform: vec![[0.0, 1.0], [1.0, 3.0]],
            },
            vec![inflow()],
        ),
        BoundaryCondition::new(
            ConditionKind::Rcr { proximal_resistance: 100.0, capacitance: 0.5, distal_resistance: 1000.0 },
            vec![outflow()],
        ),
    ];
    study
}
