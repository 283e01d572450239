mod common;

use common::{inflow, outflow, pyramid, rigid_study, wall, PYRAMID_JSON};
use phasta_setup::io_stream::ContainerWriter;
use phasta_setup::material::{tensor, WallMaterial, ANISO_YOUNGS_MODULUS, THICKNESS, YOUNGS_MODULUS};
use phasta_setup::mesh::MeshModel;
use phasta_setup::study::conditions::{BoundaryCondition, ConditionKind, DeformableWall, ValidationError};
use phasta_setup::study::faces::FaceOrdering;
use phasta_setup::{load_solution, ExportError, ExportOptions, Exporter, FileManifest, StudyDescription};
use ndarray::array;
use std::collections::BTreeMap;
use std::fs::{self, File};
use tempfile::TempDir;

fn staged(manifest: &FileManifest, path: &str) -> String {
    let file = manifest.get(path).unwrap_or_else(|| panic!("{path} was not staged"));
    String::from_utf8(file.bytes().to_vec()).unwrap()
}

fn deformable_study(materials: Vec<WallMaterial>) -> StudyDescription {
    let mut study = rigid_study();
    study.boundary_conditions.push(BoundaryCondition::new(
        ConditionKind::InitialPressure { pressure: 12000.0 },
        vec![],
    ));
    study.boundary_conditions.push(BoundaryCondition::new(
        ConditionKind::DeformableWall(DeformableWall::default()),
        vec![wall()],
    ));
    study.materials = materials;
    study
}

#[test]
fn test_surface_ids_follow_ordering() {
    let model = pyramid();
    let study = rigid_study();
    let exporter = Exporter::new(&model, &model);

    let (_, faces) = exporter.stage(&study, FaceOrdering::WallsFirst).unwrap();
    let ids: Vec<(u32, &str)> = faces.iter().map(|s| (s.id, s.name.as_str())).collect();
    assert_eq!(ids, vec![
        (2, "wall_Aorta_Main"),
        (3, "inflow_Aorta_Main"),
        (4, "outflow_Aorta_Main"),
    ]);

    let (_, faces) = exporter.stage(&study, FaceOrdering::CapsFirst).unwrap();
    assert_eq!(faces.get(&inflow()).unwrap().id, 2);
    assert_eq!(faces.get(&outflow()).unwrap().id, 3);
    assert_eq!(faces.get(&wall()).unwrap().id, 4);
}

#[test]
fn test_staging_is_deterministic() {
    let model = pyramid();
    let study = rigid_study();
    let exporter = Exporter::new(&model, &model);

    let (first, _) = exporter.stage(&study, FaceOrdering::WallsFirst).unwrap();
    let (second, _) = exporter.stage(&study, FaceOrdering::WallsFirst).unwrap();
    let paths: Vec<_> = first.paths().collect();
    assert_eq!(paths, second.paths().collect::<Vec<_>>());
    for path in paths {
        assert_eq!(first.get(path).unwrap().bytes(), second.get(path).unwrap().bytes());
    }
}

#[test]
fn test_presolver_script_contents() {
    let model = pyramid();
    let (manifest, _) = Exporter::new(&model, &model).stage(&rigid_study(), FaceOrdering::WallsFirst).unwrap();
    let supre = staged(&manifest, "presolver/the.supre");

    assert!(supre.starts_with("number_of_variables 5\nnumber_of_nodes 6\nnumber_of_elements 4\n"));
    assert!(supre.contains(
        "set_surface_id all_exterior_faces.ebc 1\n\
         set_surface_id wall_Aorta_Main.ebc 2\n\
         set_surface_id inflow_Aorta_Main.ebc 3\n\
         set_surface_id outflow_Aorta_Main.ebc 4\n"
    ));
    let noslip = supre.find("noslip wall_Aorta_Main.nbc").unwrap();
    let velocities = supre.find("prescribed_velocities inflow_Aorta_Main.nbc").unwrap();
    let rcr = supre.find("zero_pressure outflow_Aorta_Main.ebc").unwrap();
    assert!(noslip < velocities && velocities < rcr);
    assert!(supre.ends_with("write_geombc  geombc.dat.1\nwrite_restart  restart.0.1\n"));

    assert_eq!(staged(&manifest, "presolver/wall.nbc"), "1\n2\n3\n6\n");
    assert_eq!(staged(&manifest, "presolver/inflow_Aorta_Main.nbc"), "1\n2\n3\n4\n5\n");
    assert_eq!(staged(&manifest, "presolver/outflow_Aorta_Main.ebc"), "3 7 3 4 6\n4 8 4 1 6\n");
    assert_eq!(staged(&manifest, "presolver/all_exterior_faces.ebc").lines().count(), 8);
    assert_eq!(staged(&manifest, "numstart.dat"), "0\n");
}

#[test]
fn test_geometry_files() {
    let model = pyramid();
    let (manifest, _) = Exporter::new(&model, &model).stage(&rigid_study(), FaceOrdering::WallsFirst).unwrap();

    let coordinates = staged(&manifest, "presolver/the.coordinates");
    assert_eq!(coordinates.lines().nth(5), Some("6 1.0 1.0 2.0"));
    let connectivity = staged(&manifest, "presolver/the.connectivity");
    assert_eq!(connectivity.lines().next(), Some("1 1 2 5 6"));

    let xadj = staged(&manifest, "presolver/the.xadj");
    let lines: Vec<&str> = xadj.lines().collect();
    assert_eq!(lines[0], "xadj: 5");
    assert_eq!(lines[1].trim_end(), "adjncy: 8");
    assert_eq!(lines[1].len(), 50);
    assert_eq!(&lines[2..7], &["0", "2", "4", "6", "8"]);
    assert_eq!(&lines[7..], &["1", "3", "0", "2", "1", "3", "0", "2"]);
}

#[test]
fn test_flow_and_rcr_files() {
    let model = pyramid();
    let (manifest, _) = Exporter::new(&model, &model).stage(&rigid_study(), FaceOrdering::WallsFirst).unwrap();

    let bct = staged(&manifest, "bct.dat");
    let lines: Vec<&str> = bct.lines().collect();
    assert_eq!(lines[0].len(), 50);
    assert_eq!(lines[0].trim_end(), "5 2");
    // one coordinate line plus two samples per cap node
    assert_eq!(lines.len(), 1 + 5 * 3);
    let centre = lines.iter().position(|l| *l == "1.0 1.0 0.0 2").unwrap();
    let v: Vec<f64> = lines[centre + 2].split(' ').map(|t| t.parse().unwrap()).collect();
    assert_eq!(v[..2], [0.0, 0.0]);
    assert!(v[2] > 0.0);
    assert_eq!(v[3], 1.0);

    let steady = staged(&manifest, "bct_steady.dat");
    assert_eq!(steady.lines().next().unwrap().trim_end(), "5 2");
    assert!(steady.contains("0.0 0.0 0.0 1.0\n"));

    assert_eq!(staged(&manifest, "rcrt.dat"), "2\n2\n100.0\n0.5\n1000.0\n0 0.0\n1.1 0.0\n");
    assert_eq!(
        staged(&manifest, "faceInfo.dat"),
        "PrescribedVelocities 3 inflow_Aorta_Main\nRCR 4 outflow_Aorta_Main\n"
    );
}

#[test]
fn test_solver_inp_groups() {
    let model = pyramid();
    let (manifest, _) = Exporter::new(&model, &model).stage(&rigid_study(), FaceOrdering::WallsFirst).unwrap();
    let inp = staged(&manifest, "solver.inp");

    assert!(inp.contains("# CARDIOVASCULAR MODELING PARAMETERS: RCR\n# {\n    RCR Values From File : True\n"));
    assert!(inp.contains("    List of RCR Surfaces : 4\n"));
    assert!(inp.contains("    List of Dirichlet Surfaces : 3\n"));
    assert!(inp.contains("    List of Output Surfaces : 3 4\n"));
    assert!(inp.contains("    Surface ID's for Force Calculation : 2\n"));
    assert!(inp.contains("    Step Construction : 0 1 0 1 0 1 0 1 0 1  # this is the standard 5 iteration\n"));
    assert!(inp.contains("    Time Step Size : 0.01\n"));
    assert!(!inp.contains("DEFORMABLE WALL PARAMETERS"));
}

#[test]
fn test_invalid_conditions_leave_output_untouched() {
    let model = pyramid();
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sim");
    let options = ExportOptions { output_dir: out.clone(), ..Default::default() };
    let exporter = Exporter::new(&model, &model);

    let mut study = rigid_study();
    for _ in 0..2 {
        study.boundary_conditions.push(BoundaryCondition::new(
            ConditionKind::InitialPressure { pressure: 1.0 },
            vec![],
        ));
    }
    let err = exporter.export(&study, &options).unwrap_err();
    assert!(matches!(err, ExportError::Validation(ValidationError::DuplicateUnique("InitialPressure"))));
    assert!(!out.exists());

    let mut study = rigid_study();
    study.boundary_conditions.clear();
    let err = exporter.export(&study, &options).unwrap_err();
    assert!(matches!(err, ExportError::Validation(ValidationError::NoBoundaryConditions)));
    assert!(!out.exists());
}

#[test]
fn test_export_without_presolver_writes_staged_files() {
    let model = pyramid();
    let dir = TempDir::new().unwrap();
    let options = ExportOptions { output_dir: dir.path().join("sim"), ..Default::default() };

    let report = Exporter::new(&model, &model).export(&rigid_study(), &options).unwrap();
    assert!(!report.presolver_ran);
    assert!(report.restart_augmented.is_none());
    assert_eq!(report.surfaces.len(), 3);
    for file in &report.files {
        assert!(options.output_dir.join(file).is_file(), "{} missing", file.display());
    }
    let supre = fs::read_to_string(options.output_dir.join("presolver/the.supre")).unwrap();
    assert!(supre.contains("noslip wall_Aorta_Main.nbc"));
    assert!(!options.output_dir.join("geombc.dat.1").exists());
}

#[test]
fn test_deformable_wall_with_isotropic_material() {
    let model = pyramid();
    let mut material = WallMaterial::isotropic();
    material.faces = vec![wall()];
    material.datum_mut(YOUNGS_MODULUS).unwrap().values = vec![1.0e6];
    material.datum_mut(THICKNESS).unwrap().values = vec![0.2];

    let study = deformable_study(vec![material]);
    let (manifest, _) = Exporter::new(&model, &model).stage(&study, FaceOrdering::WallsFirst).unwrap();

    assert_eq!(staged(&manifest, "SWB_ISO.dat"), "5 0.2 1000000.0\n6 0.2 1000000.0\n");
    assert!(manifest.get("SWB_ANISO.dat").is_none());

    let supre = staged(&manifest, "presolver/the.supre");
    assert!(supre.contains("initial_pressure 12000.0\n"));
    assert!(supre.contains("deformable_pressure 12000.0\n"));
    assert!(supre.contains("deformable_Evw 4661000.0\n"));
    assert!(supre.find("initial_pressure").unwrap() < supre.find("deformable_wall deformable_wall.ebc").unwrap());
    assert_eq!(staged(&manifest, "presolver/deformable_wall.ebc"), "1 5 1 2 6\n2 6 2 3 6\n");

    let inp = staged(&manifest, "solver.inp");
    assert!(inp.contains("    Deformable Wall : True\n"));
    assert!(inp.contains("    Use SWB File : True\n"));
    assert!(inp.contains("    Shear Constant of Vessel Wall : 0.8333333\n"));
}

#[test]
fn test_anisotropic_material_writes_rotated_rows() {
    let model = pyramid();
    let mut material = WallMaterial::anisotropic();
    material.faces = vec![wall()];
    material.datum_mut(ANISO_YOUNGS_MODULUS).unwrap().values = vec![7.0, 3.0, 11.0, 2.0, 13.0, 5.0];

    let study = deformable_study(vec![material]);
    let (manifest, _) = Exporter::new(&model, &model).stage(&study, FaceOrdering::WallsFirst).unwrap();

    // wall faces without an isotropic material fall back to the wall defaults
    assert_eq!(staged(&manifest, "SWB_ISO.dat"), "5 1.0 4661000.0\n6 1.0 4661000.0\n");

    let aniso = staged(&manifest, "SWB_ANISO.dat");
    let rows: Vec<Vec<&str>> = aniso.lines().map(|l| l.split(' ').collect()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "5");
    assert_eq!(rows[1][0], "6");
    for row in &rows {
        assert_eq!(row.len(), 17);
        assert_eq!(row[1], "1.0");
        for token in &row[2..] {
            assert!(token.parse::<f64>().unwrap().is_finite());
        }
    }
}

/// One tetrahedron whose wall triangle lies in the z = 0 plane, with a single
/// path point carrying the given frame.
fn flat_wall_model(tangent: [f64; 3], normal: [f64; 3]) -> MeshModel {
    let json = format!(
        r#"{{
            "nodes": [[0,0,0], [1,0,0], [0,1,0], [0,0,-1]],
            "elements": [[0,1,2,3]],
            "adjacency": [[]],
            "faces": [{{
                "identifier": {{"face_type": "Wall", "parent_solids": ["aorta"]}},
                "normal": [0, 0, 1],
                "triangles": [{{"element": 0, "face": 0, "nodes": [0, 1, 2]}}]
            }}],
            "paths": {{"aorta": [
                {{"position": [0,0,0], "tangent": {tangent:?}, "normal": {normal:?}, "arc_length": 0.0, "radius": 1.0}}
            ]}}
        }}"#
    );
    MeshModel::from_json(&json).unwrap()
}

fn anisotropic_row(model: &MeshModel, components: Option<Vec<f64>>) -> Vec<f64> {
    let mut material = WallMaterial::anisotropic();
    material.faces = vec![wall()];
    if let Some(values) = components {
        material.datum_mut(ANISO_YOUNGS_MODULUS).unwrap().values = values;
    }
    let mut study = StudyDescription::default();
    study.boundary_conditions = vec![
        BoundaryCondition::new(ConditionKind::InitialPressure { pressure: 12000.0 }, vec![]),
        BoundaryCondition::new(ConditionKind::DeformableWall(DeformableWall::default()), vec![wall()]),
    ];
    study.materials = vec![material];

    let (manifest, _) = Exporter::new(model, model).stage(&study, FaceOrdering::WallsFirst).unwrap();
    let aniso = staged(&manifest, "SWB_ANISO.dat");
    let mut lines = aniso.lines();
    let row = lines.next().unwrap();
    assert!(lines.next().is_none());
    let tokens: Vec<&str> = row.split(' ').collect();
    assert_eq!(tokens[..2], ["1", "1.0"]);
    tokens[2..].iter().map(|t| t.parse().unwrap()).collect()
}

#[test]
fn test_aligned_frames_write_the_unrotated_stiffness() {
    let model = flat_wall_model([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]);
    let c = [7.0, 3.0, 11.0, 2.0, 13.0, 5.0];
    let expected = tensor::upper_triangle(&tensor::project(&tensor::elasticity_tensor(&c)));

    assert_eq!(anisotropic_row(&model, Some(c.to_vec())), expected.to_vec());
    let mut slots = [0.0; 15];
    for (slot, value) in [(0, 7.0), (1, 3.0), (5, 11.0), (9, 2.0), (12, 13.0), (14, 5.0)] {
        slots[slot] = value;
    }
    assert_eq!(expected, slots);
}

#[test]
fn test_unauthored_components_use_the_wall_modulus() {
    let model = flat_wall_model([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]);
    let defaults = anisotropic_row(&model, Some(vec![4661000.0; 6]));
    assert_eq!(anisotropic_row(&model, None), defaults);
    assert_eq!(defaults[0], 4661000.0);
}

#[test]
fn test_quarter_turn_swaps_axial_and_circumferential() {
    // path axis along x: the face e1 edge is axial, e2 is circumferential
    let model = flat_wall_model([1.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
    let row = anisotropic_row(&model, Some(vec![7.0, 3.0, 11.0, 2.0, 13.0, 5.0]));

    let mut expected = [0.0; 15];
    for (slot, value) in [(0, 11.0), (1, 3.0), (5, 7.0), (9, 2.0), (12, 5.0), (14, 13.0)] {
        expected[slot] = value;
    }
    assert_eq!(row, expected.to_vec());
}

#[test]
fn test_out_of_range_face_indices_are_rejected() {
    let bad_cap = PYRAMID_JSON.replace("[0, 1, 4]", "[0, 1, 99]");
    assert_ne!(bad_cap, PYRAMID_JSON);
    let err = MeshModel::from_json(&bad_cap).unwrap_err();
    assert!(err.to_string().contains("node 99"), "{err}");

    let bad_wall = PYRAMID_JSON.replace("[0, 1, 5]", "[0, 1, 77]");
    assert_ne!(bad_wall, PYRAMID_JSON);
    assert!(MeshModel::from_json(&bad_wall).is_err());

    let bad_element = PYRAMID_JSON.replace(r#""element": 3, "face": 7"#, r#""element": 9, "face": 7"#);
    assert_ne!(bad_element, PYRAMID_JSON);
    assert!(MeshModel::from_json(&bad_element).is_err());
}

#[test]
fn test_netlist_outflow_files() {
    let model = pyramid();
    let mut study = rigid_study();
    study.boundary_conditions[2] = BoundaryCondition::new(
        ConditionKind::Netlist {
            surfaces_dat:    "# netlist surfaces\n1\n".into(),
            auxiliary_files: BTreeMap::from([("circuit_1.dat".to_owned(), "R 1 2 100.0\n".to_owned())]),
        },
        vec![outflow()],
    );
    let (manifest, _) = Exporter::new(&model, &model).stage(&study, FaceOrdering::WallsFirst).unwrap();

    assert_eq!(staged(&manifest, "netlist_surfaces.dat"), "# netlist surfaces\n1\n");
    assert_eq!(staged(&manifest, "circuit_1.dat"), "R 1 2 100.0\n");
    assert_eq!(
        staged(&manifest, "faceInfo.dat"),
        "PrescribedVelocities 3 inflow_Aorta_Main\nNetlist 4 outflow_Aorta_Main\n"
    );
    assert!(staged(&manifest, "presolver/the.supre").contains("zero_pressure outflow_Aorta_Main.ebc\n"));
    assert!(manifest.get("rcrt.dat").is_none());

    let inp = staged(&manifest, "solver.inp");
    assert!(inp.contains(
        "# CARDIOVASCULAR MODELING PARAMETERS: NETLIST LPN\n# {\n    \
         Number of Netlist LPN Surfaces : 1\n    \
         List of Netlist LPN Surfaces : 4\n# }\n"
    ));
    assert!(!inp.contains("CARDIOVASCULAR MODELING PARAMETERS: RCR"));
}

#[test]
fn test_materials_require_deformable_wall() {
    let model = pyramid();
    let mut study = rigid_study();
    study.materials = vec![WallMaterial::isotropic()];
    let err = Exporter::new(&model, &model).stage(&study, FaceOrdering::WallsFirst).unwrap_err();
    assert!(matches!(err, ExportError::Validation(ValidationError::MissingCompanion { .. })));
}

#[test]
fn test_study_json_round_trip() {
    let study = deformable_study(vec![WallMaterial::anisotropic()]);
    let json = study.to_json().unwrap();
    assert_eq!(StudyDescription::from_json(&json).unwrap(), study);
}

#[test]
fn test_load_solution_is_node_major() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ybar.20.1");
    {
        let mut writer = ContainerWriter::new(File::create(&path).unwrap());
        writer.write_file_header().unwrap();
        writer.write_data_block("ybar", &array![[1.0, 2.0, 3.0, 4.0]], &[1, 20]).unwrap();
    }
    let fields = load_solution(&path).unwrap();
    assert_eq!(fields["ybar"], array![[1.0], [2.0], [3.0], [4.0]]);

    let other = dir.path().join("geombc.dat.1");
    fs::copy(&path, &other).unwrap();
    assert!(load_solution(&other).is_err());
}
