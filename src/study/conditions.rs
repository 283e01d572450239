//! Boundary conditions and their translation into presolver directives,
//! auxiliary data files and `solver.inp` groups.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::faces::{join_ids, FaceIndex, Surface};
use super::flow_profile::{steady_value, FlowProfile, ProfileType};
use super::geometry::write_ebc;
use super::solver_inp::{SolverInp, DEFORMABLE_WALL};
use super::{ExportError, SUPRE_FILE};
use crate::manifest::FileManifest;
use crate::material::WallMaterial;
use crate::mesh::{FaceIdentifier, MeshData, SolidModel};

pub const DEFAULT_INITIAL_PRESSURE: f64 = 13332.0;
const SHEAR_CONSTANT: f64 = 0.8333333;
const WALL_PROPERTIES_PER_NODE: i64 = 10;
/// Reserved first line of the flow files, filled in once all points are known.
const BCT_RESERVED: usize = 50;

const RCR_GROUP: &str = "CARDIOVASCULAR MODELING PARAMETERS: RCR";
const BCT_GROUP: &str = "CARDIOVASCULAR MODELING PARAMETERS: PRESCRIBED VELOCITIES";
const NETLIST_GROUP: &str = "CARDIOVASCULAR MODELING PARAMETERS: NETLIST LPN";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("No boundary conditions are defined")]
    NoBoundaryConditions,
    #[error("Multiple instances of boundary condition {0} are not allowed in a single study")]
    DuplicateUnique(&'static str),
    #[error("{kind} requires a {requires} boundary condition")]
    MissingCompanion { kind: &'static str, requires: &'static str },
    #[error("Flow profile {0:?} is not supported for prescribed velocities")]
    UnsupportedProfile(ProfileType),
    #[error("Prescribed velocity waveform needs at least two samples with increasing time")]
    EmptyWaveform,
    #[error("Flow profile over surface '{0}' has no volume")]
    DegenerateProfile(String),
    #[error("Auxiliary file name '{0}' must be a plain relative path")]
    AuxiliaryPath(String),
}

/// Vessel wall mechanics of a deformable-wall simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeformableWall {
    pub density:               f64,
    pub thickness:             f64,
    pub youngs_modulus:        f64,
    pub poisson_ratio:         f64,
    pub tissue_support:        bool,
    pub stiffness_coefficient: f64,
    pub damping:               bool,
    pub damping_coefficient:   f64,
}

impl Default for DeformableWall {
    fn default() -> Self {
        Self {
            density:               0.001,
            thickness:             1.0,
            youngs_modulus:        4661000.0,
            poisson_ratio:         0.5,
            tissue_support:        true,
            stiffness_coefficient: 40.0,
            damping:               true,
            damping_coefficient:   100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ConditionKind {
    NoSlip,
    InitialPressure {
        pressure: f64,
    },
    ZeroPressure,
    Rcr {
        proximal_resistance: f64,
        capacitance:         f64,
        distal_resistance:   f64,
    },
    PrescribedVelocities {
        #[serde(default)]
        profile:  ProfileType,
        /// `(time, flow rate)` samples.
        waveform: Vec<[f64; 2]>,
    },
    Netlist {
        surfaces_dat: String,
        /// Circuit description files written verbatim, keyed by file name.
        #[serde(default)]
        auxiliary_files: BTreeMap<String, String>,
    },
    DeformableWall(DeformableWall),
}

impl ConditionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConditionKind::NoSlip                      => "NoSlip",
            ConditionKind::InitialPressure { .. }      => "InitialPressure",
            ConditionKind::ZeroPressure                => "ZeroPressure",
            ConditionKind::Rcr { .. }                  => "RCR",
            ConditionKind::PrescribedVelocities { .. } => "PrescribedVelocities",
            ConditionKind::Netlist { .. }              => "Netlist",
            ConditionKind::DeformableWall(_)           => "DeformableWall",
        }
    }

    /// At most one instance may exist per study.
    pub fn is_unique(&self) -> bool {
        matches!(self, ConditionKind::InitialPressure { .. } | ConditionKind::DeformableWall(_))
    }

    /// Processing order. Wall setup reads the initial pressure, so it runs last.
    pub fn priority(&self) -> u8 {
        match self {
            ConditionKind::Rcr { .. } | ConditionKind::Netlist { .. } => 1,
            ConditionKind::DeformableWall(_) => 2,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCondition {
    #[serde(flatten)]
    pub kind:  ConditionKind,
    #[serde(default)]
    pub faces: Vec<FaceIdentifier>,
}

impl BoundaryCondition {
    pub fn new(kind: ConditionKind, faces: Vec<FaceIdentifier>) -> Self {
        Self { kind, faces }
    }
}

/// Check the whole condition set before anything is staged.
pub fn validate(conditions: &[BoundaryCondition], materials: &[WallMaterial]) -> Result<(), ValidationError> {
    if conditions.is_empty() {
        return Err(ValidationError::NoBoundaryConditions);
    }

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for bc in conditions {
        *counts.entry(bc.kind.name()).or_default() += 1;
    }
    if let Some(bc) = conditions.iter().find(|bc| bc.kind.is_unique() && counts[bc.kind.name()] > 1) {
        return Err(ValidationError::DuplicateUnique(bc.kind.name()));
    }

    let has = |name: &str| counts.contains_key(name);
    if has("DeformableWall") && !has("InitialPressure") {
        return Err(ValidationError::MissingCompanion { kind: "DeformableWall", requires: "InitialPressure" });
    }
    if !materials.is_empty() && !has("DeformableWall") {
        return Err(ValidationError::MissingCompanion { kind: "WallMaterial", requires: "DeformableWall" });
    }

    for bc in conditions {
        match &bc.kind {
            ConditionKind::PrescribedVelocities { profile, waveform } => {
                if *profile == ProfileType::Womersley {
                    return Err(ValidationError::UnsupportedProfile(*profile));
                }
                let increasing = waveform.windows(2).all(|w| w[1][0] > w[0][0]);
                if waveform.len() < 2 || !increasing {
                    return Err(ValidationError::EmptyWaveform);
                }
            }
            ConditionKind::Netlist { auxiliary_files, .. } => {
                for name in auxiliary_files.keys() {
                    let plain = Path::new(name).components().all(|c| matches!(c, Component::Normal(_)));
                    if name.is_empty() || !plain {
                        return Err(ValidationError::AuxiliaryPath(name.clone()));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[derive(Default)]
struct SurfaceList {
    started:  bool,
    face_ids: Vec<u32>,
}

#[derive(Default)]
struct BctState {
    surfaces:    SurfaceList,
    points:      usize,
    max_steps:   usize,
}

pub(crate) struct ConditionWriter<'a> {
    pub mesh:  &'a dyn MeshData,
    pub model: &'a dyn SolidModel,
    pub faces: &'a FaceIndex,
    /// Wall properties come from SWB files.
    pub swb:   bool,
}

impl ConditionWriter<'_> {
    /// Surfaces of `bc` that the model actually contains.
    fn surfaces<'b>(&'b self, bc: &'b BoundaryCondition) -> impl Iterator<Item = &'b Surface> + 'b {
        bc.faces
            .iter()
            .filter(|id| self.model.face_index(id).is_some())
            .filter_map(|id| self.faces.get(id))
    }

    /// Stage every condition in processing order.
    pub fn write(
        &self,
        conditions: &[BoundaryCondition],
        manifest: &mut FileManifest,
        inp: &mut SolverInp,
    ) -> Result<(), ExportError> {
        let mut ordered: Vec<&BoundaryCondition> = conditions.iter().collect();
        ordered.sort_by(|a, b| {
            (a.kind.priority(), a.kind.name()).cmp(&(b.kind.priority(), b.kind.name()))
        });

        let mut initial_pressure = DEFAULT_INITIAL_PRESSURE;
        let mut rcr = SurfaceList::default();
        let mut bct = BctState::default();
        let mut netlist = SurfaceList::default();

        for bc in ordered {
            match &bc.kind {
                ConditionKind::NoSlip => {
                    let supre = manifest.file(SUPRE_FILE);
                    for s in self.surfaces(bc) {
                        writeln!(supre, "noslip {}.nbc", s.name)?;
                    }
                    writeln!(supre)?;
                }

                ConditionKind::InitialPressure { pressure } => {
                    initial_pressure = *pressure;
                    write!(manifest.file(SUPRE_FILE), "initial_pressure {pressure:?}\n\n")?;
                }

                ConditionKind::ZeroPressure => {
                    let supre = manifest.file(SUPRE_FILE);
                    for s in self.surfaces(bc) {
                        writeln!(supre, "zero_pressure {}.ebc", s.name)?;
                    }
                    writeln!(supre)?;
                }

                ConditionKind::Rcr { proximal_resistance, capacitance, distal_resistance } => {
                    if !rcr.started {
                        rcr.started = true;
                        writeln!(manifest.file("rcrt.dat"), "2")?;
                    }
                    for s in self.surfaces(bc) {
                        writeln!(manifest.file(SUPRE_FILE), "zero_pressure {}.ebc", s.name)?;
                        writeln!(manifest.file("faceInfo.dat"), "RCR {} {}", s.id, s.name)?;
                        write!(
                            manifest.file("rcrt.dat"),
                            "2\n{proximal_resistance:?}\n{capacitance:?}\n{distal_resistance:?}\n0 0.0\n1.1 0.0\n"
                        )?;
                        rcr.face_ids.push(s.id);
                    }
                    writeln!(manifest.file(SUPRE_FILE))?;
                }

                ConditionKind::PrescribedVelocities { profile, waveform } => {
                    self.write_prescribed_velocities(bc, *profile, waveform, manifest, &mut bct)?;
                }

                ConditionKind::Netlist { surfaces_dat, auxiliary_files } => {
                    netlist.started = true;
                    for s in self.surfaces(bc) {
                        writeln!(manifest.file(SUPRE_FILE), "zero_pressure {}.ebc", s.name)?;
                        writeln!(manifest.file("faceInfo.dat"), "Netlist {} {}", s.id, s.name)?;
                        netlist.face_ids.push(s.id);
                    }
                    writeln!(manifest.file(SUPRE_FILE))?;
                    manifest.file("netlist_surfaces.dat").write_all(surfaces_dat.as_bytes())?;
                    for (name, content) in auxiliary_files {
                        manifest.file(name).write_all(content.as_bytes())?;
                    }
                }

                ConditionKind::DeformableWall(wall) => {
                    let ebc = manifest.file("presolver/deformable_wall.ebc");
                    let ids: Vec<&FaceIdentifier> = self.surfaces(bc).map(|s| &s.identifier).collect();
                    write_ebc(self.mesh, ids, ebc)?;

                    let supre = manifest.file(SUPRE_FILE);
                    writeln!(supre, "deformable_wall deformable_wall.ebc")?;
                    writeln!(supre, "fix_free_edge_nodes deformable_wall.ebc")?;
                    writeln!(supre, "number_of_wall_Props {WALL_PROPERTIES_PER_NODE}")?;
                    writeln!(supre, "deformable_create_mesh deformable_wall.ebc")?;
                    writeln!(supre, "deformable_write_feap inputdataformatlab.dat")?;
                    writeln!(supre, "deformable_pressure {initial_pressure:?}")?;
                    writeln!(supre, "deformable_Evw {:?}", wall.youngs_modulus)?;
                    writeln!(supre, "deformable_nuvw {:?}", wall.poisson_ratio)?;
                    writeln!(supre, "deformable_thickness {:?}", wall.thickness)?;
                    writeln!(supre, "deformable_kcons {SHEAR_CONSTANT:?}")?;
                    write!(supre, "deformable_solve\n\n")?;

                    inp.group(DEFORMABLE_WALL)
                        .set("Deformable Wall", true)
                        .set("Density of Vessel Wall", wall.density)
                        .set("Thickness of Vessel Wall", wall.thickness)
                        .set("Young Mod of Vessel Wall", wall.youngs_modulus)
                        .set("Poisson Ratio of Vessel Wall", wall.poisson_ratio)
                        .set("Shear Constant of Vessel Wall", SHEAR_CONSTANT)
                        .set("Number of Wall Properties per Node", WALL_PROPERTIES_PER_NODE)
                        .set("Use SWB File", self.swb)
                        .set("Use TWB File", false)
                        .set("Use EWB File", false)
                        .set("Wall External Support Term", wall.tissue_support)
                        .set("Stiffness Coefficient for Tissue Support", wall.stiffness_coefficient)
                        .set("Wall Damping Term", wall.damping)
                        .set("Damping Coefficient for Tissue Support", wall.damping_coefficient)
                        .set("Wall State Filter Term", false)
                        .set("Wall State Filter Coefficient", 0i64);
                }
            }
        }

        if rcr.started {
            inp.group(RCR_GROUP)
                .set("RCR Values From File", true)
                .set("Number of RCR Surfaces", rcr.face_ids.len())
                .set("List of RCR Surfaces", join_ids(&rcr.face_ids));
        }

        if bct.surfaces.started {
            manifest.file("bct.dat").patch(0, format!("{} {}", bct.points, bct.max_steps).as_bytes());
            manifest.file("bct_steady.dat").patch(0, format!("{} 2", bct.points).as_bytes());
            inp.group(BCT_GROUP)
                .set("Time Varying Boundary Conditions From File", true)
                .set("BCT Time Scale Factor", 1.0)
                .set("Number of Dirichlet Surfaces Which Output Pressure and Flow", bct.surfaces.face_ids.len())
                .set("List of Dirichlet Surfaces", join_ids(&bct.surfaces.face_ids));
        }

        if netlist.started {
            inp.group(NETLIST_GROUP)
                .set("Number of Netlist LPN Surfaces", netlist.face_ids.len())
                .set("List of Netlist LPN Surfaces", join_ids(&netlist.face_ids));
        }
        Ok(())
    }

    fn write_prescribed_velocities(
        &self,
        bc: &BoundaryCondition,
        profile: ProfileType,
        waveform: &[[f64; 2]],
        manifest: &mut FileManifest,
        bct: &mut BctState,
    ) -> Result<(), ExportError> {
        if !bct.surfaces.started {
            bct.surfaces.started = true;
            let reserved = format!("{}\n", " ".repeat(BCT_RESERVED));
            manifest.file("bct.dat").write_all(reserved.as_bytes())?;
            manifest.file("bct_steady.dat").write_all(reserved.as_bytes())?;
        }
        bct.max_steps = bct.max_steps.max(waveform.len());

        let surfaces: Vec<&Surface> = self.surfaces(bc).collect();
        for s in &surfaces {
            writeln!(manifest.file(SUPRE_FILE), "prescribed_velocities {}.nbc", s.name)?;
            writeln!(manifest.file("faceInfo.dat"), "PrescribedVelocities {} {}", s.id, s.name)?;
            bct.surfaces.face_ids.push(s.id);
        }
        writeln!(manifest.file(SUPRE_FILE))?;

        let mean = steady_value(waveform);
        let steady = [[waveform[0][0], mean], [waveform[waveform.len() - 1][0], mean]];

        for s in &surfaces {
            let flow = FlowProfile::new(profile, self.model, self.mesh, &s.identifier)
                .ok_or_else(|| ValidationError::DegenerateProfile(s.name.clone()))?;
            for (file, wave) in [("bct.dat", waveform), ("bct_steady.dat", &steady[..])] {
                let out = manifest.file(file);
                for node in flow.nodes() {
                    let [x, y, z] = self.mesh.node_coordinates(node);
                    writeln!(out, "{x:?} {y:?} {z:?} {}", wave.len())?;
                    for &[time, rate] in wave {
                        let [vx, vy, vz] = flow.velocity(node, rate);
                        writeln!(out, "{vx:?} {vy:?} {vz:?} {time:?}")?;
                    }
                }
            }
            bct.points += flow.nodes().count();
        }
        Ok(())
    }
}
