//! Persisted study configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::conditions::BoundaryCondition;
use super::faces::FaceOrdering;
use crate::material::WallMaterial;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolverType {
    #[default]
    #[serde(rename = "memLS")]
    MemLs,
    #[serde(rename = "acusim")]
    Acusim,
}

impl SolverType {
    pub fn name(self) -> &'static str {
        match self {
            SolverType::MemLs  => "memLS",
            SolverType::Acusim => "acusim",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CouplingType {
    Explicit,
    #[default]
    Implicit,
    #[serde(rename = "P-Implicit")]
    PImplicit,
}

impl CouplingType {
    pub fn name(self) -> &'static str {
        match self {
            CouplingType::Explicit  => "Explicit",
            CouplingType::Implicit  => "Implicit",
            CouplingType::PImplicit => "P-Implicit",
        }
    }
}

/// Flow solver settings. Every field defaults to the solver's stock value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParameters {
    pub time_steps:               u32,
    pub time_step_size:           f64,
    pub viscosity:                f64,
    pub density:                  f64,
    pub solver_type:              SolverType,
    pub steps_between_restarts:   u32,
    pub residual_control:         bool,
    pub residual_criteria:        f64,
    pub minimum_iterations:       u32,
    pub step_construction:        u32,
    pub pressure_coupling:        CouplingType,
    pub influx_coefficient:       f64,
    pub purely_zero_dimensional:  bool,
    pub scalar_residual_control:  bool,
    pub scalar_residual_criteria: f64,
    pub scalar_step_sequence:     String,
    pub output_wall_shear_stress: bool,
    pub output_error_indicator:   bool,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            time_steps:               200,
            time_step_size:           0.01,
            viscosity:                0.004,
            density:                  0.00106,
            solver_type:              SolverType::MemLs,
            steps_between_restarts:   5,
            residual_control:         true,
            residual_criteria:        0.001,
            minimum_iterations:       2,
            step_construction:        5,
            pressure_coupling:        CouplingType::Implicit,
            influx_coefficient:       0.5,
            purely_zero_dimensional:  false,
            scalar_residual_control:  true,
            scalar_residual_criteria: 0.001,
            scalar_step_sequence:     "0 1 0 1 0 1".into(),
            output_wall_shear_stress: true,
            output_error_indicator:   true,
        }
    }
}

/// Transported scalar species.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scalar {
    pub initial_value:         f64,
    pub diffusion_coefficient: f64,
}

/// Everything an export needs besides the mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyDescription {
    pub solver_parameters:   SolverParameters,
    pub boundary_conditions: Vec<BoundaryCondition>,
    pub materials:           Vec<WallMaterial>,
    pub scalars:             Vec<Scalar>,
    /// Display names of vessel paths, keyed by path id.
    pub vessel_path_names:   BTreeMap<String, String>,
    pub face_ordering:       FaceOrdering,
}

impl StudyDescription {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
