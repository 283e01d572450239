//! `solver.inp`: grouped key/value configuration read by the flow solver.
//!
//! Groups are emitted sorted by name, keys in the order they were first set.
//! Floats use Rust's shortest round-trip form, which always keeps a decimal
//! point or an exponent (`1.0`, `0.01`, `1e-5`); booleans are `True`/`False`.

use std::collections::BTreeMap;
use std::fmt;

use super::faces::{join_ids, FaceIndex};
use super::parameters::{Scalar, SolverParameters};
use crate::mesh::FaceType;

pub const SOLUTION_CONTROL: &str = "SOLUTION CONTROL";
pub const OUTPUT_CONTROL: &str = "OUTPUT CONTROL";
pub const MATERIAL_PROPERTIES: &str = "MATERIAL PROPERTIES";
pub const CARDIOVASCULAR: &str = "CARDIOVASCULAR MODELING PARAMETERS";
pub const LINEAR_SOLVER: &str = "LINEAR SOLVER";
pub const DISCRETIZATION_CONTROL: &str = "DISCRETIZATION CONTROL";
pub const DEFORMABLE_WALL: &str = "DEFORMABLE WALL PARAMETERS";

#[derive(Debug, Clone, PartialEq)]
pub enum InpValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for InpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InpValue::Int(v)   => write!(f, "{v}"),
            InpValue::Float(v) => write!(f, "{v:?}"),
            InpValue::Bool(v)  => f.write_str(if *v { "True" } else { "False" }),
            InpValue::Text(v)  => f.write_str(v),
        }
    }
}

impl From<i64> for InpValue {
    fn from(v: i64) -> Self { InpValue::Int(v) }
}
impl From<u32> for InpValue {
    fn from(v: u32) -> Self { InpValue::Int(v.into()) }
}
impl From<usize> for InpValue {
    fn from(v: usize) -> Self { InpValue::Int(v as i64) }
}
impl From<f64> for InpValue {
    fn from(v: f64) -> Self { InpValue::Float(v) }
}
impl From<bool> for InpValue {
    fn from(v: bool) -> Self { InpValue::Bool(v) }
}
impl From<&str> for InpValue {
    fn from(v: &str) -> Self { InpValue::Text(v.to_owned()) }
}
impl From<String> for InpValue {
    fn from(v: String) -> Self { InpValue::Text(v) }
}

/// Keys of one group in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    entries: Vec<(String, InpValue)>,
}

impl Group {
    /// Set `key`, keeping its original position when it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<InpValue>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_owned(), value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&InpValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InpValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverInp {
    groups: BTreeMap<String, Group>,
}

impl SolverInp {
    /// Group `name`, created empty on first use.
    pub fn group(&mut self, name: &str) -> &mut Group {
        self.groups.entry(name.to_owned()).or_default()
    }

    pub fn get(&self, group: &str, key: &str) -> Option<&InpValue> {
        self.groups.get(group)?.get(key)
    }

    /// Base configuration derived from the solver parameters and surfaces.
    pub fn from_parameters(params: &SolverParameters, faces: &FaceIndex, scalars: &[Scalar]) -> Self {
        let coupled = faces.ids_where(|t| t == FaceType::CapOutflow);
        let outputs = faces.ids_where(|t| t != FaceType::Wall);
        let walls = faces.ids_where(|t| t == FaceType::Wall);
        let has_scalars = !scalars.is_empty();

        let mut inp = SolverInp::default();

        inp.group(SOLUTION_CONTROL)
            .set("Equation of State", "Incompressible")
            .set("Number of Timesteps", params.time_steps)
            .set("Time Step Size", params.time_step_size);

        let output = inp.group(OUTPUT_CONTROL);
        output
            .set("Print Error Indicators", true)
            .set("Number of Timesteps between Restarts", params.steps_between_restarts)
            .set("Print ybar", params.output_error_indicator);
        if params.output_wall_shear_stress {
            output
                .set("Number of Force Surfaces", walls.len())
                .set("Surface ID's for Force Calculation", join_ids(&walls));
        }

        let material = inp.group(MATERIAL_PROPERTIES);
        material.set("Viscosity", params.viscosity).set("Density", params.density);
        if has_scalars {
            let diffusivities: String = scalars
                .iter()
                .map(|s| format!("{:?} ", s.diffusion_coefficient))
                .collect();
            material.set("Scalar Diffusivity", diffusivities);
        }

        let cardio = inp.group(CARDIOVASCULAR);
        cardio
            .set("Global Node Numbering", true)
            .set("Influx Coefficient", params.influx_coefficient)
            .set("Residual Control", params.residual_control)
            .set("Residual Criteria", params.residual_criteria);
        if has_scalars {
            cardio.set("Scalar Residual Control", params.scalar_residual_control);
            for i in 1..=scalars.len() {
                cardio.set(&format!("Scalar {i} Solver Tolerance"), params.scalar_residual_criteria);
            }
        }
        cardio
            .set("Minimum Required Iterations", params.minimum_iterations)
            .set("Number of Coupled Surfaces", coupled.len())
            .set("Pressure Coupling", params.pressure_coupling.name())
            .set("Number of Surfaces which Output Pressure and Flow", outputs.len())
            .set("List of Output Surfaces", join_ids(&outputs))
            .set("Simulate in Purely Zero Dimensions", params.purely_zero_dimensional);

        let linear = inp.group(LINEAR_SOLVER);
        if has_scalars {
            linear
                .set("Solve Scalars", scalars.len())
                .set("Step Construction", params.scalar_step_sequence.as_str());
        } else {
            let n = params.step_construction;
            linear.set(
                "Step Construction",
                format!("{} # this is the standard {} iteration", "0 1 ".repeat(n as usize), n),
            );
        }
        linear.set("Solver Type", params.solver_type.name());

        inp.group(DISCRETIZATION_CONTROL)
            .set("Basis Function Order", 1i64)
            .set("Quadrature Rule on Interior", 2i64)
            .set("Quadrature Rule on Boundary", 2i64)
            .set("Include Viscous Correction in Stabilization", true)
            .set("Lumped Mass Fraction on Left-hand-side", 0.0)
            .set("Lumped Mass Fraction on Right-hand-side", 0.0)
            .set("Time Integration Rule", "Second Order")
            .set("Time Integration Rho Infinity", 0.0)
            .set("Flow Advection Form", "Convective");

        inp
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, group) in &self.groups {
            out.push_str(&format!("\n\n# {name}\n# {{\n"));
            for (key, value) in group.iter() {
                out.push_str(&format!("    {key} : {value}\n"));
            }
            out.push_str("# }\n");
        }
        out
    }
}
