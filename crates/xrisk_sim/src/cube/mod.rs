//! NPV cubes and their decorators.
//!
//! - [`NpvCube`]: values per (id, date, sample, depth) plus T0 values
//! - [`InMemoryCube`]: dense `Vec<f64>` implementation
//! - [`CubeArena`] / [`CubeHandle`]: cube ownership for decorators
//! - [`JointNpvSensiCube`], [`OverlayNpvCube`]: read-through views
//! - [`SampleBuffer`] / [`SampleSliceMut`]: sample-major staging for
//!   parallel builds
//! - [`AggregationScenarioData`]: numeraire, FX spots and credit states
//!   stored per (date, sample)

mod arena;
mod buffer;
mod decorators;
mod in_memory;
mod npv_cube;
mod scenario_data;

pub use arena::{CubeArena, CubeHandle};
pub use buffer::{CubeWriter, SampleBuffer, SampleSliceMut};
pub use decorators::{BoundJointCube, BoundOverlayCube, JointNpvSensiCube, OverlayNpvCube};
pub use in_memory::InMemoryCube;
pub use npv_cube::NpvCube;
pub use scenario_data::{AggregationScenarioData, AggregationScenarioDataType};
