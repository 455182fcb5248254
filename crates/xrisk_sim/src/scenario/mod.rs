//! Scenarios and their generators.
//!
//! A [`Scenario`] is one market snapshot keyed by [`RiskFactorKey`]. It is
//! produced date by date from a [`ScenarioGenerator`]:
//!
//! - [`CrossAssetModelScenarioGenerator`]: simulated paths of the
//!   cross-asset model
//! - [`CsvScenarioGenerator`]: replay of a scenario file
//! - [`HistoricalScenarioGenerator`]: historical return windows applied to
//!   a base scenario

mod csv_io;
mod date_grid;
mod generator;
mod historical;
mod key;
mod simple;

pub use csv_io::{CsvScenarioGenerator, CsvScenarioReader, CsvScenarioWriter, ScenarioRecord, DEFAULT_SEPARATOR};
pub use date_grid::DateGrid;
pub use generator::{
    CrossAssetModelScenarioGenerator, GeneratorSettings, ScenarioGenerator, ScenarioGeneratorBuilder,
    SequenceType,
};
pub use historical::{HistoricalScenarioFileReader, HistoricalScenarioGenerator, ReturnConfig, ReturnType};
pub use key::{KeyType, RiskFactorKey};
pub use simple::{Scenario, ScenarioFactory, SimpleScenario, SimpleScenarioFactory};
