//! Hindcast index diagnostic
//!
//! Runs the full pipeline for each simulation unit (one initialization year and
//! ensemble member):
//!
//! 1. read the configured variables and sum them into one field
//! 2. optionally regrid onto the reference grid
//! 3. extract the index
//! 4. average into complete seasons
//! 5. average the seasons inside the lead-time window and apply the scale factor
//!
//! Units are independent and run in parallel. A failing unit is reported in its own
//! [`UnitOutcome`] and never stops the others.

use crate::catalog::{IndexCatalog, IndexDefinition};
use hindex_core::config::DiagnosticConfig;
use hindex_core::errors::{HindexError, HindexResult};
use hindex_core::field::GriddedField;
use hindex_core::lead_time::select;
use hindex_core::provenance::{CaptionAttributes, ProvenanceRecord};
use hindex_core::regrid::regrid;
use hindex_core::season::aggregate;
use hindex_core::simulation::SimulationRun;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Reads one variable of a gridded field from a file
pub trait FieldSource: Sync {
    fn read(&self, path: &Path, variable: &str) -> HindexResult<GriddedField>;
}

/// Persists derived indices
pub trait ResultSink: Sync {
    fn write(&self, result: &DerivedIndex) -> HindexResult<()>;
}

/// The inputs of one simulation run, one file per variable
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationUnit {
    pub run: SimulationRun,
    pub inputs: Vec<(String, PathBuf)>,
}

impl SimulationUnit {
    pub fn new(run: SimulationRun) -> Self {
        Self {
            run,
            inputs: vec![],
        }
    }

    pub fn with_input(mut self, variable: &str, path: impl Into<PathBuf>) -> Self {
        self.inputs.push((variable.to_string(), path.into()));
        self
    }

    fn input(&self, variable: &str) -> HindexResult<&Path> {
        self.inputs
            .iter()
            .find(|(v, _)| v == variable)
            .map(|(_, p)| p.as_path())
            .ok_or_else(|| {
                HindexError::Error(format!("{} has no input for variable '{}'", self.run, variable))
            })
    }
}

/// Final index for one simulation run
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedIndex {
    pub run: SimulationRun,
    pub index: String,
    /// Zero-dimensional for scalar indices
    pub field: GriddedField,
    /// Season years averaged into `field`
    pub season_years: Vec<i32>,
    pub provenance: ProvenanceRecord,
}

impl DerivedIndex {
    pub fn value(&self) -> Option<f64> {
        self.field.as_scalar()
    }

    pub fn output_filename(&self) -> HindexResult<String> {
        self.run.output_filename(&self.index)
    }
}

/// Result of processing one unit
#[derive(Debug)]
pub struct UnitOutcome {
    pub run: SimulationRun,
    pub result: HindexResult<DerivedIndex>,
}

/// A configured index diagnostic
#[derive(Clone, Debug)]
pub struct IndexDiagnostic {
    config: DiagnosticConfig,
    definition: IndexDefinition,
    target: Option<GriddedField>,
}

impl IndexDiagnostic {
    /// Validate the configuration against the standard catalog.
    ///
    /// The index is looked up before anything else so an unknown identifier fails
    /// without touching any data.
    pub fn new(config: DiagnosticConfig) -> HindexResult<Self> {
        Self::with_catalog(config, IndexCatalog::standard())
    }

    pub fn with_catalog(config: DiagnosticConfig, catalog: &IndexCatalog) -> HindexResult<Self> {
        let definition = catalog.get(&config.index)?.clone();
        config.validate()?;
        let target = if config.regrid {
            Some(config.target_grid.template()?)
        } else {
            None
        };
        Ok(Self {
            config,
            definition,
            target,
        })
    }

    pub fn config(&self) -> &DiagnosticConfig {
        &self.config
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    /// Run the pipeline on a field already in memory
    pub fn compute(
        &self,
        field: &GriddedField,
        run: &SimulationRun,
        ancestors: Vec<PathBuf>,
    ) -> HindexResult<DerivedIndex> {
        let regridded;
        let field = match &self.target {
            Some(target) => {
                regridded = regrid(field, target)?;
                &regridded
            }
            None => field,
        };

        let index = self.definition.extract(field)?;
        let series = aggregate(&index, &self.config.season, run.init_year)?;
        let window = select(&series, &self.config.lead_time)?;
        let reduced = if self.config.scale_factor == 1.0 {
            window.field
        } else {
            window.field.scaled(self.config.scale_factor)
        };

        let start_year = window.season_years.first().copied().unwrap_or(run.init_year);
        let end_year = window.season_years.last().copied().unwrap_or(run.init_year);
        let provenance = ProvenanceRecord::mean_over_years(
            &CaptionAttributes {
                long_name: &self.definition.long_name,
                start_year,
                end_year,
                dataset: &run.model,
            },
            ancestors,
        );

        Ok(DerivedIndex {
            run: run.clone(),
            index: self.definition.name.clone(),
            field: reduced,
            season_years: window.season_years,
            provenance,
        })
    }

    /// Read, combine and process the inputs of one unit
    pub fn run_unit(
        &self,
        unit: &SimulationUnit,
        source: &dyn FieldSource,
    ) -> HindexResult<DerivedIndex> {
        log::info!("Computing {} for {}", self.definition.name, unit.run);
        let variables: Vec<String> = if self.config.variables.is_empty() {
            unit.inputs.iter().take(1).map(|(v, _)| v.clone()).collect()
        } else {
            self.config.variables.clone()
        };
        if variables.is_empty() {
            return Err(HindexError::Error(format!("{} has no inputs", unit.run)));
        }

        let mut fields = Vec::with_capacity(variables.len());
        let mut ancestors = Vec::with_capacity(variables.len());
        for variable in &variables {
            let path = unit.input(variable)?;
            fields.push(source.read(path, variable)?);
            ancestors.push(path.to_path_buf());
        }
        let field = GriddedField::sum_of(&variables.join("+"), &fields)?;
        self.compute(&field, &unit.run, ancestors)
    }

    /// Process every unit in parallel, writing successes to `sink`
    pub fn run_all(
        &self,
        units: &[SimulationUnit],
        source: &dyn FieldSource,
        sink: &dyn ResultSink,
    ) -> Vec<UnitOutcome> {
        let outcomes: Vec<UnitOutcome> = units
            .par_iter()
            .map(|unit| {
                let result = self.run_unit(unit, source).and_then(|derived| {
                    sink.write(&derived)?;
                    Ok(derived)
                });
                if let Err(e) = &result {
                    log::warn!("Skipping {}: {}", unit.run, e);
                }
                UnitOutcome {
                    run: unit.run.clone(),
                    result,
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        log::info!(
            "Finished {}: {} of {} units succeeded",
            self.definition.name,
            outcomes.len() - failed,
            outcomes.len()
        );
        outcomes
    }
}
