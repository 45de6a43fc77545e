//! Simulation identity and input/output file naming
//!
//! Hindcast files follow the CMIP naming convention
//! `PROJECT_MODEL_MIP_EXPERIMENT_..._VARIABLE_GRID_YEARS.nc`. The initialization year and
//! ensemble member are encoded differently by CMIP5 (`decadal1960`, `r1i1p1`) and CMIP6
//! (`dcppA-hindcast`, `s1960-r1i1p1f1`).

use crate::errors::{HindexError, HindexResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Project {
    #[serde(rename = "CMIP5")]
    Cmip5,
    #[serde(rename = "CMIP6")]
    Cmip6,
}

impl FromStr for Project {
    type Err = HindexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CMIP5" => Ok(Project::Cmip5),
            "CMIP6" => Ok(Project::Cmip6),
            _ => Err(HindexError::Error(format!("unsupported project '{}'", s))),
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Project::Cmip5 => write!(f, "CMIP5"),
            Project::Cmip6 => write!(f, "CMIP6"),
        }
    }
}

/// Identity of one hindcast simulation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimulationRun {
    pub project: Project,
    pub model: String,
    pub mip: String,
    pub experiment: String,
    pub ensemble: String,
    pub init_year: i32,
}

impl SimulationRun {
    /// Realization number from a member label such as `r4i1p1f1`
    pub fn realization(&self) -> HindexResult<u32> {
        self.ensemble
            .strip_prefix('r')
            .map(|rest| rest.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| {
                HindexError::Error(format!(
                    "cannot read a realization number from '{}'",
                    self.ensemble
                ))
            })
    }

    /// Output file name for a derived variable of this run
    pub fn output_filename(&self, variable: &str) -> HindexResult<String> {
        Ok(output_filename(
            self.project,
            &self.model,
            self.init_year,
            self.realization()?,
            variable,
        ))
    }
}

impl fmt::Display for SimulationRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} s{} {}",
            self.project, self.model, self.experiment, self.init_year, self.ensemble
        )
    }
}

/// Parse the simulation identity from a CMIP file name or path.
///
/// ```rust
/// use hindex_core::simulation::{parse_filename, Project};
///
/// let run = parse_filename("CMIP6_CanESM5_Amon_dcppA-hindcast_s1960-r1i1p2f1_psl_gn_196101-197012.nc")
///     .unwrap();
/// assert_eq!(run.project, Project::Cmip6);
/// assert_eq!(run.init_year, 1960);
/// assert_eq!(run.ensemble, "r1i1p2f1");
/// ```
pub fn parse_filename(path: impl AsRef<Path>) -> HindexResult<SimulationRun> {
    let path = path.as_ref();
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    let fail = |reason: &str| HindexError::FilenameParse {
        filename: filename.clone(),
        reason: reason.to_string(),
    };

    let tokens: Vec<&str> = filename.split('_').collect();
    if tokens.len() < 5 {
        return Err(fail("expected at least five '_'-separated fields"));
    }
    let project: Project = tokens[0].parse().map_err(|_| fail("unknown project"))?;
    let experiment = tokens[3].to_string();

    let (ensemble, init_year) = match project {
        Project::Cmip5 => {
            let year = experiment
                .strip_prefix("decadal")
                .ok_or_else(|| fail("CMIP5 experiment is not 'decadalYYYY'"))?;
            (tokens[4].to_string(), year)
        }
        Project::Cmip6 => {
            let (start, member) = tokens[4]
                .split_once('-')
                .ok_or_else(|| fail("CMIP6 member is not 'sYYYY-rXiXpXfX'"))?;
            let year = start
                .strip_prefix('s')
                .ok_or_else(|| fail("CMIP6 member is not 'sYYYY-rXiXpXfX'"))?;
            (member.to_string(), year)
        }
    };
    let init_year = init_year
        .parse::<i32>()
        .map_err(|_| fail(&format!("'{}' is not a year", init_year)))?;

    Ok(SimulationRun {
        project,
        model: tokens[1].to_string(),
        mip: tokens[2].to_string(),
        experiment,
        ensemble,
        init_year,
    })
}

/// Name of the file a derived CMIP6-style product is written to.
///
/// The year range covers the eight years following initialization.
pub fn output_filename(
    project: Project,
    model: &str,
    init_year: i32,
    member: u32,
    variable: &str,
) -> String {
    format!(
        "{}_{}_Amon_dcppA-hindcast_s{}-r{}i1p1f1_{}_gn_{}-{}.nc",
        project,
        model,
        init_year,
        member,
        variable,
        init_year + 1,
        init_year + 8
    )
}

/// The single candidate whose name contains, in order, the initialization year, the
/// zero-padded member number and the variable, and ends in `.nc`
pub fn find_unique_input(
    candidates: &[PathBuf],
    init_year: i32,
    member: u32,
    variable: &str,
) -> HindexResult<PathBuf> {
    let parts = [init_year.to_string(), format!("{:03}", member), variable.to_string()];
    let matches: Vec<&PathBuf> = candidates
        .iter()
        .filter(|path| {
            path.file_name()
                .map(|name| contains_in_order(&name.to_string_lossy(), &parts))
                .unwrap_or(false)
        })
        .collect();
    match matches.as_slice() {
        [single] => Ok((*single).clone()),
        _ => Err(HindexError::FileDiscovery {
            pattern: format!("*{}*.nc", parts.join("*")),
            matches: matches.len(),
        }),
    }
}

/// Look in `root/variable/` for the input of one (year, member, variable) unit
pub fn discover_input(
    root: impl AsRef<Path>,
    init_year: i32,
    member: u32,
    variable: &str,
) -> HindexResult<PathBuf> {
    let dir = root.as_ref().join(variable);
    let candidates = std::fs::read_dir(&dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("{} candidate inputs in {}", candidates.len(), dir.display());
    find_unique_input(&candidates, init_year, member, variable)
}

fn contains_in_order(name: &str, parts: &[String]) -> bool {
    let Some(stem) = name.strip_suffix(".nc") else {
        return false;
    };
    let mut rest = stem;
    for part in parts {
        match rest.find(part.as_str()) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    true
}
