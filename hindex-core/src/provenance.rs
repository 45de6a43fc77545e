//! Provenance metadata attached to every derived index
//!
//! The record is plain data. Writing it alongside the output is left to the caller's
//! provenance logger.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Description of how a derived product was made
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub caption: String,
    pub statistics: Vec<String>,
    pub domains: Vec<String>,
    pub plot_types: Vec<String>,
    pub authors: Vec<String>,
    pub references: Vec<String>,
    /// Input files the product was computed from
    pub ancestors: Vec<PathBuf>,
}

/// Facts used to fill in the caption
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptionAttributes<'a> {
    pub long_name: &'a str,
    pub start_year: i32,
    pub end_year: i32,
    pub dataset: &'a str,
}

impl ProvenanceRecord {
    /// Record for a seasonal mean averaged over a range of years
    pub fn mean_over_years(attributes: &CaptionAttributes, ancestors: Vec<PathBuf>) -> Self {
        Self {
            caption: format!(
                "Average {} between {} and {} according to {}.",
                attributes.long_name, attributes.start_year, attributes.end_year, attributes.dataset
            ),
            statistics: vec!["mean".to_string()],
            domains: vec!["global".to_string()],
            plot_types: vec!["zonal".to_string()],
            authors: vec!["andela_bouwe".to_string(), "righi_mattia".to_string()],
            references: vec!["acknow_project".to_string()],
            ancestors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_and_fixed_fields() {
        let record = ProvenanceRecord::mean_over_years(
            &CaptionAttributes {
                long_name: "nao",
                start_year: 1962,
                end_year: 1969,
                dataset: "HadCM3",
            },
            vec![PathBuf::from("psl.nc")],
        );
        assert_eq!(record.caption, "Average nao between 1962 and 1969 according to HadCM3.");
        assert_eq!(record.statistics, vec!["mean"]);
        assert_eq!(record.ancestors, vec![PathBuf::from("psl.nc")]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["domains"], serde_json::json!(["global"]));
    }
}
