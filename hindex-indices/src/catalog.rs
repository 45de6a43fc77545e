//! Catalog of climate indices
//!
//! Each index is a pure recipe over a gridded field: an area-weighted box mean, a
//! difference or weighted combination of box means, a single grid point, a trimmed
//! region or the field itself. Recipes are data, so adding an index is adding a row
//! to [`IndexCatalog::standard`].
//!
//! ```rust
//! use hindex_indices::catalog::{IndexCatalog, IndexRecipe};
//!
//! let catalog = IndexCatalog::standard();
//! let nao = catalog.get("NAO").unwrap();
//! assert!(matches!(nao.recipe, IndexRecipe::BoxDifference { .. }));
//! assert!(catalog.get("not_an_index").is_err());
//! ```

use hindex_core::errors::{HindexError, HindexResult};
use hindex_core::field::GriddedField;
use hindex_core::spatial::{nearest_point, spatial_mean, spatial_subset, BoundingBox};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// How an index is computed from a field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexRecipe {
    /// Area-weighted mean over one box
    BoxMean { region: BoundingBox },
    /// Mean over `minuend` minus mean over `subtrahend`
    BoxDifference {
        minuend: BoundingBox,
        subtrahend: BoundingBox,
    },
    /// Sum of weighted box means
    WeightedCombination { terms: Vec<(f64, BoundingBox)> },
    /// Value at the grid cell nearest to a location
    NearestPoint { lon: f64, lat: f64 },
    /// The cells inside a box, without reduction
    FieldSubset { region: BoundingBox },
    /// The field unchanged
    Field,
}

impl IndexRecipe {
    pub fn apply(&self, field: &GriddedField) -> HindexResult<GriddedField> {
        match self {
            IndexRecipe::BoxMean { region } => spatial_mean(field, region),
            IndexRecipe::BoxDifference {
                minuend,
                subtrahend,
            } => {
                let a = spatial_mean(field, minuend)?;
                let b = spatial_mean(field, subtrahend)?;
                a.zip_with(&b, |x, y| x - y)
            }
            IndexRecipe::WeightedCombination { terms } => {
                if terms.len() < 2 {
                    return Err(HindexError::Error(
                        "a weighted combination needs at least two boxes".to_string(),
                    ));
                }
                let weighted = terms
                    .iter()
                    .map(|(weight, region)| Ok(spatial_mean(field, region)?.scaled(*weight)))
                    .collect::<HindexResult<Vec<_>>>()?;
                GriddedField::sum_of(&field.name, &weighted)
            }
            IndexRecipe::NearestPoint { lon, lat } => nearest_point(field, *lon, *lat),
            IndexRecipe::FieldSubset { region } => spatial_subset(field, region),
            IndexRecipe::Field => Ok(field.clone()),
        }
    }
}

/// A named index recipe
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub long_name: String,
    pub recipe: IndexRecipe,
}

impl IndexDefinition {
    pub fn new(name: &str, long_name: &str, recipe: IndexRecipe) -> Self {
        Self {
            name: name.to_string(),
            long_name: long_name.to_string(),
            recipe,
        }
    }

    /// Compute the index from a field; the result is named after the index
    pub fn extract(&self, field: &GriddedField) -> HindexResult<GriddedField> {
        log::debug!("Extracting {} from {}", self.name, field.name);
        Ok(self.recipe.apply(field)?.renamed(&self.name))
    }
}

/// Case-insensitive lookup table of index definitions
#[derive(Clone, Debug, Default)]
pub struct IndexCatalog {
    definitions: HashMap<String, IndexDefinition>,
}

fn region(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> BoundingBox {
    BoundingBox::new(lon_min, lon_max, lat_min, lat_max)
}

fn box_mean(name: &str, long_name: &str, bbox: BoundingBox) -> IndexDefinition {
    IndexDefinition::new(name, long_name, IndexRecipe::BoxMean { region: bbox })
}

fn box_difference(
    name: &str,
    long_name: &str,
    minuend: BoundingBox,
    subtrahend: BoundingBox,
) -> IndexDefinition {
    IndexDefinition::new(
        name,
        long_name,
        IndexRecipe::BoxDifference {
            minuend,
            subtrahend,
        },
    )
}

fn pass_through(name: &str) -> IndexDefinition {
    IndexDefinition::new(name, name, IndexRecipe::Field)
}

impl IndexCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in indices, constructed once
    pub fn standard() -> &'static IndexCatalog {
        static STANDARD: OnceLock<IndexCatalog> = OnceLock::new();
        STANDARD.get_or_init(Self::build_standard)
    }

    fn build_standard() -> Self {
        let uk = region(-8.0, 2.0, 50.0, 59.0);
        let nino34 = box_mean(
            "nino34",
            "Nino 3.4 sea surface temperature",
            region(-170.0, -120.0, -5.0, 5.0),
        );

        let mut catalog = Self::new();
        for definition in [
            box_difference(
                "nao",
                "North Atlantic Oscillation",
                region(-28.0, -20.0, 36.0, 40.0),
                region(-25.0, -16.0, 63.0, 70.0),
            ),
            IndexDefinition::new(
                "ea",
                "East Atlantic pattern",
                IndexRecipe::NearestPoint {
                    lon: -27.5,
                    lat: 52.5,
                },
            ),
            box_difference(
                "amv",
                "Atlantic Multidecadal Variability",
                region(-80.0, 0.0, 0.0, 60.0),
                region(-180.0, 180.0, -60.0, 60.0),
            ),
            box_mean("nino1", "Nino 1 sea surface temperature", region(-90.0, -80.0, -10.0, -5.0)),
            box_mean("nino2", "Nino 2 sea surface temperature", region(-90.0, -80.0, -5.0, 0.0)),
            box_mean("nino12", "Nino 1+2 sea surface temperature", region(-90.0, -80.0, -10.0, 0.0)),
            box_mean("nino3", "Nino 3 sea surface temperature", region(-150.0, -90.0, -5.0, 5.0)),
            nino34.clone(),
            IndexDefinition {
                name: "nino3_4".to_string(),
                ..nino34
            },
            box_mean("nino4", "Nino 4 sea surface temperature", region(160.0, -150.0, -5.0, 5.0)),
            box_difference(
                "iod",
                "Indian Ocean Dipole",
                region(50.0, 70.0, -10.0, 10.0),
                region(90.0, 110.0, -10.0, 0.0),
            ),
            box_difference(
                "pdv",
                "Pacific Decadal Variability",
                region(-160.0, -110.0, -10.0, 6.0),
                region(-180.0, -145.0, 30.0, 45.0),
            ),
            IndexDefinition::new(
                "ipo",
                "Interdecadal Pacific Oscillation",
                IndexRecipe::WeightedCombination {
                    terms: vec![
                        (1.0, region(170.0, -90.0, -10.0, 10.0)),
                        (-0.5, region(140.0, -145.0, 25.0, 45.0)),
                        (-0.5, region(150.0, -160.0, -50.0, -15.0)),
                    ],
                },
            ),
            box_mean("european_precip", "European precipitation", region(-10.0, 25.0, 55.0, 70.0)),
            box_mean("uk_precip", "UK precipitation", uk),
            box_mean("uk_temp", "UK temperature", uk),
            box_mean("sahel_precip", "Sahel precipitation", region(-16.0, 36.0, 10.0, 20.0)),
            IndexDefinition::new(
                "uk_precip_field",
                "UK precipitation field",
                IndexRecipe::FieldSubset { region: uk },
            ),
            pass_through("precip_field"),
            pass_through("temp_field"),
            pass_through("psl_field"),
            pass_through("tas_field"),
            pass_through("pr_field"),
        ] {
            catalog.insert(definition);
        }
        catalog
    }

    /// Add or replace a definition, keyed by its lowercased name
    pub fn insert(&mut self, definition: IndexDefinition) {
        self.definitions
            .insert(definition.name.to_lowercase(), definition);
    }

    pub fn get(&self, name: &str) -> HindexResult<&IndexDefinition> {
        self.definitions
            .get(&name.trim().to_lowercase())
            .ok_or_else(|| HindexError::UnknownIndex(name.to_string()))
    }

    /// Identifiers in alphabetical order
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hindex_core::field::Coordinate;
    use ndarray::{Array1, ArrayD, IxDyn};

    /// Global 2.5 degree field in the 0..360 convention with two time steps
    fn global_field(value: impl Fn(f64, f64) -> f64) -> GriddedField {
        let lat = Coordinate::regular("lat", -88.75, 88.75, 2.5).unwrap();
        let lon = Coordinate::regular("lon", 1.25, 358.75, 2.5).unwrap();
        let time = Coordinate::new("time", Array1::from(vec![0.0, 31.0]));
        let data = ArrayD::from_shape_fn(IxDyn(&[2, lat.len(), lon.len()]), |idx| {
            value(lat.values[idx[1]], lon.values[idx[2]])
        });
        GriddedField::new("psl", data, vec![time, lat, lon]).unwrap()
    }

    #[test]
    fn every_identifier_resolves() {
        let catalog = IndexCatalog::standard();
        for name in [
            "nao", "ea", "amv", "nino1", "nino2", "nino12", "nino3", "nino34", "nino3_4",
            "nino4", "iod", "pdv", "ipo", "european_precip", "uk_precip", "uk_temp",
            "sahel_precip", "uk_precip_field", "precip_field", "temp_field", "psl_field",
            "tas_field", "pr_field",
        ] {
            assert!(catalog.get(name).is_ok(), "{} missing", name);
        }
        assert_eq!(catalog.len(), 23);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let catalog = IndexCatalog::standard();
        assert_eq!(catalog.get("NINO3_4").unwrap().recipe, catalog.get("nino34").unwrap().recipe);
        assert_eq!(catalog.get("Uk_Precip").unwrap().name, "uk_precip");
        assert!(matches!(
            catalog.get("enso"),
            Err(HindexError::UnknownIndex(ref name)) if name == "enso"
        ));
    }

    #[test]
    fn nao_of_constant_field_is_zero() {
        let field = global_field(|_, _| 101325.0);
        let nao = IndexCatalog::standard().get("nao").unwrap().extract(&field).unwrap();
        assert_eq!(nao.name, "nao");
        assert_eq!(nao.dim_names(), vec!["time"]);
        for value in nao.data().iter() {
            assert_abs_diff_eq!(*value, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn nao_is_south_minus_north() {
        let field = global_field(|lat, _| if lat > 50.0 { 1000.0 } else { 3000.0 });
        let nao = IndexCatalog::standard().get("nao").unwrap().extract(&field).unwrap();
        assert_abs_diff_eq!(nao.data()[[0]], 2000.0, epsilon = 1e-9);
    }

    #[test]
    fn ipo_weights_sum_to_zero_on_constant_field() {
        let field = global_field(|_, _| 290.0);
        let ipo = IndexCatalog::standard().get("ipo").unwrap().extract(&field).unwrap();
        assert_abs_diff_eq!(ipo.data()[[1]], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn nino4_selects_the_dateline_region() {
        // 1 on the cells overlapping 160E to 150W, 0 elsewhere
        let field = global_field(|_, lon| if (157.5..=212.5).contains(&lon) { 1.0 } else { 0.0 });
        let nino4 = IndexCatalog::standard().get("nino4").unwrap().extract(&field).unwrap();
        assert_abs_diff_eq!(nino4.data()[[0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn ea_samples_one_point() {
        let field = global_field(|lat, lon| lat * 1000.0 + lon);
        let ea = IndexCatalog::standard().get("ea").unwrap().extract(&field).unwrap();
        assert_abs_diff_eq!(ea.data()[[0]], 51.25 * 1000.0 + 331.25, epsilon = 1e-9);
    }

    #[test]
    fn gridded_recipes_keep_spatial_axes() {
        let field = global_field(|_, _| 1.0);
        let catalog = IndexCatalog::standard();
        let subset = catalog.get("uk_precip_field").unwrap().extract(&field).unwrap();
        assert_eq!(subset.dim_names(), vec!["time", "lat", "lon"]);
        assert!(subset.shape()[1] < field.shape()[1]);

        let same = catalog.get("psl_field").unwrap().extract(&field).unwrap();
        assert_eq!(same.data(), field.data());
        assert_eq!(same.name, "psl_field");
    }

    #[test]
    fn weighted_combination_needs_two_terms() {
        let recipe = IndexRecipe::WeightedCombination {
            terms: vec![(1.0, BoundingBox::global())],
        };
        assert!(recipe.apply(&global_field(|_, _| 1.0)).is_err());
    }

    #[test]
    fn custom_rows_can_be_added() {
        let mut catalog = IndexCatalog::new();
        catalog.insert(box_mean("Arctic", "Arctic mean", region(-180.0, 180.0, 66.5, 90.0)));
        assert_eq!(catalog.identifiers(), vec!["arctic"]);
        assert!(catalog.get("ARCTIC").is_ok());
    }

    #[test]
    fn recipes_serialize_with_kind_tag() {
        let json = serde_json::to_value(&IndexRecipe::NearestPoint {
            lon: -27.5,
            lat: 52.5,
        })
        .unwrap();
        assert_eq!(json["kind"], "nearest_point");
    }
}
