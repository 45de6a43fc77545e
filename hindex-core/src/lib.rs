pub mod calendar;
pub mod config;
pub mod coords;
pub mod field;
pub mod interpolate;
pub mod lead_time;
pub mod longitude;
pub mod provenance;
pub mod regrid;
pub mod season;
pub mod simulation;
pub mod spatial;

pub mod errors;
