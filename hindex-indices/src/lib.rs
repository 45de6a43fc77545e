//! Climate indices for decadal hindcasts
//!
//! [`catalog`] holds the index recipes and [`diagnostic`] runs them over many
//! simulations, built on the field operations of `hindex_core`.

pub mod catalog;
pub mod diagnostic;
