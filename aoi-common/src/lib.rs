//! Common utilities for the aoi-slice exporter

pub mod error;

pub use error::{suggest_name, Error, Result};
