//! Air-quality dataset loading, exploratory summaries and AQI forecasting
//! with a random-forest regressor.
//!
//! The dashboard binary (`src/main.rs`) is one consumer of this library;
//! everything it shows is computed here.

pub mod cache;
pub mod data;
pub mod error;
pub mod model;

pub use error::{Error, Result};
