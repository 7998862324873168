//! Data module - CSV loading and standardisation

pub mod columns;
mod loader;
mod processor;

pub use loader::{DataLoader, LoaderError};
pub use processor::{normalise_name, DataProcessor};
