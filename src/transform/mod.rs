//! Transform module - classification, pivoting and the processed dataset

mod classifier;
mod pivot;
mod processed;

pub use classifier::BusinessClassifier;
pub use pivot::{Reshaper, NATURAL_KEY};
pub use processed::build_processed_dataset;
