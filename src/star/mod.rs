//! Star module - dimensions and surrogate-keyed fact tables

mod assembler;
mod dimensions;

pub use assembler::{FactAssembler, StarFacts};
pub use dimensions::DimensionBuilder;
