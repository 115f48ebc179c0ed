pub mod executor;
pub mod strategy;

pub use executor::*;
pub use strategy::*;
