pub mod result;
pub mod step;

pub use result::*;
pub use step::*;
