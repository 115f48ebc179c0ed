mod load;
mod types;

pub use load::{load, load_default, load_from_path, DEFAULT_CONFIG_FILE};
pub use types::*;
