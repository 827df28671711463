pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, Result};
pub use loader::{find_config_file, load_config};
pub use model::*;
