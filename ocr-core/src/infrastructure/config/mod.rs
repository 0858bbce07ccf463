mod loader;
mod types;
mod validation;

pub use loader::{load_config, load_validated_config, to_toml, CONFIG_FILE_NAME, ENV_PREFIX};
pub use types::*;
