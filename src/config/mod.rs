pub mod loader;

pub use loader::{apply_env_overrides, load_config, parse_config};
