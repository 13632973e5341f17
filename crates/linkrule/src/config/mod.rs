pub mod loader;
pub mod settings;

pub use loader::{
    default_settings_path, load_settings, load_settings_from_str, load_settings_or_default,
};
pub use settings::Settings;
