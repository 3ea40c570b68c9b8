pub mod config;
pub mod manager;

pub use config::Settings;
pub use manager::SettingsManager;
