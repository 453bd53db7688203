// Settings module
// JSON-backed application configuration

pub mod settings;

pub use settings::AppSettings;
