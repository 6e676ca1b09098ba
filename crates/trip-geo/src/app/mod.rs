mod commands;
mod settings;

pub use commands::run;
pub use settings::Settings;
