use crate::error::Result;
use crate::marking::AbsentRate;
use config::Config;
use dotenvy::dotenv;
use serde::Deserialize;

/// Runtime settings, layered from built-in defaults, an optional `config.toml`, and `ATTENDANCE_*`
/// environment variables (a `.env` file is loaded first).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Path of the SQLite store.
    pub database_path: String,
    /// The class the command line operates on.
    pub class_name: String,
    pub default_absent_rate: f64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let settings = Config::builder()
            .set_default("database_path", "attendance.db")?
            .set_default("class_name", crate::manager::SEED_CLASS)?
            .set_default("default_absent_rate", AbsentRate::DEFAULT.value())?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("ATTENDANCE"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// The configured default rate, or [`AbsentRate::DEFAULT`] if the configured value is out of
    /// range.
    pub fn absent_rate(&self) -> AbsentRate {
        AbsentRate::new(self.default_absent_rate).unwrap_or_else(|_| {
            tracing::warn!(
                rate = self.default_absent_rate,
                "configured absent rate out of range, using default"
            );
            AbsentRate::DEFAULT
        })
    }
}
