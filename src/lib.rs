pub mod cli;
pub mod display;
pub mod error;
pub mod manager;
pub mod marking;
pub mod models;
pub mod report;
pub mod schema;
pub mod settings;
pub mod shell;

pub use crate::error::{AttendanceError, Result};
pub use crate::manager::AttendanceManager;

use crate::settings::Settings;

/// Opens the store named by the configuration, or `database_path` when given.
pub fn create_default_manager(
    database_path: Option<&str>,
) -> Result<(AttendanceManager, Settings)> {
    let settings = Settings::load()?;
    let path = database_path.unwrap_or(&settings.database_path);

    let manager = AttendanceManager::open(path)?;
    Ok((manager, settings))
}
