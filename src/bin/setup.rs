//! Creates the attendance store if needed, seeds the default class, and prints every roster.
//!
//! Takes the store path as its only argument, falling back to the configured `database_path`.

use class_attendance::display;
use class_attendance::{Result, create_default_manager};

pub fn main() -> Result<()> {
    let path = std::env::args().nth(1);
    let (mut manager, settings) = create_default_manager(path.as_deref())?;

    println!(
        "Attendance store ready at {}",
        path.as_deref().unwrap_or(&settings.database_path)
    );

    for class in manager.list_classes()? {
        let roster = manager.list_students(class.id)?;
        println!("{}", display::render_roster(&class.name, &roster));
    }

    Ok(())
}
