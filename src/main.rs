use anyhow::{Context, Result};
use class_attendance::cli::{Cli, Command};
use class_attendance::{AttendanceError, create_default_manager};
use class_attendance::shell::Shell;
use clap::Parser;
use std::io;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let (mut manager, settings) = create_default_manager(cli.database.as_deref())
        .context("Failed to open the attendance store")?;

    let class_name = cli.class.unwrap_or_else(|| settings.class_name.clone());
    let class = manager
        .find_class_by_name(&class_name)?
        .ok_or(AttendanceError::UnknownClassName(class_name))?;

    let stdin = io::stdin();
    let mut shell = Shell::new(
        &mut manager,
        class,
        settings.absent_rate(),
        stdin.lock(),
        io::stdout(),
    );

    shell.run(cli.command.unwrap_or(Command::Menu))?;

    Ok(())
}
