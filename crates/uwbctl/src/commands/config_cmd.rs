//! Config subcommand handlers.

use uuid::Uuid;

use uwbctl_config::{Settings, SettingsStore};
use uwbctl_core::{Profile, Role};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Apply `mutate` through the store so validation and persistence happen
/// in one place.
fn update(
    store: &SettingsStore,
    global: &GlobalOpts,
    mutate: impl FnOnce(&mut Settings),
) -> Result<Settings, CliError> {
    let path = super::settings_path(global);
    store
        .update(mutate)
        .map_err(|e| CliError::from_config(e, &path))
}

fn confirm(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("✓ {message}");
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = super::settings_path(global);
            output::print_output(&path.display().to_string(), global.quiet)
        }

        ConfigCommand::Show => {
            let store = super::open_store(global)?;
            let rendered = output::render_settings(global.output, &store.current())?;
            output::print_output(&rendered, global.quiet)
        }

        ConfigCommand::SetName { name } => {
            let store = super::open_store(global)?;
            let settings = update(&store, global, |s| s.display_name = name)?;
            confirm(global, &format!("display name set to '{}'", settings.display_name));
            Ok(())
        }

        ConfigCommand::SetRole { role } => {
            let role = Role::from(role);
            let store = super::open_store(global)?;
            update(&store, global, |s| s.role = role)?;
            confirm(global, &format!("role set to {role}"));
            Ok(())
        }

        ConfigCommand::SetProfile { profile } => {
            let profile = Profile::from(profile);
            let store = super::open_store(global)?;
            update(&store, global, |s| s.profile = profile)?;
            confirm(global, &format!("profile set to {profile}"));
            Ok(())
        }

        ConfigCommand::ResetUuid => {
            let store = super::open_store(global)?;
            let uuid = Uuid::new_v4();
            update(&store, global, |s| s.device_uuid = Some(uuid))?;
            output::print_output(&uuid.to_string(), global.quiet)?;
            confirm(global, "device uuid regenerated; peers will see a new endpoint id");
            Ok(())
        }
    }
}
