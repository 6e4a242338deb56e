//! `fieldmon config`: inspect and edit the config file. Needs no gateway.

use serde::Serialize;
use tabled::Tabled;

use fieldmon_config::{Config, ConfigError, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Gateway")]
    gateway: String,
    #[tabled(rename = "Devices")]
    devices: String,
    #[tabled(rename = "Default")]
    default: bool,
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Path => {
            let path = config::config_file(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let format = config::output_format(global, &cfg);
            let toml_str = render_toml(&cfg)?;
            let rendered = output::render_single(format, &cfg, |_| toml_str.clone())?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            let format = config::output_format(global, &cfg);
            let rows = profile_rows(&cfg);
            if rows.is_empty() && !global.quiet {
                eprintln!("No profiles configured. Run: fieldmon config add <name>");
            }
            let rendered = output::render_list(format, &rows, |r| vec![r.clone()])?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load(global)?;
            if !cfg.profiles.contains_key(name) {
                return Err(CliError::ProfileNotFound {
                    name: name.clone(),
                    available: config::available_profiles(&cfg),
                });
            }
            cfg.default_profile = Some(name.clone());
            save(&cfg, global)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        // ── Add <name> ─────────────────────────────────────────────
        ConfigCommand::Add { name, default } => {
            let mut cfg = config::load(global)?;
            let base = cfg.profiles.get(name).cloned().unwrap_or_default();
            let profile = config::overlay(base, global);
            validate(&profile, &cfg)?;

            cfg.profiles.insert(name.clone(), profile);
            if *default {
                cfg.default_profile = Some(name.clone());
            }
            save(&cfg, global)?;
            if !global.quiet {
                eprintln!("✓ Saved profile '{name}'");
            }
            Ok(())
        }
    }
}

/// A profile must resolve before it is written.
fn validate(profile: &Profile, cfg: &Config) -> Result<(), CliError> {
    if profile.gateway.trim().is_empty() {
        return Err(CliError::Validation {
            field: "gateway".into(),
            reason: "a new profile needs --gateway".into(),
        });
    }
    fieldmon_config::resolve_gateway(&profile.gateway)?;
    fieldmon_config::resolve_connection(profile, &cfg.defaults)?;
    Ok(())
}

fn save(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);
    fieldmon_config::save_config_to(cfg, &path)?;
    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}

fn profile_rows(cfg: &Config) -> Vec<ProfileRow> {
    let default = cfg.default_profile.as_deref().unwrap_or("default");
    cfg.profiles
        .iter()
        .map(|(name, p)| ProfileRow {
            name: name.clone(),
            gateway: p.gateway.clone(),
            devices: p
                .device_ids
                .as_ref()
                .map(|ids| ids.join(","))
                .or_else(|| p.device_id.clone())
                .unwrap_or_default(),
            default: name == default,
        })
        .collect()
}

fn render_toml(cfg: &Config) -> Result<String, CliError> {
    toml::to_string_pretty(cfg).map_err(|e| ConfigError::Serialization(e).into())
}
