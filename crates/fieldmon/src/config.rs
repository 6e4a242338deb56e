//! Resolution of config-file profiles plus command-line overrides into
//! the connection types the session layer consumes.

use std::path::PathBuf;

use clap::ValueEnum;

use fieldmon_api::{ConnectionConfig, GatewayOrigin, TransportOptions};
use fieldmon_config::{Config, Profile};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Everything needed to open one monitoring session.
#[derive(Debug)]
pub struct Target {
    pub profile: String,
    pub origin: GatewayOrigin,
    pub connection: ConnectionConfig,
    pub options: TransportOptions,
    pub log_capacity: usize,
}

/// `--config` when given, the platform default otherwise.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(fieldmon_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(fieldmon_config::load_config_from(&config_file(global))?)
}

/// `--output` wins, then `defaults.output` from the file, then table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global
        .output
        .or_else(|| OutputFormat::from_str(&cfg.defaults.output, true).ok())
        .unwrap_or(OutputFormat::Table)
}

pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Pick the profile, apply flag overrides, and validate the result.
///
/// An explicitly named profile must exist. Without `--profile`, a missing
/// default profile is fine as long as the flags name a gateway and devices.
pub fn resolve_target(global: &GlobalOpts, cfg: &Config) -> Result<Target, CliError> {
    let name = active_profile_name(global, cfg);
    let base = match cfg.profile(global.profile.as_deref()) {
        Ok((_, profile)) => profile.clone(),
        Err(_) if global.profile.is_none() => Profile::default(),
        Err(_) => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(cfg),
            });
        }
    };
    let profile = overlay(base, global);

    if profile.gateway.trim().is_empty() {
        return Err(CliError::NoConfig {
            path: config_file(global).display().to_string(),
        });
    }

    let origin = fieldmon_config::resolve_gateway(&profile.gateway)?;
    let connection = fieldmon_config::resolve_connection(&profile, &cfg.defaults)?;
    tracing::debug!(profile = %name, gateway = %profile.gateway, "resolved target");

    Ok(Target {
        profile: name,
        origin,
        connection,
        options: fieldmon_config::transport_options(&cfg.defaults),
        log_capacity: cfg.defaults.log_capacity,
    })
}

/// Apply `--gateway`, `--device`, `--interval`, `--parameters`.
pub fn overlay(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref gateway) = global.gateway {
        profile.gateway.clone_from(gateway);
    }
    match global.device.as_slice() {
        [] => {}
        [single] => {
            profile.device_id = Some(single.clone());
            profile.device_ids = None;
        }
        many => {
            profile.device_id = None;
            profile.device_ids = Some(many.to_vec());
        }
    }
    if let Some(interval) = global.interval {
        profile.interval = Some(interval);
    }
    if !global.parameters.is_empty() {
        profile.parameters = Some(global.parameters.clone());
    }
    profile
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
