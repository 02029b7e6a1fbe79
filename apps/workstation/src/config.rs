use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "workstation.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub arm_length_mm: f64,
    pub actuator_latency_ms: u64,
    pub experiments_dir: PathBuf,
    pub default_theta_deg: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            arm_length_mm: 100.0,
            actuator_latency_ms: 0,
            experiments_dir: PathBuf::from("experiments"),
            default_theta_deg: 90.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    arm_length_mm: Option<f64>,
    actuator_latency_ms: Option<u64>,
    experiments_dir: Option<PathBuf>,
    default_theta_deg: Option<f64>,
}

/// Defaults, then the config file (explicit path or `workstation.toml` in the
/// working directory), then `APP__*` environment variables.
pub fn load_settings(config_path: Option<&Path>) -> Settings {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => {
            if let Err(err) = apply_file(&mut settings, &raw) {
                warn!(path = %path.display(), "ignoring malformed config file: {err}");
            }
        }
        Err(err) if config_path.is_some() => {
            warn!(path = %path.display(), "cannot read config file: {err}");
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) -> Result<(), toml::de::Error> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.arm_length_mm {
        settings.arm_length_mm = v;
    }
    if let Some(v) = file_cfg.actuator_latency_ms {
        settings.actuator_latency_ms = v;
    }
    if let Some(v) = file_cfg.experiments_dir {
        settings.experiments_dir = v;
    }
    if let Some(v) = file_cfg.default_theta_deg {
        settings.default_theta_deg = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("APP__ARM_LENGTH_MM") {
        match v.trim().parse() {
            Ok(parsed) => settings.arm_length_mm = parsed,
            Err(_) => warn!(value = %v, "ignoring APP__ARM_LENGTH_MM"),
        }
    }
    if let Some(v) = lookup("APP__ACTUATOR_LATENCY_MS") {
        match v.trim().parse() {
            Ok(parsed) => settings.actuator_latency_ms = parsed,
            Err(_) => warn!(value = %v, "ignoring APP__ACTUATOR_LATENCY_MS"),
        }
    }
    if let Some(v) = lookup("APP__EXPERIMENTS_DIR") {
        settings.experiments_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__DEFAULT_THETA_DEG") {
        match v.trim().parse() {
            Ok(parsed) => settings.default_theta_deg = parsed,
            Err(_) => warn!(value = %v, "ignoring APP__DEFAULT_THETA_DEG"),
        }
    }
}

pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    ensure!(
        settings.arm_length_mm.is_finite() && settings.arm_length_mm >= 0.0,
        "arm length must be a non-negative number of millimeters, got {}",
        settings.arm_length_mm
    );
    ensure!(
        settings.default_theta_deg.is_finite(),
        "default theta must be finite, got {}",
        settings.default_theta_deg
    );
    Ok(())
}

/// Creates `<experiments_dir>/<YYYY-MM-DD>` for today's session artifacts.
pub fn prepare_session_dir(settings: &Settings, date: chrono::NaiveDate) -> anyhow::Result<PathBuf> {
    let dir = settings
        .experiments_dir
        .join(date.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create session directory '{}'", dir.display()))?;
    Ok(dir)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
