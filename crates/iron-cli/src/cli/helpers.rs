use super::CliError;
use anyhow::Context;
use iron_core::chip::ChipSet;
use iron_core::config::{NormalizationConfig, load_normalization_config};
use iron_core::domain::IronError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub(super) fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, CliError> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {} '{}'", what, path.display()))?;
    serde_json::from_str(&source).map_err(|error| {
        CliError::Compute(IronError::input_validation(
            "INPUT.CLI_JSON",
            format!("failed to parse {} '{}': {}", what, path.display(), error),
        ))
    })
}

pub(super) fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory '{}'", parent.display())
            })?;
        }
    }

    let rendered = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", what))?;
    fs::write(path, rendered)
        .with_context(|| format!("failed to write {} '{}'", what, path.display()))?;
    Ok(())
}

pub(super) fn load_chip_set(path: &Path) -> Result<ChipSet, CliError> {
    let set: ChipSet = read_json(path, "chip set")?;
    set.validate().map_err(CliError::Compute)?;
    Ok(set)
}

pub(super) fn load_config(path: Option<&Path>) -> Result<NormalizationConfig, CliError> {
    match path {
        Some(path) => load_normalization_config(path).map_err(|error| {
            CliError::Compute(IronError::input_validation(
                "INPUT.CLI_CONFIG",
                error.to_string(),
            ))
        }),
        None => Ok(NormalizationConfig::default()),
    }
}
