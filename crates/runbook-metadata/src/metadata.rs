use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value as YamlValue};
use tracing::debug;

use crate::constraint_set::{ConstraintSet, ResetRule};
use crate::variable_catalog::{RawVariableSpec, VariableCatalog};

/// File name of the per-task metadata document.
pub const METADATA_FILE_NAME: &str = "metadata.runbook.yaml";

const INCLUDE_KEY: &str = "include";
const MERGED_SECTIONS: &[&str] = &["variables", "constraints"];

/// Maps an include name to the metadata file it refers to.
pub trait IncludeLookup {
    fn metadata_path(&self, include: &str) -> PathBuf;
}

impl<F> IncludeLookup for F
where
    F: Fn(&str) -> PathBuf,
{
    fn metadata_path(&self, include: &str) -> PathBuf {
        self(include)
    }
}

/// Includes resolve to `<playbooks>/<include>/metadata.runbook.yaml`.
#[derive(Debug, Clone)]
pub struct PlaybookDirLookup {
    pub playbooks_dir: PathBuf,
}

impl IncludeLookup for PlaybookDirLookup {
    fn metadata_path(&self, include: &str) -> PathBuf {
        self.playbooks_dir.join(include).join(METADATA_FILE_NAME)
    }
}

/// Normalized metadata of one task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub help: Option<String>,
    pub includes: Vec<String>,
    pub variables: VariableCatalog,
    pub constraints: ConstraintSet,
    pub reset: Vec<ResetRule>,
}

impl Metadata {
    /// First line of the help text.
    pub fn help_summary(&self) -> Option<&str> {
        self.help
            .as_deref()
            .filter(|help| !help.is_empty())
            .and_then(|help| help.lines().next())
    }
}

/// Reads a metadata document. A missing or empty file is an empty mapping.
pub fn load_metadata_file(path: &Path) -> Result<Mapping> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Mapping::new()),
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to read metadata file {}", path.display()))
        }
    };
    let document: YamlValue = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse metadata file {}", path.display()))?;
    match document {
        YamlValue::Null => Ok(Mapping::new()),
        YamlValue::Mapping(mapping) => Ok(mapping),
        _ => bail!("metadata file {} must contain a mapping", path.display()),
    }
}

/// Loads `primary_path` and merges `variables`/`constraints` from its includes.
///
/// Includes are followed one level deep only. On a key collision inside a
/// merged section the include wins over the primary file. `help` and
/// `reset` are taken from the primary file alone.
pub fn resolve_metadata(
    primary_path: &Path,
    task_name: &str,
    lookup: &impl IncludeLookup,
) -> Result<Metadata> {
    let mut data = load_metadata_file(primary_path)?;
    let includes: Vec<String> = section(&data, INCLUDE_KEY, primary_path)?;

    for include in &includes {
        let include_path = lookup.metadata_path(include);
        let include_data = load_metadata_file(&include_path)?;
        for key in MERGED_SECTIONS {
            merge_section(&mut data, &include_data, key, &include_path)?;
        }
        debug!(
            task = task_name,
            include = include.as_str(),
            path = %include_path.display(),
            "merged metadata include"
        );
    }

    let help: Option<String> = section(&data, "help", primary_path)?;
    let raw_variables: BTreeMap<String, Option<RawVariableSpec>> =
        section(&data, "variables", primary_path)?;
    let variables = VariableCatalog::from_raw(task_name, raw_variables).with_context(|| {
        format!(
            "invalid variables in metadata for task '{task_name}' ({})",
            primary_path.display()
        )
    })?;
    let constraints: ConstraintSet = section(&data, "constraints", primary_path)?;
    let reset: Vec<ResetRule> = section(&data, "reset", primary_path)?;

    Ok(Metadata {
        help,
        includes,
        variables,
        constraints,
        reset,
    })
}

fn section<T>(data: &Mapping, key: &str, path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match data.get(key) {
        None | Some(YamlValue::Null) => Ok(T::default()),
        Some(value) => serde_yaml::from_value(value.clone()).with_context(|| {
            format!("invalid '{key}' section in metadata file {}", path.display())
        }),
    }
}

fn merge_section(target: &mut Mapping, include: &Mapping, key: &str, path: &Path) -> Result<()> {
    let incoming = match include.get(key) {
        None | Some(YamlValue::Null) => return Ok(()),
        Some(YamlValue::Mapping(mapping)) => mapping.clone(),
        Some(_) => bail!(
            "'{key}' section in metadata file {} must be a mapping",
            path.display()
        ),
    };
    let key_value = YamlValue::String(key.to_string());
    let merged = match target.remove(&key_value) {
        None | Some(YamlValue::Null) => incoming,
        Some(YamlValue::Mapping(mut existing)) => {
            for (name, value) in incoming {
                existing.insert(name, value);
            }
            existing
        }
        Some(_) => bail!("'{key}' section of the including metadata must be a mapping"),
    };
    target.insert(key_value, YamlValue::Mapping(merged));
    Ok(())
}
