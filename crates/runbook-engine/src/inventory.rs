use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_yaml::{Mapping, Value};
use tracing::debug;

const IMPLICIT_GROUPS: &[&str] = &["all", "ungrouped"];

/// Source of the names a target-taking task may be limited to.
pub trait TargetSource {
    /// `None` when the source does not exist at all.
    fn find_targets(&self) -> Result<Option<Vec<String>>>;

    fn location(&self) -> &Path;
}

/// YAML inventory file: groups with `hosts` and nested `children`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlInventory {
    path: PathBuf,
}

impl YamlInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TargetSource for YamlInventory {
    fn find_targets(&self) -> Result<Option<Vec<String>>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "inventory not found");
                return Ok(None);
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read inventory {}", self.path.display()))
            }
        };
        let targets = parse_inventory(&raw)
            .with_context(|| format!("failed to parse inventory {}", self.path.display()))?;
        debug!(
            path = %self.path.display(),
            targets = targets.len(),
            "loaded inventory targets"
        );
        Ok(Some(targets))
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[derive(Default)]
struct InventoryNames {
    hosts: Vec<String>,
    groups: Vec<String>,
}

impl InventoryNames {
    fn add_host(&mut self, name: String) {
        if !self.hosts.contains(&name) {
            self.hosts.push(name);
        }
    }

    fn add_group(&mut self, name: String) {
        if !self.groups.contains(&name) {
            self.groups.push(name);
        }
    }

    fn visit_group(&mut self, name: &Value, body: &Value) -> Result<()> {
        let Some(name) = name.as_str() else {
            bail!("inventory group names must be strings");
        };
        self.add_group(name.to_string());
        let body = match body {
            Value::Null => return Ok(()),
            Value::Mapping(body) => body,
            _ => bail!("inventory group '{name}' must be a mapping"),
        };
        if let Some(hosts) = section(body, "hosts", name)? {
            for host in hosts.keys() {
                let Some(host) = host.as_str() else {
                    bail!("host names in group '{name}' must be strings");
                };
                self.add_host(host.to_string());
            }
        }
        if let Some(children) = section(body, "children", name)? {
            for (child, child_body) in children {
                self.visit_group(child, child_body)?;
            }
        }
        Ok(())
    }
}

fn section<'a>(body: &'a Mapping, key: &str, group: &str) -> Result<Option<&'a Mapping>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Mapping(section)) => Ok(Some(section)),
        Some(_) => bail!("'{key}' of inventory group '{group}' must be a mapping"),
    }
}

/// Host names followed by group names, each in first-seen order.
pub fn parse_inventory(raw: &str) -> Result<Vec<String>> {
    let document = if raw.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str::<Value>(raw).context("inventory is not valid YAML")?
    };
    let mut names = InventoryNames::default();
    for group in IMPLICIT_GROUPS {
        names.add_group(group.to_string());
    }
    match &document {
        Value::Null => {}
        Value::Mapping(groups) => {
            for (name, body) in groups {
                names.visit_group(name, body)?;
            }
        }
        _ => bail!("inventory must be a mapping of groups"),
    }
    let mut targets = names.hosts;
    targets.extend(names.groups);
    Ok(targets)
}
