use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_yaml::Value as YamlValue;

use crate::metadata::{resolve_metadata, Metadata, PlaybookDirLookup, METADATA_FILE_NAME};

/// One automation unit: a playbook file plus its lazily resolved metadata.
#[derive(Debug)]
pub struct Task {
    name: String,
    path: PathBuf,
    playbooks_dir: PathBuf,
    metadata: OnceCell<Metadata>,
}

impl Task {
    /// The task name is the playbook's parent directory name.
    pub fn new(path: PathBuf, playbooks_dir: PathBuf) -> Result<Self> {
        let name = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("cannot derive a task name from {}", path.display()))?
            .to_string();
        Ok(Self {
            name,
            path,
            playbooks_dir,
            metadata: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(METADATA_FILE_NAME)
    }

    /// Resolved metadata, computed on first use and cached afterwards.
    pub fn metadata(&self) -> Result<&Metadata> {
        if let Some(metadata) = self.metadata.get() {
            return Ok(metadata);
        }
        let lookup = PlaybookDirLookup {
            playbooks_dir: self.playbooks_dir.clone(),
        };
        let metadata = resolve_metadata(&self.metadata_path(), &self.name, &lookup)?;
        Ok(self.metadata.get_or_init(|| metadata))
    }

    /// True when any play's `hosts` names one of `target_names`.
    pub fn takes_target_parameter(&self, target_names: &[String]) -> Result<bool> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read playbook {}", self.path.display()))?;
        let document: YamlValue = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse playbook {}", self.path.display()))?;
        let YamlValue::Sequence(plays) = document else {
            return Ok(false);
        };
        Ok(plays
            .iter()
            .filter_map(|play| play.get("hosts"))
            .flat_map(host_patterns)
            .any(|host| target_names.iter().any(|target| *target == host)))
    }
}

fn host_patterns(hosts: &YamlValue) -> Vec<String> {
    match hosts {
        YamlValue::String(pattern) => pattern
            .split([':', ','])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        YamlValue::Sequence(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Every `<playbooks_dir>/<task>/<file>.yaml` except metadata files, sorted by name.
pub fn discover_tasks(playbooks_dir: &Path) -> Result<Vec<Task>> {
    if !playbooks_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut tasks = Vec::new();
    for entry in read_sorted_dir(playbooks_dir)? {
        if !entry.is_dir() {
            continue;
        }
        for file in read_sorted_dir(&entry)? {
            let is_yaml = file.extension().and_then(|ext| ext.to_str()) == Some("yaml");
            let is_metadata =
                file.file_name().and_then(|name| name.to_str()) == Some(METADATA_FILE_NAME);
            if file.is_file() && is_yaml && !is_metadata {
                tasks.push(Task::new(file, playbooks_dir.to_path_buf())?);
            }
        }
    }
    tasks.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(tasks)
}

fn read_sorted_dir(path: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read entry in {}", path.display()))?;
    paths.sort();
    Ok(paths)
}
