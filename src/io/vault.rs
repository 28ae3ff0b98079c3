use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::io::loader::{LoadError, Loader};
use crate::model::task::{TaskId, TaskNode, TaskStatus};

/// Source id that lists the vault's root tasks
pub const ROOT_SOURCE: &str = "/";

/// Own duration for tasks created from a bare title
pub const NEW_TASK_MINUTES: u32 = 30;

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// The on-disk task vault (tasks.toml)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vault {
    /// Ids listed at the top level, in order
    #[serde(default)]
    pub roots: Vec<String>,
    /// Every task, keyed by id
    #[serde(default)]
    pub tasks: IndexMap<String, VaultTask>,
}

/// One task entry. `children` are ids, so a task may appear under several parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultTask {
    pub title: String,
    /// Default: 30
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub anchored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

fn default_duration() -> u32 {
    NEW_TASK_MINUTES
}

impl VaultTask {
    pub fn new(title: impl Into<String>) -> Self {
        VaultTask {
            title: title.into(),
            duration: NEW_TASK_MINUTES,
            anchored: false,
            start: None,
            status: TaskStatus::Todo,
            children: Vec::new(),
        }
    }
}

/// Loader backed by a vault file
#[derive(Debug, Clone, Default)]
pub struct VaultLoader {
    path: Option<PathBuf>,
    vault: Vault,
}

impl VaultLoader {
    /// In-memory vault with no backing file
    pub fn from_vault(vault: Vault) -> Self {
        VaultLoader { path: None, vault }
    }

    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let text = fs::read_to_string(path).map_err(|e| LoadError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let vault: Vault = toml::from_str(&text).map_err(|e| LoadError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(VaultLoader {
            path: Some(path.to_path_buf()),
            vault,
        })
    }

    /// Write the vault back to its file. In-memory vaults are a no-op.
    pub fn save(&self) -> Result<(), LoadError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = toml::to_string_pretty(&self.vault)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Build the subtree under `id`. `ancestors` holds the ids on the path
    /// from the list root; a child already on that path is left out so
    /// cyclic links terminate.
    fn build_node(&self, id: &str, ancestors: &mut Vec<String>) -> Option<TaskNode> {
        let entry = self.vault.tasks.get(id)?;
        ancestors.push(id.to_string());
        let mut children = Vec::with_capacity(entry.children.len());
        for child in &entry.children {
            if ancestors.contains(child) {
                continue;
            }
            if let Some(node) = self.build_node(child, ancestors) {
                children.push(node);
            }
        }
        ancestors.pop();

        Some(TaskNode {
            id: TaskId::Persisted(id.to_string()),
            title: entry.title.clone(),
            duration: entry.duration,
            original_duration: None,
            is_anchored: entry.anchored,
            start_time: entry.start,
            status: entry.status,
            children,
            trace: Vec::new(),
        })
    }

    /// Member ids of a source: the roots, or a task's children
    fn members(&self, source: &str) -> Option<&Vec<String>> {
        if source == ROOT_SOURCE {
            Some(&self.vault.roots)
        } else {
            self.vault.tasks.get(source).map(|t| &t.children)
        }
    }

    fn members_mut(&mut self, source: &str) -> Option<&mut Vec<String>> {
        if source == ROOT_SOURCE {
            Some(&mut self.vault.roots)
        } else {
            self.vault.tasks.get_mut(source).map(|t| &mut t.children)
        }
    }

    /// Write a task's own metadata back to its entry
    pub fn apply_update(&mut self, task: &TaskNode) -> Result<(), LoadError> {
        let id = task
            .id
            .as_path()
            .ok_or_else(|| LoadError::UnknownSource(task.id.to_string()))?;
        let entry = self
            .vault
            .tasks
            .get_mut(id)
            .ok_or_else(|| LoadError::UnknownSource(id.to_string()))?;
        entry.title = task.title.clone();
        entry.duration = task.own_minutes();
        entry.anchored = task.is_anchored;
        entry.status = task.status;
        // floating start times are derived, only anchors keep theirs
        entry.start = if task.is_anchored { task.start_time } else { None };
        Ok(())
    }

    /// Add a new entry for `title` under `parent` and return its id
    pub fn create(&mut self, title: &str, parent: &str) -> Result<String, LoadError> {
        if self.members(parent).is_none() {
            return Err(LoadError::UnknownSource(parent.to_string()));
        }
        let id = self.fresh_id(title);
        self.vault.tasks.insert(id.clone(), VaultTask::new(title));
        if let Some(members) = self.members_mut(parent) {
            members.push(id.clone());
        }
        Ok(id)
    }

    /// Replace the member list of `source` with `ids`, keeping only ids
    /// that exist in the vault
    pub fn set_members(&mut self, source: &str, ids: &[String]) -> Result<(), LoadError> {
        let known: Vec<String> = ids
            .iter()
            .filter(|id| self.vault.tasks.contains_key(id.as_str()))
            .cloned()
            .collect();
        let members = self
            .members_mut(source)
            .ok_or_else(|| LoadError::UnknownSource(source.to_string()))?;
        *members = known;
        Ok(())
    }

    /// `<slug>.md`, suffixed until unused
    fn fresh_id(&self, title: &str) -> String {
        let lower = title.to_lowercase();
        let slug = NON_SLUG.replace_all(&lower, "-");
        let slug = match slug.trim_matches('-') {
            "" => "task",
            s => s,
        };
        let mut id = format!("{}.md", slug);
        let mut n = 2;
        while self.vault.tasks.contains_key(&id) {
            id = format!("{}-{}.md", slug, n);
            n += 1;
        }
        id
    }
}

impl Loader for VaultLoader {
    fn load(&self, id: &str) -> Result<Vec<TaskNode>, LoadError> {
        let members = self
            .members(id)
            .ok_or_else(|| LoadError::UnknownSource(id.to_string()))?;
        let mut ancestors = vec![id.to_string()];
        Ok(members
            .iter()
            .filter_map(|child| self.build_node(child, &mut ancestors))
            .collect())
    }

    fn load_specific_files(&self, ids: &[String]) -> Result<Vec<TaskNode>, LoadError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.build_node(id, &mut Vec::new()))
            .collect())
    }
}
