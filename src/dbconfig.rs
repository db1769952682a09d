use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::BapError;

pub type GroupDatabases = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbConfig {
    groups: GroupDatabases,
}

impl DbConfig {
    pub fn load(db_root: &Utf8Path) -> Result<Self, BapError> {
        Self::parse(&config_path(db_root))
    }

    pub fn parse(path: &Utf8Path) -> Result<Self, BapError> {
        if !path.as_std_path().is_file() {
            return Err(BapError::Configuration(format!(
                "database config file missing: {path}"
            )));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| BapError::Configuration(format!("cannot read {path}: {err}")))?;
        let config = Self::parse_str(&content)?;
        debug!(%path, groups = config.groups.len(), "parsed database config");
        Ok(config)
    }

    /// A database may belong to one group only: the backends count a shared
    /// prefix under its first group, which would corrupt the ranking.
    pub fn parse_str(content: &str) -> Result<Self, BapError> {
        let mut groups = GroupDatabases::new();
        let mut owner: IndexMap<String, String> = IndexMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
            if cols.len() != 3 || cols[0].is_empty() || cols[1].is_empty() {
                return Err(BapError::Configuration(format!(
                    "invalid database config line: {line}"
                )));
            }
            let (db, group) = (cols[0], cols[1]);

            match owner.get(db) {
                Some(existing) if existing != group => {
                    return Err(BapError::Configuration(format!(
                        "non-unique database prefix in config: {db} (in groups {existing} and {group})"
                    )));
                }
                Some(_) => continue,
                None => {
                    owner.insert(db.to_string(), group.to_string());
                }
            }
            groups
                .entry(group.to_string())
                .or_default()
                .push(db.to_string());
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &GroupDatabases {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<GroupDatabases, BapError> {
        let requested: Vec<&str> = if names.is_empty() {
            self.groups.keys().map(String::as_str).collect()
        } else {
            names.iter().map(|n| n.as_ref().trim()).collect()
        };

        let mut resolved = GroupDatabases::new();
        for name in requested {
            let (group, dbs) = self.find(name)?;
            let current = resolved.entry(group.to_string()).or_default();
            for db in dbs {
                if !current.iter().any(|d| d == db) {
                    current.push(db.to_string());
                }
            }
        }
        Ok(resolved)
    }

    fn find<'a>(&'a self, name: &'a str) -> Result<(&'a str, Vec<&'a str>), BapError> {
        if let Some(dbs) = self.groups.get(name) {
            return Ok((name, dbs.iter().map(String::as_str).collect()));
        }
        self.groups
            .iter()
            .find(|(_, dbs)| dbs.iter().any(|db| db == name))
            .map(|(group, _)| (group.as_str(), vec![name]))
            .ok_or_else(|| {
                BapError::UserInput(format!(
                    "unknown group or database: {name}; available are: {}",
                    self.describe()
                ))
            })
    }

    pub fn describe(&self) -> String {
        self.groups
            .iter()
            .map(|(group, dbs)| format!("{group} ({})", dbs.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub fn config_path(db_root: &Utf8Path) -> Utf8PathBuf {
    db_root.join("config")
}
