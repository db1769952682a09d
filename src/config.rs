use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ServiceId;
use crate::error::BapError;
use crate::store::Store;

pub const DEFAULT_CONFIG_FILE: &str = "kira-bap.json";
pub const DEFAULT_SAMPLE_ID: &str = "SAMPLE";
pub const DEFAULT_POLL_MS: u64 = 500;

pub const DEFAULT_PARAMS: &[(&str, &str)] = &[
    ("pf_i", "0.90"),
    ("pf_c", "0.60"),
    ("vf_i", "0.90"),
    ("vf_c", "0.60"),
    ("sf_s", "bacteria"),
];

#[derive(Debug, Deserialize, Serialize)]
pub struct RunConfig {
    #[serde(default)]
    pub schema_version: Option<u32>,
    pub db_root: String,
    #[serde(default)]
    pub out_dir: Option<String>,
    #[serde(default)]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub species: Option<NameList>,
    #[serde(default)]
    pub plasmids: Option<NameList>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub params: IndexMap<String, Value>,
    #[serde(default)]
    pub poll_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NameList {
    Csv(String),
    List(Vec<String>),
}

impl NameList {
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            NameList::Csv(value) => value.split(',').collect(),
            NameList::List(values) => values.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub db_root: Utf8PathBuf,
    pub out_dir: Utf8PathBuf,
    pub sample_id: String,
    pub inputs: Vec<Utf8PathBuf>,
    pub species: Vec<String>,
    pub plasmids: Vec<String>,
    pub services: Vec<ServiceId>,
    pub params: IndexMap<String, Value>,
    pub poll: Duration,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, BapError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(BapError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| BapError::ConfigRead(config_path.clone()))?;
        let config: RunConfig = serde_json::from_str(&content)
            .map_err(|err| BapError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: RunConfig) -> Result<ResolvedConfig, BapError> {
        let db_root = absolute(&config.db_root)?;
        if !db_root.as_std_path().is_dir() {
            return Err(BapError::user(format!(
                "no such directory for db_root: {db_root}"
            )));
        }

        let services = if config.services.is_empty() {
            ServiceId::DEFAULT.to_vec()
        } else {
            let mut services = Vec::new();
            for name in &config.services {
                let id: ServiceId = name.parse()?;
                if !services.contains(&id) {
                    services.push(id);
                }
            }
            services
        };

        let mut params = config.params;
        for (key, value) in DEFAULT_PARAMS {
            params
                .entry(key.to_string())
                .or_insert_with(|| Value::String(value.to_string()));
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            db_root,
            out_dir: absolute(config.out_dir.as_deref().unwrap_or("."))?,
            sample_id: config
                .sample_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SAMPLE_ID.to_string()),
            inputs: config
                .inputs
                .iter()
                .map(|input| absolute(input))
                .collect::<Result<Vec<_>, _>>()?,
            species: config.species.map(|l| l.names()).unwrap_or_default(),
            plasmids: config.plasmids.map(|l| l.names()).unwrap_or_default(),
            services,
            params,
            poll: Duration::from_millis(config.poll_ms.unwrap_or(DEFAULT_POLL_MS)),
        })
    }
}

impl ResolvedConfig {
    pub fn seed(&self, store: &Store) {
        let mut user_inputs = serde_json::Map::new();
        for (key, value) in &self.params {
            user_inputs.insert(key.clone(), value.clone());
        }
        user_inputs.insert(
            "services".to_string(),
            self.services.iter().map(ServiceId::as_str).collect::<Vec<_>>().into(),
        );
        store.start_run("kira-bap", env!("CARGO_PKG_VERSION"), Value::Object(user_inputs));

        store.put_db_root(&self.db_root);
        store.put_sample_id(&self.sample_id);
        if !self.species.is_empty() {
            store.put_user_species(&self.species);
        }
        if !self.plasmids.is_empty() {
            store.put_user_plasmids(&self.plasmids);
        }
    }
}

fn absolute(path: &str) -> Result<Utf8PathBuf, BapError> {
    let path = std::path::absolute(path)
        .map_err(|err| BapError::user(format!("invalid path {path}: {err}")))?;
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| BapError::user(format!("path is not valid UTF-8: {}", path.display())))
}
