use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::BapError;

const ISO_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceId {
    SpeciesFinder,
    GetReference,
    PlasmidFinder,
    VirulenceFinder,
    ResFinder,
    MLSTFinder,
}

impl ServiceId {
    pub const ALL: [ServiceId; 6] = [
        ServiceId::SpeciesFinder,
        ServiceId::GetReference,
        ServiceId::PlasmidFinder,
        ServiceId::VirulenceFinder,
        ServiceId::ResFinder,
        ServiceId::MLSTFinder,
    ];

    pub const DEFAULT: [ServiceId; 4] = [
        ServiceId::SpeciesFinder,
        ServiceId::GetReference,
        ServiceId::PlasmidFinder,
        ServiceId::VirulenceFinder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::SpeciesFinder => "SpeciesFinder",
            ServiceId::GetReference => "GetReference",
            ServiceId::PlasmidFinder => "PlasmidFinder",
            ServiceId::VirulenceFinder => "VirulenceFinder",
            ServiceId::ResFinder => "ResFinder",
            ServiceId::MLSTFinder => "MLSTFinder",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ServiceId {
    type Err = BapError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        ServiceId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| BapError::UnknownService(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Started,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Started)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Started => "STARTED",
            TaskState::Done => "DONE",
            TaskState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub command: String,
    pub args: Vec<String>,
    pub cpu: u32,
    pub mem: u32,
    pub time: u64,
}

impl JobSpec {
    pub fn new(command: &str, args: Vec<String>, cpu: u32, mem: u32, time: u64) -> Self {
        Self {
            command: command.to_string(),
            args,
            cpu,
            mem,
            time,
        }
    }
}

pub fn iso_seconds(time: &DateTime<Local>) -> String {
    time.naive_local().format(ISO_SECONDS).to_string()
}

pub fn elapsed_secs(start: &str, now: &DateTime<Local>) -> Option<f64> {
    let start = NaiveDateTime::parse_from_str(start, ISO_SECONDS).ok()?;
    let delta = now.naive_local() - start;
    Some(delta.num_milliseconds() as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_service_id_case_insensitive() {
        let id: ServiceId = "plasmidfinder".parse().unwrap();
        assert_eq!(id, ServiceId::PlasmidFinder);
        assert_eq!(id.to_string(), "PlasmidFinder");
    }

    #[test]
    fn parse_service_id_unknown() {
        let err = "Assembler".parse::<ServiceId>().unwrap_err();
        assert_matches!(err, BapError::UnknownService(_));
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskState::Started.is_terminal());
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn elapsed_from_iso_start() {
        let now = Local::now();
        let start = iso_seconds(&(now - chrono::Duration::seconds(90)));
        let secs = elapsed_secs(&start, &now).unwrap();
        assert!((90.0..91.0).contains(&secs));
    }
}
