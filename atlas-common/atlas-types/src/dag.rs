use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace prefix applied to DAG node ids at admission, disambiguating them
/// from ad-hoc (UUID) job ids.
pub const DAG_ID_PREFIX: &str = "DAG-";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid DAG job definition (expected ID|SKILL|DATA|PRIORITY|DELAY_MS|[DEPS]): {0}")]
    InvalidFormat(String),
    #[error("empty job id in DAG definition: {0}")]
    EmptyId(String),
    #[error("non-numeric priority {value:?} in DAG definition: {line}")]
    InvalidPriority { value: String, line: String },
    #[error("non-numeric delay {value:?} in DAG definition: {line}")]
    InvalidDelay { value: String, line: String },
    #[error("staged file {file:?} is not readable: {reason}")]
    UnreadableFile { file: String, reason: String },
    #[error("staged file name {0:?} escapes the staging directory")]
    UnsafeFileName(String),
}

/// One parsed job definition out of a `SUBMIT_DAG` batch:
/// `ID|SKILL|DATA|PRIORITY|DELAY_MS|[DEP1,DEP2,...]` with an optional
/// trailing `|AFFINITY` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagJobSpec {
    pub id: String,
    pub skill: String,
    pub data: String,
    pub priority: i32,
    pub delay_ms: i64,
    pub deps: Vec<String>,
    pub affinity: bool,
}

impl DagJobSpec {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() < 6 || fields.len() > 7 {
            return Err(ParseError::InvalidFormat(line.to_string()));
        }

        let id = fields[0].to_string();
        if id.is_empty() {
            return Err(ParseError::EmptyId(line.to_string()));
        }

        let priority: i32 = fields[3].parse().map_err(|_| ParseError::InvalidPriority {
            value: fields[3].to_string(),
            line: line.to_string(),
        })?;
        let delay_ms: i64 = fields[4].parse().map_err(|_| ParseError::InvalidDelay {
            value: fields[4].to_string(),
            line: line.to_string(),
        })?;

        let deps = fields[5]
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let affinity = match fields.get(6) {
            Some(marker) if marker.eq_ignore_ascii_case("AFFINITY") => true,
            Some(_) => return Err(ParseError::InvalidFormat(line.to_string())),
            None => false,
        };

        Ok(Self {
            id,
            skill: fields[1].to_string(),
            data: fields[2].to_string(),
            priority,
            delay_ms,
            deps,
            affinity,
        })
    }

    /// The namespaced id this spec's job is admitted under.
    pub fn namespaced_id(&self) -> String {
        format!("{}{}", DAG_ID_PREFIX, self.id)
    }
}
