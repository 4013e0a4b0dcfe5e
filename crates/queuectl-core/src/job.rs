use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five states a job can be in. States are disjoint: a job is in
/// exactly one of these at any time (spec invariant: single state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    /// All five states, in a fixed order used by `counts_by_state` so the
    /// result always has a zero entry for states with no jobs.
    pub const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::Processing,
        JobState::Completed,
        JobState::Failed,
        JobState::Dead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "dead" => Ok(JobState::Dead),
            other => Err(format!("invalid state '{other}'")),
        }
    }
}

/// Job priority. Lower numeric value dispatches first: `High` (1) before
/// `Medium` (2) before `Low` (3). Persisted as the integer (spec invariant:
/// priority is an integer on disk even when shown as a label in the UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    pub fn from_i64(v: i64) -> Result<Self, String> {
        match v {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::Low),
            other => Err(format!("invalid priority '{other}', expected 1, 2, or 3")),
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => other
                .parse::<i64>()
                .map_err(|_| format!("invalid priority '{other}'"))
                .and_then(Priority::from_i64),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = i64::deserialize(deserializer)?;
        Priority::from_i64(v).map_err(serde::de::Error::custom)
    }
}

/// One unit of work: a shell command plus its retry/priority/lock bookkeeping.
///
/// Mutated solely by the executor (during dispatch and after each attempt)
/// or by the control surface's explicit DLQ retry. Destroyed only by an
/// explicit `clear`/`dlq clear`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub attempts: i64,
    pub max_retries: i64,
    pub timeout: Option<i64>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a brand-new pending job with zero attempts, as the control
    /// surface's `enqueue` does before handing it to the store.
    pub fn new(id: String, command: String, max_retries: i64) -> Self {
        let now = Utc::now();
        Job {
            id,
            command,
            state: JobState::Pending,
            attempts: 0,
            max_retries,
            timeout: None,
            priority: Priority::Medium,
            created_at: now,
            updated_at: now,
            next_retry_at: None,
            error_message: None,
            locked_by: None,
            locked_at: None,
        }
    }

    /// The timeout this job actually runs with: its own, or the global default.
    pub fn effective_timeout(&self, job_timeout_default: i64) -> i64 {
        self.timeout.unwrap_or(job_timeout_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_round_trips_through_json_as_integer() {
        let p = Priority::High;
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "1");
        let back: Priority = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn priority_parses_labels_and_numbers() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("2".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("nonsense".parse::<Priority>().is_err());
    }

    #[test]
    fn job_state_display_round_trips() {
        for state in JobState::ALL {
            let s = state.to_string();
            assert_eq!(s.parse::<JobState>().unwrap(), state);
        }
    }

    #[test]
    fn high_outranks_medium_outranks_low() {
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
    }
}
