use serde::{Deserialize, Serialize};

/// Runtime-tunable configuration, persisted as the store's `config`
/// singleton. Workers re-read this once per loop iteration (see
/// `queuectl-worker`) so operators can retune without a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default `max_retries` for jobs that don't specify their own.
    pub max_retries: i64,
    /// Base of the exponential backoff `base^attempts` seconds.
    pub backoff_base: i64,
    /// Idle sleep between poll attempts, in seconds.
    pub worker_poll_interval: f64,
    /// Global default execution timeout, in seconds.
    pub job_timeout: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_retries: 3,
            backoff_base: 2,
            worker_poll_interval: 1.0,
            job_timeout: 300,
        }
    }
}

impl Config {
    /// Enumerate the four JSON-encoded rows this config occupies in the
    /// store's `config` table.
    pub fn as_kv_pairs(&self) -> Vec<(&'static str, serde_json::Value)> {
        vec![
            ("max_retries", serde_json::json!(self.max_retries)),
            ("backoff_base", serde_json::json!(self.backoff_base)),
            (
                "worker_poll_interval",
                serde_json::json!(self.worker_poll_interval),
            ),
            ("job_timeout", serde_json::json!(self.job_timeout)),
        ]
    }

    /// Apply a single CLI `config set KEY VALUE`, type-coercing per key.
    /// `key` is the internal snake_case name (`max_retries`, not
    /// `max-retries` — the CLI layer maps the hyphenated flag first).
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), crate::ConfigError> {
        match key {
            "max_retries" => {
                self.max_retries = parse_int(value)?;
            }
            "backoff_base" => {
                self.backoff_base = parse_int(value)?;
            }
            "worker_poll_interval" => {
                let v: f64 = value
                    .parse()
                    .map_err(|_| crate::ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?;
                if v < 0.0 {
                    return Err(crate::ConfigError::NegativePollInterval(v));
                }
                self.worker_poll_interval = v;
            }
            "job_timeout" => {
                self.job_timeout = parse_int(value)?;
            }
            other => return Err(crate::ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

fn parse_int(value: &str) -> Result<i64, crate::ConfigError> {
    value.parse().map_err(|_| crate::ConfigError::InvalidValue {
        key: "int".to_string(),
        value: value.to_string(),
    })
}

/// Map a user-facing hyphenated config key (as seen on the CLI) to the
/// internal snake_case field name.
pub fn cli_key_to_field(key: &str) -> Option<&'static str> {
    match key {
        "max-retries" => Some("max_retries"),
        "backoff-base" => Some("backoff_base"),
        "worker-poll-interval" => Some("worker_poll_interval"),
        "job-timeout" => Some("job_timeout"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.backoff_base, 2);
        assert_eq!(cfg.worker_poll_interval, 1.0);
        assert_eq!(cfg.job_timeout, 300);
    }

    #[test]
    fn set_field_rejects_negative_poll_interval() {
        let mut cfg = Config::default();
        let err = cfg.set_field("worker_poll_interval", "-1.5").unwrap_err();
        assert!(matches!(err, crate::ConfigError::NegativePollInterval(_)));
    }

    #[test]
    fn set_field_round_trips_float_without_truncation() {
        let mut cfg = Config::default();
        cfg.set_field("worker_poll_interval", "2.5").unwrap();
        assert_eq!(cfg.worker_poll_interval, 2.5);
    }

    #[test]
    fn set_field_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_field("nonsense", "1"),
            Err(crate::ConfigError::UnknownKey(_))
        ));
    }
}
