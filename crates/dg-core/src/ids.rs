//! Process identifiers.
//!
//! A [`ProcessId`] names one in-flight external tool invocation. Ids are
//! either supplied by the caller or generated as
//! `<prefix>_<unix-millis>_<counter><random>`. The counter is process-wide
//! and strictly increasing, so two ids generated within the same
//! millisecond still differ.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Opaque identifier for one tracked external process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

impl ProcessId {
    /// Generate a fresh id with the given prefix (e.g. `ffmpeg_palette`).
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        Self(format!("{prefix}_{millis}_{seq:x}{suffix}"))
    }

    /// Return the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when parsing an empty process id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("process id must not be empty")]
pub struct EmptyProcessId;

impl FromStr for ProcessId {
    type Err = EmptyProcessId;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmptyProcessId);
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for ProcessId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_carry_prefix() {
        let id = ProcessId::generate("gifsicle_optimize");
        assert!(id.as_str().starts_with("gifsicle_optimize_"));
        assert_eq!(id.as_str().split('_').count(), 4);
    }

    #[test]
    fn ten_thousand_ids_in_a_burst_are_distinct() {
        let ids: HashSet<ProcessId> = (0..10_000)
            .map(|_| ProcessId::generate("ffmpeg"))
            .collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn ids_are_distinct_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..2_500)
                        .map(|_| ProcessId::generate("magick"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 10_000);
    }

    #[test]
    fn parse_caller_supplied_id() {
        let id: ProcessId = "ffmpeg_resize_1".parse().unwrap();
        assert_eq!(id.to_string(), "ffmpeg_resize_1");
        assert!("   ".parse::<ProcessId>().is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let id: ProcessId = "gifsicle_42".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"gifsicle_42\"");
        let back: ProcessId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
