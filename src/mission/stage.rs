//! Stage data and state. The wire format uses single-letter field names to
//! keep mission payloads small; see the crate docs for the mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::model::null_default;

/// Lifecycle state of a stage within a mission.
///
/// Serialised as an integer (`ready` = 0 .. `skipped` = 5) for compatibility
/// with existing clients and dashboards; both the integer and the state name
/// are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StageState {
    #[default]
    Ready,
    Started,
    Finished,
    Failed,
    Excluded,
    Skipped,
}

impl StageState {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Ready => 0,
            Self::Started => 1,
            Self::Finished => 2,
            Self::Failed => 3,
            Self::Excluded => 4,
            Self::Skipped => 5,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ready),
            1 => Some(Self::Started),
            2 => Some(Self::Finished),
            3 => Some(Self::Failed),
            4 => Some(Self::Excluded),
            5 => Some(Self::Skipped),
            _ => None,
        }
    }

    /// A terminal stage no longer blocks mission completion.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Excluded | Self::Skipped)
    }

    /// Icon used in text reports, one per state.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Ready => "○",
            Self::Started => "◎",
            Self::Finished => "◍",
            Self::Failed => "!",
            Self::Excluded => "x",
            Self::Skipped => "-",
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
            Self::Excluded => write!(f, "excluded"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for StageState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(Self::Ready),
            "started" => Ok(Self::Started),
            "finished" => Ok(Self::Finished),
            "failed" => Ok(Self::Failed),
            "excluded" => Ok(Self::Excluded),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid stage state: {s}")),
        }
    }
}

impl Serialize for StageState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for StageState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StateVisitor;

        impl serde::de::Visitor<'_> for StateVisitor {
            type Value = StageState;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a stage state as an integer 0..=5 or a state name")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<StageState, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(StageState::from_u8)
                    .ok_or_else(|| E::custom(format!("invalid stage state: {v}")))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<StageState, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(StageState::from_u8)
                    .ok_or_else(|| E::custom(format!("invalid stage state: {v}")))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<StageState, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(StateVisitor)
    }
}

/// One unit of externally executed work within a mission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "a", default)]
    pub service: String,
    #[serde(rename = "u", default, deserialize_with = "null_default")]
    pub upstream: Vec<String>,
    #[serde(rename = "d", default, deserialize_with = "null_default")]
    pub downstream: Vec<String>,
    #[serde(rename = "p", default, deserialize_with = "null_default")]
    pub params: Map<String, Value>,
    #[serde(rename = "s", default)]
    pub state: StageState,
    #[serde(rename = "t", default, with = "zero_time")]
    pub start: Option<DateTime<Utc>>,
    #[serde(rename = "e", default, with = "zero_time")]
    pub end: Option<DateTime<Utc>>,
}

impl Stage {
    /// Human-readable duration for reports: `-` if the stage never started,
    /// elapsed-so-far while running, total once ended.
    pub fn duration(&self) -> String {
        match self.start {
            None => "-".to_string(),
            Some(start) => {
                let until = self.end.unwrap_or_else(Utc::now);
                format_duration(until - start)
            }
        }
    }
}

fn format_duration(d: chrono::Duration) -> String {
    let millis = d.num_milliseconds().max(0);
    let secs = millis / 1000;
    let (hours, mins, secs, millis) = (secs / 3600, (secs % 3600) / 60, secs % 60, millis % 1000);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if mins > 0 || hours > 0 {
        out.push_str(&format!("{mins}m"));
    }
    if millis > 0 {
        out.push_str(&format!("{secs}.{millis:03}s"));
    } else {
        out.push_str(&format!("{secs}s"));
    }
    out
}

/// Timestamp encoding matching the persisted layout: `None` is written as the
/// RFC 3339 zero timestamp, and zero/null on input reads back as `None`.
pub mod zero_time {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const ZERO: &str = "0001-01-01T00:00:00Z";

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer
                .serialize_str(&dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
            None => serializer.serialize_str(ZERO),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        let Some(raw) = raw else { return Ok(None) };
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
        let parsed = parsed.with_timezone(&Utc);
        let zero = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
        if parsed == zero {
            Ok(None)
        } else {
            Ok(Some(parsed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip_integer() {
        let json = serde_json::to_string(&StageState::Excluded).unwrap();
        assert_eq!(json, "4");
        let parsed: StageState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, StageState::Excluded);
    }

    #[test]
    fn test_state_parses_from_name() {
        let parsed: StageState = serde_json::from_str("\"skipped\"").unwrap();
        assert_eq!(parsed, StageState::Skipped);
        assert!(serde_json::from_str::<StageState>("\"unknown\"").is_err());
        assert!(serde_json::from_str::<StageState>("9").is_err());
    }

    #[test]
    fn test_state_terminality() {
        assert!(StageState::Finished.is_terminal());
        assert!(StageState::Excluded.is_terminal());
        assert!(StageState::Skipped.is_terminal());
        assert!(!StageState::Ready.is_terminal());
        assert!(!StageState::Started.is_terminal());
        assert!(!StageState::Failed.is_terminal());
    }

    #[test]
    fn test_stage_zero_timestamps() {
        let stage = Stage {
            name: "a".into(),
            ..Stage::default()
        };
        let json = serde_json::to_string(&stage).unwrap();
        assert!(json.contains("0001-01-01T00:00:00Z"));

        let parsed: Stage = serde_json::from_str(&json).unwrap();
        assert!(parsed.start.is_none());
        assert!(parsed.end.is_none());
        assert_eq!(parsed.state, StageState::Ready);
    }

    #[test]
    fn test_stage_duration() {
        let mut stage = Stage::default();
        assert_eq!(stage.duration(), "-");

        stage.start = Some(Utc::now() - chrono::Duration::seconds(90));
        stage.end = Some(stage.start.unwrap() + chrono::Duration::seconds(61));
        assert_eq!(stage.duration(), "1m1s");
    }
}
