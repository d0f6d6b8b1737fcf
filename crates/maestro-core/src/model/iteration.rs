use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// What the forced iterations are working toward.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IterationMode {
    #[default]
    Quality,
    Features,
    Tests,
    Polish,
}

impl IterationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Features => "features",
            Self::Tests => "tests",
            Self::Polish => "polish",
        }
    }
}

impl fmt::Display for IterationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IterationMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "features" => Ok(Self::Features),
            "tests" => Ok(Self::Tests),
            "polish" => Ok(Self::Polish),
            other => Err(CoreError::InvalidState(format!(
                "unknown iteration mode '{other}' (expected quality, features, tests or polish)"
            ))),
        }
    }
}

/// Persisted as `ralph.state`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IterationState {
    pub max: u32,
    pub current: u32,
    #[serde(default)]
    pub mode: IterationMode,
    #[serde(default)]
    pub features: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl IterationState {
    pub fn new(max: u32, mode: IterationMode, features: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            max,
            current: 0,
            mode,
            features,
            started_at: now,
            last_update: now,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.current)
    }
}
