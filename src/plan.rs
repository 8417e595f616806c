//! Optional TOML test plan for verification runs
//!
//! Everything has a default, so `lfolab verify --device X` works with no
//! plan file at all; a plan overrides connection settings, narrows the suite
//! to named tests, and can append custom cases.

use crate::harness::HarnessSettings;
use crate::verify::TestCase;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub out_device: Option<String>,
    pub in_device: Option<String>,
    pub channel: Option<u8>,
    pub watch_cc: Option<u8>,
    pub destination: Option<u8>,
    pub bpm: Option<u32>,
    pub settle_ms: Option<u64>,
    /// Substring filters: keep only built-in tests whose name matches.
    pub only: Option<Vec<String>>,
    /// Extra custom test cases, appended after the built-in suite.
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Fold the plan's overrides into harness settings.
    pub fn apply(&self, settings: &mut HarnessSettings) {
        if let Some(v) = &self.out_device {
            settings.out_device = v.clone();
        }
        if let Some(v) = &self.in_device {
            settings.in_device = v.clone();
        }
        if let Some(v) = self.channel {
            settings.channel = v;
        }
        if let Some(v) = self.watch_cc {
            settings.watch_cc = v;
        }
        if let Some(v) = self.destination {
            settings.destination = v;
        }
        if let Some(v) = self.bpm {
            settings.bpm = v;
        }
        if let Some(v) = self.settle_ms {
            settings.settle_ms = v;
        }
    }

    /// Filter the built-in suite and append the plan's own cases.
    pub fn select(&self, suite: Vec<TestCase>) -> Vec<TestCase> {
        let mut selected: Vec<TestCase> = match &self.only {
            Some(filters) => suite
                .into_iter()
                .filter(|t| filters.iter().any(|f| t.name.contains(f.as_str())))
                .collect(),
            None => suite,
        };
        selected.extend(self.tests.iter().cloned());
        selected
    }
}
