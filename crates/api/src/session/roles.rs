//! Diarization labels vs. human roles.
//!
//! The provider emits opaque binary labels (`speaker_0`/`speaker_1`); which
//! human they belong to is session state. Stored segments keep only the raw
//! label; the role is always resolved through the current map at broadcast
//! time, so a later remap retroactively relabels everything without touching
//! stored history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Clinician,
    Patient,
}

#[derive(Debug, Clone, Default)]
pub struct SpeakerMap {
    assignments: HashMap<String, SpeakerRole>,
}

impl SpeakerMap {
    /// Auto-map heuristic: the first diarization label observed in a
    /// finalized segment is the clinician; its binary counterpart is the
    /// patient.
    pub fn auto_from_first(first_label: &str) -> Self {
        let mut assignments = HashMap::new();
        assignments.insert(first_label.to_string(), SpeakerRole::Clinician);
        if let Some(counterpart) = binary_counterpart(first_label) {
            assignments.insert(counterpart, SpeakerRole::Patient);
        }
        Self { assignments }
    }

    pub fn from_assignments(assignments: HashMap<String, SpeakerRole>) -> Self {
        Self { assignments }
    }

    pub fn resolve(&self, label: Option<&str>) -> Option<SpeakerRole> {
        label.and_then(|l| self.assignments.get(l).copied())
    }

    pub fn assignments(&self) -> &HashMap<String, SpeakerRole> {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// The other label of the fixed binary scheme: `speaker_0` <-> `speaker_1`.
fn binary_counterpart(label: &str) -> Option<String> {
    let (prefix, index) = label.rsplit_once('_')?;
    match index {
        "0" => Some(format!("{}_1", prefix)),
        "1" => Some(format!("{}_0", prefix)),
        _ => None,
    }
}
