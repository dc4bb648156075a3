// src/incident/model.rs

use std::collections::HashMap;

use serde::Serialize;

use crate::scrape::Extraction;

/// Result of one poll cycle.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub fetched_at: String,
    pub source: String,
    /// Fields of the summary table, in column order across all rows.
    pub summary: Extraction,
    pub incidents: Vec<IncidentRecord>,
}

impl Snapshot {
    /// Incidents whose detail page could not be fetched this cycle.
    pub fn detail_failures(&self) -> usize {
        self.incidents.iter().filter(|r| r.error.is_some()).count()
    }
}

#[derive(Debug, Serialize)]
pub struct IncidentRecord {
    pub detail_url: String,
    pub incident: HashMap<String, String>,
    /// Station link listed at the same position as the incident, if any.
    pub station: Option<HashMap<String, String>>,
    /// Fields of the summary-table row holding the incident link.
    pub summary: Vec<String>,
    /// Detail-page fields and the cells that could not be read.
    pub status: Extraction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
