// src/scrape/links.rs

use scraper::Html;
use serde::Serialize;

/// Substring identifying a fire/EMS station lookup link.
pub const STATION_MARKER: &str = "Lookup";
/// Substring identifying a live incident detail link.
pub const INCIDENT_MARKER: &str = "livecad";

/// Station and incident links in the order their anchors appear.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
    pub stations: Vec<String>,
    pub incidents: Vec<String>,
}

impl Links {
    pub fn from_html(html: &str) -> Self {
        classify_links(&Html::parse_document(html))
    }

    /// Incident links paired with the station link at the same position.
    pub fn paired(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.incidents
            .iter()
            .enumerate()
            .map(|(i, incident)| (incident.as_str(), self.stations.get(i).map(String::as_str)))
    }
}

/// Walks the document in pre-order and buckets every anchor's `href`.
///
/// A link matching the station marker is never also counted as an incident.
pub fn classify_links(document: &Html) -> Links {
    let mut links = Links::default();

    for node in document.tree.root().descendants() {
        let Some(anchor) = node.value().as_element().filter(|el| el.name() == "a") else {
            continue;
        };
        // html5ever keeps only the first of any duplicated attribute
        let Some(href) = anchor.attr("href") else {
            continue;
        };

        if href.contains(STATION_MARKER) {
            links.stations.push(href.to_string());
        } else if href.contains(INCIDENT_MARKER) {
            links.incidents.push(href.to_string());
        }
    }

    links
}
