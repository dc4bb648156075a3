// src/inspect/mod.rs

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::scrape::{Links, detail_table, main_table, normalize_query};

// ============================================================================
// Inspect Arguments
// ============================================================================

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum PageKind {
    /// Station and incident links
    Links,
    /// Fields of the live incident list
    Summary,
    /// Fields of an incident's unit status table
    Detail,
}

#[derive(clap::Args)]
pub struct InspectArgs {
    /// Saved HTML page
    file: PathBuf,

    /// How to read the page
    #[arg(long, value_enum, default_value_t = PageKind::Summary)]
    kind: PageKind,
}

/// Runs one extractor over a page saved from the portal and prints the result.
pub fn run(args: InspectArgs) -> Result<()> {
    let html = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {:?}", args.file))?;

    println!("{}", serde_json::to_string_pretty(&render(&html, args.kind)?)?);
    Ok(())
}

fn render(html: &str, kind: PageKind) -> Result<Value> {
    let value = match kind {
        PageKind::Links => {
            let links = Links::from_html(html);
            json!({
                "stations": describe(&links.stations),
                "incidents": describe(&links.incidents),
            })
        }
        PageKind::Summary => serde_json::to_value(main_table(html))?,
        PageKind::Detail => serde_json::to_value(detail_table(html))?,
    };
    Ok(value)
}

fn describe(hrefs: &[String]) -> Vec<Value> {
    hrefs
        .iter()
        .map(|href| json!({ "href": href, "query": normalize_query(href) }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = include_str!("../../fixtures/livecad_print.html");

    #[test]
    fn links_are_listed_with_their_query() {
        let value = render(SUMMARY, PageKind::Links).unwrap();

        assert_eq!(value["stations"][0]["href"], "LookupFD.asp?FDStation=12");
        assert_eq!(value["stations"][1]["query"]["EMSStation"], "326");
        assert_eq!(value["incidents"][0]["query"]["eid"], "F23123456");
        assert_eq!(value["incidents"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn detail_kind_reports_faults_as_messages() {
        let value = render("<table><tr><td></td></tr></table>", PageKind::Detail).unwrap();
        assert_eq!(value["fields"], json!([]));
        assert_eq!(value["faults"], json!(["cell 0 has no content"]));
    }
}
