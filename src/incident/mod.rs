// src/incident/mod.rs

mod model;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use futures::stream::{self, StreamExt};
use regex::Regex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{
    CONCURRENCY_FETCH, ERROR_BACKOFF, FETCH_TIMEOUT, MONTCO_ZIP_CODES, REFRESH_RATE,
    WEBCAD_MONTCO, WEBCAD_MONTCO_PRINT,
};
use crate::fetch::{ClientConfig, FetchClient, FetchError};
use crate::incident::model::{IncidentRecord, Snapshot};
use crate::scrape::{
    Extraction, Links, detail_table, detail_url, incident_rows, main_table, normalize_query,
};
use crate::utils::{ensure_dir, parse_key_val, resolve_url};

// ============================================================================
// Argument Structure
// ============================================================================

#[derive(clap::Args)]
pub struct PollArgs {
    /// Output directory
    #[arg(short, long, default_value = "./storage/webcad")]
    output_dir: PathBuf,

    /// Keep only incidents whose summary row or detail page mentions a
    /// monitored zip code (incidents whose detail fetch failed are kept)
    #[arg(long)]
    zip_filter: bool,

    /// Request header sent with every fetch, as NAME=VALUE (repeatable)
    #[arg(long = "header", value_parser = parse_key_val)]
    headers: Vec<(String, String)>,

    /// Cookie sent with every fetch, as NAME=VALUE (repeatable)
    #[arg(long = "cookie", value_parser = parse_key_val)]
    cookies: Vec<(String, String)>,

    /// Per-request deadline in milliseconds
    #[arg(
        long,
        default_value_t = FETCH_TIMEOUT.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_ms: u64,
}

impl PollArgs {
    fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::default().timeout(Duration::from_millis(self.timeout_ms));
        let config = self
            .headers
            .iter()
            .fold(config, |config, (name, value)| config.header(name, value));
        self.cookies
            .iter()
            .fold(config, |config, (name, value)| config.cookie(name, value))
    }
}

// ============================================================================
// Main Execution
// ============================================================================

/// Runs a single poll cycle and saves the snapshot.
///
/// The snapshot is written even when detail pages failed, but the command
/// then exits with an error.
pub async fn run(args: PollArgs) -> Result<()> {
    let poller = Poller::from_args(&args)?;
    ensure_dir(&args.output_dir)?;

    println!("\n[Polling {}]", poller.summary_url);
    let snapshot = poller.poll().await?;
    let path = save_snapshot(&args.output_dir, &snapshot)?;
    println!("✓ Saved {} incidents to {:?}", snapshot.incidents.len(), path);

    let failures = snapshot.detail_failures();
    if failures > 0 {
        anyhow::bail!("{} incident detail page(s) could not be fetched", failures);
    }

    Ok(())
}

/// Polls until interrupted. A failed cycle is logged and followed by the
/// longer backoff; nothing from it carries into the next cycle.
pub async fn watch(args: PollArgs) -> Result<()> {
    let poller = Poller::from_args(&args)?;
    ensure_dir(&args.output_dir)?;

    loop {
        let outcome = poller.poll().await.and_then(|snapshot| {
            let path = save_snapshot(&args.output_dir, &snapshot)?;
            info!(count = snapshot.incidents.len(), ?path, "snapshot saved");
            Ok(snapshot)
        });

        let wait = next_wait(&outcome);
        println!(" Next poll in {}s", wait.as_secs());
        tokio::select! {
            _ = sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping.");
                return Ok(());
            }
        }
    }
}

/// A cycle counts as failed when the summary fetch failed, the snapshot
/// could not be saved, or any incident's detail page failed.
fn next_wait(outcome: &Result<Snapshot>) -> Duration {
    match outcome {
        Ok(snapshot) if snapshot.detail_failures() == 0 => REFRESH_RATE,
        Ok(snapshot) => {
            warn!(
                failures = snapshot.detail_failures(),
                "poll cycle incomplete, backing off"
            );
            ERROR_BACKOFF
        }
        Err(e) => {
            warn!("poll cycle failed: {:#}", e);
            ERROR_BACKOFF
        }
    }
}

fn save_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<PathBuf> {
    let path = dir.join("incidents.json");
    fs::write(&path, serde_json::to_string_pretty(snapshot)?)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

// ============================================================================
// Poller
// ============================================================================

pub struct Poller {
    client: FetchClient,
    summary_url: String,
    detail_base: String,
    zip_filter: Option<ZipFilter>,
}

impl Poller {
    pub fn new(
        client: FetchClient,
        summary_url: String,
        detail_base: String,
        zip_filter: Option<ZipFilter>,
    ) -> Self {
        Self {
            client,
            summary_url,
            detail_base,
            zip_filter,
        }
    }

    fn from_args(args: &PollArgs) -> Result<Self> {
        let client =
            FetchClient::new(args.client_config()).context("Invalid client configuration")?;

        Ok(Self::new(
            client,
            resolve_url("WEBCAD_PRINT_URL", WEBCAD_MONTCO_PRINT),
            resolve_url("WEBCAD_BASE_URL", WEBCAD_MONTCO),
            args.zip_filter.then(|| ZipFilter::new(&MONTCO_ZIP_CODES)),
        ))
    }

    /// Fetches the summary page, then every incident's detail page.
    ///
    /// Only a failed summary fetch fails here; a failed detail fetch is
    /// recorded on its incident and counted by `Snapshot::detail_failures`.
    pub async fn poll(&self) -> Result<Snapshot> {
        let page = self
            .client
            .fetch(&self.summary_url)
            .await
            .context("Failed to fetch the live incident page")?;

        let links = Links::from_html(&page);
        let summary = main_table(&page);
        let mut rows = incident_rows(&page);
        println!(
            " Found {} incidents and {} station links",
            links.incidents.len(),
            links.stations.len()
        );

        let urls: Vec<String> = links
            .incidents
            .iter()
            .map(|link| detail_url(&self.detail_base, link))
            .collect();

        let pages: Vec<Result<String, FetchError>> = stream::iter(&urls)
            .map(|url| self.client.fetch(url))
            .buffered(CONCURRENCY_FETCH)
            .collect()
            .await;

        let mut incidents: Vec<IncidentRecord> = links
            .paired()
            .zip(urls.into_iter().zip(pages))
            .map(|((incident, station), (url, page))| {
                let row = rows.remove(incident).unwrap_or_default();
                build_record(incident, station, row, url, page)
            })
            .collect();

        if let Some(filter) = &self.zip_filter {
            incidents.retain(|record| filter.keeps(record));
        }

        Ok(Snapshot {
            fetched_at: Local::now().to_rfc3339(),
            source: self.summary_url.clone(),
            summary,
            incidents,
        })
    }
}

fn build_record(
    incident: &str,
    station: Option<&str>,
    summary: Vec<String>,
    detail_url: String,
    page: Result<String, FetchError>,
) -> IncidentRecord {
    let (status, error) = match page {
        Ok(html) => (detail_table(&html), None),
        Err(e) => {
            warn!(%e, "skipping incident detail");
            (Extraction::default(), Some(e.to_string()))
        }
    };

    IncidentRecord {
        detail_url,
        incident: normalize_query(incident),
        station: station.map(normalize_query),
        summary,
        status,
        error,
    }
}

// ============================================================================
// Zip Filter
// ============================================================================

static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{5})\b").unwrap());

/// Matches field text mentioning one of a fixed set of zip codes.
pub struct ZipFilter {
    allowed: HashSet<u32>,
}

impl ZipFilter {
    pub fn new(codes: &[u32]) -> Self {
        Self {
            allowed: codes.iter().copied().collect(),
        }
    }

    /// Failed detail fetches are kept so the error stays in the snapshot.
    pub fn keeps(&self, record: &IncidentRecord) -> bool {
        record.error.is_some()
            || self.matches(&record.summary)
            || self.matches(&record.status.fields)
    }

    pub fn matches(&self, fields: &[String]) -> bool {
        fields.iter().any(|field| {
            ZIP_RE.captures_iter(field).any(|caps| {
                caps[1]
                    .parse::<u32>()
                    .is_ok_and(|zip| self.allowed.contains(&zip))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = include_str!("../../fixtures/livecad_print.html");
    const DETAIL: &str = include_str!("../../fixtures/livecadcomments.html");

    async fn portal(server: &mut mockito::Server) {
        server
            .mock("GET", "/livecad.asp")
            .match_query(mockito::Matcher::Any)
            .with_body(SUMMARY)
            .create_async()
            .await;
        server
            .mock("GET", "/livecadcomments-fireems.asp")
            .match_query(mockito::Matcher::UrlEncoded("eid".into(), "F23123456".into()))
            .with_body(DETAIL)
            .create_async()
            .await;
        server
            .mock("GET", "/livecadcomments.asp")
            .match_query(mockito::Matcher::UrlEncoded("eid".into(), "E23000042".into()))
            .with_body("<table><tr><td><font>MED326</font></td></tr></table>")
            .create_async()
            .await;
    }

    fn poller(server: &mockito::Server, zip_filter: Option<ZipFilter>) -> Poller {
        let client =
            FetchClient::new(ClientConfig::default().timeout(Duration::from_secs(5))).unwrap();
        Poller::new(
            client,
            format!("{}/livecad.asp?print=yes", server.url()),
            format!("{}/", server.url()),
            zip_filter,
        )
    }

    #[tokio::test]
    async fn poll_pairs_incidents_with_stations() {
        let mut server = mockito::Server::new_async().await;
        portal(&mut server).await;

        let snapshot = poller(&server, None).poll().await.unwrap();

        assert_eq!(snapshot.summary.fields.len(), 12);
        assert_eq!(snapshot.incidents.len(), 2);

        let fire = &snapshot.incidents[0];
        assert_eq!(fire.incident["eid"], "F23123456");
        assert_eq!(fire.station.as_ref().unwrap()["FDStation"], "12");
        assert_eq!(fire.status.fields[1], "ENG12");
        assert!(fire.error.is_none());

        let medical = &snapshot.incidents[1];
        assert_eq!(medical.incident["eid"], "E23000042");
        assert_eq!(medical.station.as_ref().unwrap()["EMSStation"], "326");
        assert_eq!(medical.status.fields, vec!["MED326"]);
        assert_eq!(
            medical.detail_url,
            format!("{}/livecadcomments.asp?eid=E23000042", server.url())
        );
    }

    #[tokio::test]
    async fn zip_filter_reads_summary_row_and_detail() {
        let mut server = mockito::Server::new_async().await;
        portal(&mut server).await;

        // F23123456 sits in 19401 on the summary page, E23000042 in 19428
        let snapshot = poller(&server, Some(ZipFilter::new(&[19401])))
            .poll()
            .await
            .unwrap();
        assert_eq!(snapshot.incidents.len(), 1);
        assert_eq!(snapshot.incidents[0].incident["eid"], "F23123456");

        // 19428 appears on F23123456's detail page and E23000042's summary row
        let snapshot = poller(&server, Some(ZipFilter::new(&MONTCO_ZIP_CODES)))
            .poll()
            .await
            .unwrap();
        assert_eq!(snapshot.incidents.len(), 2);
        assert_eq!(snapshot.incidents[1].summary[4], "PLYMOUTH 19428");
        assert_eq!(snapshot.incidents[1].status.fields, vec!["MED326"]);
    }

    #[tokio::test]
    async fn failed_details_survive_the_zip_filter() {
        let mut server = mockito::Server::new_async().await;
        portal(&mut server).await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let client =
            FetchClient::new(ClientConfig::default().timeout(Duration::from_secs(5))).unwrap();
        let poller = Poller::new(
            client,
            format!("{}/livecad.asp?print=yes", server.url()),
            format!("http://{dead}/"),
            Some(ZipFilter::new(&[19027])),
        );

        let snapshot = poller.poll().await.unwrap();

        assert_eq!(snapshot.incidents.len(), 2);
        assert_eq!(snapshot.detail_failures(), 2);
        assert!(snapshot.incidents.iter().all(|r| r.error.is_some()));
        assert_eq!(next_wait(&Ok(snapshot)), ERROR_BACKOFF);
    }

    #[tokio::test]
    async fn clean_cycle_waits_the_refresh_rate() {
        let mut server = mockito::Server::new_async().await;
        portal(&mut server).await;

        let outcome = poller(&server, None).poll().await;
        assert_eq!(next_wait(&outcome), REFRESH_RATE);
        assert_eq!(next_wait(&Err(anyhow::anyhow!("summary down"))), ERROR_BACKOFF);
    }

    #[tokio::test]
    async fn missing_summary_page_fails_the_cycle() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            FetchClient::new(ClientConfig::default().timeout(Duration::from_secs(5))).unwrap();
        let poller = Poller::new(
            client,
            format!("http://{addr}/livecad.asp?print=yes"),
            format!("http://{addr}/"),
            None,
        );
        assert!(poller.poll().await.is_err());
    }

    #[test]
    fn failed_detail_is_recorded_on_the_incident() {
        let record = build_record(
            "livecadcomments.asp?eid=E1",
            None,
            Vec::new(),
            "https://example.org/livecadcomments.asp?eid=E1".into(),
            Err(FetchError::Timeout {
                url: "https://example.org/livecadcomments.asp?eid=E1".into(),
                after: Duration::from_millis(800),
            }),
        );

        assert_eq!(record.incident["eid"], "E1");
        assert!(record.station.is_none());
        assert!(record.status.fields.is_empty());
        assert!(record.error.unwrap().contains("did not complete"));
    }

    #[derive(clap::Parser)]
    struct PollCli {
        #[command(flatten)]
        poll: PollArgs,
    }

    #[test]
    fn repeated_flags_fold_into_client_config() {
        use clap::Parser;

        let cli = PollCli::try_parse_from([
            "webcad",
            "--header",
            "Referer=https://webapp07.montcopa.org/",
            "--header",
            "X-Requested-With=webcad",
            "--cookie",
            "ASPSESSIONID=abc",
            "--cookie",
            "lang=en",
            "--timeout-ms",
            "1500",
        ])
        .unwrap();
        let config = cli.poll.client_config();

        assert_eq!(config.headers.len(), 2);
        assert_eq!(config.headers["X-Requested-With"], "webcad");
        assert_eq!(config.cookies["ASPSESSIONID"], "abc");
        assert_eq!(config.cookies["lang"], "en");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn timeout_defaults_to_800ms_and_rejects_zero() {
        use clap::Parser;

        let cli = PollCli::try_parse_from(["webcad"]).unwrap();
        assert_eq!(cli.poll.client_config().timeout, FETCH_TIMEOUT);

        assert!(PollCli::try_parse_from(["webcad", "--timeout-ms", "0"]).is_err());
        assert!(PollCli::try_parse_from(["webcad", "--header", "no-separator"]).is_err());
    }

    #[test]
    fn zip_filter_matches_whole_codes_only() {
        let filter = ZipFilter::new(&MONTCO_ZIP_CODES);
        assert!(filter.matches(&[String::from("RIDGE PIKE, PLYMOUTH 19428")]));
        assert!(!filter.matches(&[String::from("NORRISTOWN 19401")]));
        assert!(!filter.matches(&[String::from("UNIT 1194281")]));
        assert!(!filter.matches(&[]));
    }

    #[test]
    fn snapshot_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot {
            fetched_at: "2023-12-01T14:32:00-05:00".into(),
            source: WEBCAD_MONTCO_PRINT.into(),
            summary: main_table(SUMMARY),
            incidents: Vec::new(),
        };

        let path = save_snapshot(dir.path(), &snapshot).unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(saved["summary"]["fields"][0], "F23123456");
        assert_eq!(saved["summary"]["faults"], serde_json::json!([]));
        assert_eq!(saved["incidents"], serde_json::json!([]));
    }
}
