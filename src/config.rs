// src/config.rs

use std::time::Duration;

// ============================================================================
// Portal Endpoints (Montgomery County, PA)
// ============================================================================

/// Base path that relative incident links on the live page resolve against.
pub const WEBCAD_MONTCO: &str = "https://webapp07.montcopa.org/eoc/cadinfo/";

/// Printable summary page listing every active incident.
pub const WEBCAD_MONTCO_PRINT: &str =
    "https://webapp07.montcopa.org/eoc/cadinfo/livecad.asp?print=yes";

// ============================================================================
// Polling & Network
// ============================================================================

pub const REFRESH_RATE: Duration = Duration::from_secs(70);
pub const ERROR_BACKOFF: Duration = Duration::from_secs(200);

/// Deadline covering the request and the full body read.
pub const FETCH_TIMEOUT: Duration = Duration::from_millis(800);

/// Detail pages fetched in parallel per cycle.
pub const CONCURRENCY_FETCH: usize = 4;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ============================================================================
// Filtering
// ============================================================================

pub const MONTCO_ZIP_CODES: [u32; 7] = [19027, 18041, 18426, 18964, 19044, 19454, 19428];
