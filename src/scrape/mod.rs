// src/scrape/mod.rs

//! Extraction of station links, incident links and table fields from the
//! WebCAD portal's loosely structured markup.
//!
//! Everything here is synchronous and works on an owned, parsed document, so
//! pages can be extracted in parallel without coordination.

mod error;
mod links;
mod query;
mod table;

pub use links::Links;
pub use query::{detail_url, normalize_query};
pub use table::{Extraction, detail_table, incident_rows, main_table};
