// src/scrape/table.rs

use std::collections::HashMap;

use ego_tree::NodeRef;
use scraper::{Html, Node};
use serde::Serialize;
use tracing::{debug, warn};

use crate::scrape::error::ExtractError;
use crate::scrape::links::{INCIDENT_MARKER, STATION_MARKER};

// ============================================================================
// Page Layouts
// ============================================================================

/// Which portal template a table comes from.
///
/// Both layouts share the cell-shape rules except for a font-wrapped anchor:
/// the summary table lists incidents and stations as links, so it reads the
/// anchor's text, while the detail table reports the wrapped node as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `livecad.asp?print=yes`, the list of active incidents.
    Summary,
    /// `livecadcomments*.asp`, the per-incident unit status table.
    Detail,
}

impl Layout {
    fn unwraps_anchor(self) -> bool {
        matches!(self, Layout::Summary)
    }
}

/// Field values of every cell visited, in document order, plus the cells that
/// had to be skipped.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub fields: Vec<String>,
    #[serde(serialize_with = "serialize_faults")]
    pub faults: Vec<ExtractError>,
}

fn serialize_faults<S: serde::Serializer>(
    faults: &[ExtractError],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(faults.iter().map(ToString::to_string))
}

enum Cell {
    Field(String),
    /// Bold sentinel: nothing more to read at this level.
    EndOfRow,
}

// ============================================================================
// Entry Points
// ============================================================================

/// Extracts the incident list from the printable summary page.
pub fn main_table(html: &str) -> Extraction {
    extract_fields(&parse(html), Layout::Summary)
}

/// Extracts the unit status table from an incident detail page.
pub fn detail_table(html: &str) -> Extraction {
    extract_fields(&parse(html), Layout::Detail)
}

/// Summary-table fields of the row holding each incident link, keyed by the
/// link's `href`. With nested tables the innermost row wins.
pub fn incident_rows(html: &str) -> HashMap<String, Vec<String>> {
    let document = parse(html);
    let mut rows = HashMap::new();

    for row in document.tree.root().descendants().filter(|n| is_element(*n, "tr")) {
        let href = row
            .descendants()
            .filter_map(|n| n.value().as_element())
            .filter(|el| el.name() == "a")
            .filter_map(|el| el.attr("href"))
            .find(|href| !href.contains(STATION_MARKER) && href.contains(INCIDENT_MARKER));

        if let Some(href) = href {
            let fields = walk(row.first_child(), Layout::Summary).fields;
            rows.insert(href.to_string(), fields);
        }
    }

    rows
}

fn parse(html: &str) -> Html {
    let document = Html::parse_document(html);
    if !document.errors.is_empty() {
        debug!(count = document.errors.len(), "portal markup needed recovery");
    }
    document
}

/// Depth-first walk over every `<td>` in the document.
///
/// Each stack entry is the next sibling to visit at one depth. A cell is read
/// before its own children are walked, so nested tables interleave with the
/// outer cells in document order. A bold sentinel clears the entry for its
/// level: neither the sentinel's subtree nor its later siblings are read.
pub fn extract_fields(document: &Html, layout: Layout) -> Extraction {
    walk(document.tree.root().first_child(), layout)
}

/// Walks `first` and its following siblings, with their subtrees.
fn walk(first: Option<NodeRef<'_, Node>>, layout: Layout) -> Extraction {
    let mut out = Extraction::default();
    let mut cell_index = 0;
    let mut stack = vec![first];

    while let Some(cursor) = stack.last_mut() {
        let Some(node) = cursor.take() else {
            stack.pop();
            continue;
        };
        *cursor = node.next_sibling();

        if is_element(node, "td") {
            let index = cell_index;
            cell_index += 1;

            match read_cell(node, index, layout) {
                Ok(Cell::EndOfRow) => {
                    *cursor = None;
                    continue;
                }
                Ok(Cell::Field(value)) => out.fields.push(value),
                Err(fault) => {
                    warn!(%fault, ?layout, "skipping malformed cell");
                    out.faults.push(fault);
                }
            }
        }

        stack.push(node.first_child());
    }

    out
}

// ============================================================================
// Cell Shapes
// ============================================================================

/// Applies the cell-shape rules in priority order:
/// bold sentinel, `<font>` with a `<br>` (date and time), `<font>` around an
/// anchor (summary only), `<font>` around anything else, bare content.
fn read_cell(cell: NodeRef<'_, Node>, index: usize, layout: Layout) -> Result<Cell, ExtractError> {
    let first = cell
        .first_child()
        .ok_or(ExtractError::EmptyCell { cell: index })?;

    if is_element(first, "b") {
        return Ok(Cell::EndOfRow);
    }
    if !is_element(first, "font") {
        return Ok(Cell::Field(node_data(first)));
    }

    let inner = first
        .first_child()
        .ok_or(ExtractError::EmptyFont { cell: index })?;

    if let Some(br) = inner.next_sibling().filter(|n| is_element(*n, "br")) {
        let time = br
            .next_sibling()
            .ok_or(ExtractError::DanglingBreak { cell: index })?;
        return Ok(Cell::Field(format!("{}T{}", node_data(inner), node_data(time))));
    }

    if layout.unwraps_anchor() && is_element(inner, "a") {
        let text = inner
            .first_child()
            .ok_or(ExtractError::EmptyAnchor { cell: index })?;
        return Ok(Cell::Field(node_data(text)));
    }

    Ok(Cell::Field(node_data(inner)))
}

fn is_element(node: NodeRef<'_, Node>, name: &str) -> bool {
    node.value().as_element().is_some_and(|el| el.name() == name)
}

/// Text for text nodes, the tag name for elements.
fn node_data(node: NodeRef<'_, Node>) -> String {
    match node.value() {
        Node::Text(text) => String::from(&**text),
        Node::Element(el) => el.name().to_string(),
        Node::Comment(comment) => String::from(&**comment),
        _ => String::new(),
    }
}
