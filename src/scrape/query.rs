// src/scrape/query.rs

use std::collections::HashMap;

/// Literal rewrites collapsing the portal's historical link prefixes to a bare
/// query key. Applied in this order; the comments-fireems path must run before
/// the shorter comments path.
const REWRITES: [(&str, &str); 7] = [
    ("livecadcomments-fireems.asp?eid", "eid"),
    ("LookupFD.asp?FDStation", "FDStation"),
    ("LookupEMS.asp?EMSStation", "EMSStation"),
    ("livecadcomments.asp?eid", "eid"),
    ("map.asp?type", "type"),
    ("<br>", " "),
    (" @ ", " "),
];

/// Rewrites a raw link token into a bare query string.
///
/// The rewrite list is repeated until nothing changes, so the result is a
/// fixed point. Every rewrite shortens the string, which bounds the loop.
pub fn clean_up(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = REWRITES
            .iter()
            .fold(current.clone(), |s, (from, to)| s.replace(from, to));
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Splits a station or incident link into its query parameters.
///
/// Segments that do not split into exactly one key and one value are dropped.
/// A repeated key keeps its last value.
pub fn normalize_query(raw: &str) -> HashMap<String, String> {
    clean_up(raw)
        .split('&')
        .filter_map(|segment| {
            let parts: Vec<&str> = segment.split('=').collect();
            match parts.as_slice() {
                [key, value] => Some((key.to_string(), value.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Joins a relative portal link onto `base`, encoding spaces as `%20`.
/// Nothing else in the URL is touched or validated.
pub fn detail_url(base: &str, link: &str) -> String {
    format!("{base}{link}").replace(' ', "%20")
}
