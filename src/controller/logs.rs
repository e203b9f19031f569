//! Line splitting, colour stripping and `JENKINS_EXPORT` harvesting.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Marker announcing an exported variable in job output.
pub const EXPORT_MARKER: &str = "JENKINS_EXPORT";

#[expect(
    clippy::expect_used,
    reason = "the pattern is a constant and is covered by unit tests"
)]
static ANSI_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B\[[;\d]*m").expect("constant colour pattern is valid"));

/// Removes ANSI SGR colour sequences from `line`.
#[must_use]
pub fn strip_color(line: &str) -> String {
    ANSI_COLOR.replace_all(line, "").into_owned()
}

/// Parses an export marker line into a key and value.
///
/// The key is the text between the last `"JENKINS_EXPORT "` and the first
/// `=`. One trailing and then one leading double quote are removed from the
/// value, so both `JENKINS_EXPORT K="v"` and the quoted-message form
/// `"msg": "JENKINS_EXPORT K=v"` yield `v`.
#[must_use]
pub fn parse_export(line: &str) -> Option<(String, String)> {
    let clean = strip_color(line);
    let (left, right) = clean.split_once('=')?;
    let marker = format!("{EXPORT_MARKER} ");
    let key = left.rsplit_once(&marker).map(|(_, key)| key)?.trim();
    if key.is_empty() {
        return None;
    }
    let unquoted = right.strip_suffix('"').unwrap_or(right);
    let value = unquoted.strip_prefix('"').unwrap_or(unquoted);
    Some((key.to_owned(), value.to_owned()))
}

/// Turns raw job output into emitted lines while collecting exports.
///
/// One processor lives for one operation; its export map is returned to the
/// caller when the operation finishes. Later writes to a key replace
/// earlier ones.
#[derive(Debug, Clone, Default)]
pub struct LogProcessor {
    remove_color: bool,
    exports: BTreeMap<String, String>,
}

impl LogProcessor {
    /// Creates a processor, optionally stripping colour from emitted lines.
    #[must_use]
    pub const fn new(remove_color: bool) -> Self {
        Self {
            remove_color,
            exports: BTreeMap::new(),
        }
    }

    /// Splits `text` on `\r\n`, scans each line for export markers and
    /// appends the (optionally colour-stripped) lines to `lines`.
    pub fn push(&mut self, text: &str, lines: &mut Vec<String>) {
        for line in text.split("\r\n") {
            if line.contains(EXPORT_MARKER) {
                if let Some((key, value)) = parse_export(line) {
                    self.record(key, value);
                }
            }
            lines.push(if self.remove_color {
                strip_color(line)
            } else {
                line.to_owned()
            });
        }
    }

    /// Records an exported variable.
    pub fn record(&mut self, key: String, value: String) {
        debug!(%key, "exported variable");
        self.exports.insert(key, value);
    }

    /// Merges `artifacts.JENKINS_EXPORT` from a finished job.
    ///
    /// The artifact is an array of objects; non-string values are kept in
    /// their JSON form.
    pub fn harvest_artifacts(&mut self, job: &Value) {
        let Some(entries) = job
            .get("artifacts")
            .and_then(|artifacts| artifacts.get(EXPORT_MARKER))
            .and_then(Value::as_array)
        else {
            return;
        };

        for object in entries.iter().filter_map(Value::as_object) {
            for (key, value) in object {
                let text = value
                    .as_str()
                    .map_or_else(|| value.to_string(), str::to_owned);
                self.record(key.clone(), text);
            }
        }
    }

    /// Variables exported so far.
    #[must_use]
    pub const fn exports(&self) -> &BTreeMap<String, String> {
        &self.exports
    }

    /// Consumes the processor, returning the exported variables.
    #[must_use]
    pub fn into_exports(self) -> BTreeMap<String, String> {
        self.exports
    }
}
