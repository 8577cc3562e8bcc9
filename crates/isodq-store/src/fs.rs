//! # Filesystem Store
//!
//! ## Layout
//!
//! ```text
//! messages/
//!   pacs.008/                     family from the directory name
//!     in_20240101_MSG0001.xml     message id MSG0001
//!   loose.xml                     family from the run default
//! rules/
//!   pacs.008.dq.json              preferred name
//!   camt.053.json                 accepted when no .dq.json exists
//! reports/
//!   MSG0001.json                  one file per message id, unsafe bytes as %XX
//! ```
//!
//! Reports are written to a temporary file in the reports directory and then
//! renamed over the target, so a reader never sees a half-written report.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use isodq_core::{FamilyId, Message, MessageId, Report, RuleSet};

use crate::error::StoreError;
use crate::{MessageSource, ReportSink, RuleSource};

/// Message id for a file stem: the text after the second underscore when
/// there is any, otherwise the whole stem.
pub fn message_id_from_stem(stem: &str) -> &str {
    match stem.splitn(3, '_').nth(2) {
        Some(tail) if !tail.is_empty() => tail,
        _ => stem,
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    if !dir.is_dir() {
        return Err(StoreError::NotADirectory(dir.to_path_buf()));
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn is_xml(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Reads `*.xml` message files from a directory tree one level deep.
#[derive(Debug, Clone)]
pub struct FsMessageSource {
    dir: PathBuf,
    default_family: Option<FamilyId>,
}

impl FsMessageSource {
    /// Source rooted at `dir`. Top-level files take `default_family`; without
    /// one they are skipped.
    pub fn new(dir: impl Into<PathBuf>, default_family: Option<FamilyId>) -> Self {
        Self {
            dir: dir.into(),
            default_family,
        }
    }

    fn read_message(path: &Path, family: &FamilyId) -> Result<Message, StoreError> {
        let bytes = std::fs::read(path).map_err(|e| StoreError::io(path, e))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Message {
            id: MessageId::new(message_id_from_stem(&stem)),
            raw_payload: String::from_utf8_lossy(&bytes).into_owned(),
            family: family.clone(),
        })
    }
}

impl MessageSource for FsMessageSource {
    fn read_all_messages(&self) -> Result<Vec<Message>, StoreError> {
        let mut messages = Vec::new();
        for path in sorted_entries(&self.dir)? {
            if path.is_dir() {
                let family = FamilyId::new(
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                );
                for file in sorted_entries(&path)?.into_iter().filter(|p| is_xml(p)) {
                    messages.push(Self::read_message(&file, &family)?);
                }
            } else if is_xml(&path) {
                match &self.default_family {
                    Some(family) => messages.push(Self::read_message(&path, family)?),
                    None => tracing::warn!(
                        path = %path.display(),
                        "skipping message outside a family directory; no default family set"
                    ),
                }
            }
        }
        tracing::info!(dir = %self.dir.display(), count = messages.len(), "read messages");
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Reads `<family>.dq.json` / `<family>.json` rule documents.
#[derive(Debug, Clone)]
pub struct FsRuleSource {
    dir: PathBuf,
}

impl FsRuleSource {
    /// Source rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Family id for a rules file name, and whether it used the preferred
    /// `.dq.json` suffix.
    fn family_of(file_name: &str) -> Option<(FamilyId, bool)> {
        if let Some(family) = file_name.strip_suffix(".dq.json") {
            return (!family.is_empty()).then(|| (FamilyId::from(family), true));
        }
        let family = file_name.strip_suffix(".json")?;
        (!family.is_empty()).then(|| (FamilyId::from(family), false))
    }
}

impl RuleSource for FsRuleSource {
    fn read_rule_sets(&self) -> Result<BTreeMap<FamilyId, RuleSet>, StoreError> {
        let mut chosen: BTreeMap<FamilyId, (bool, PathBuf)> = BTreeMap::new();
        for path in sorted_entries(&self.dir)? {
            if !path.is_file() {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let Some((family, preferred)) = Self::family_of(&name) else {
                continue;
            };
            let replace = chosen.get(&family).map_or(true, |(p, _)| preferred && !p);
            if replace {
                chosen.insert(family, (preferred, path));
            }
        }

        let mut sets = BTreeMap::new();
        for (family, (_, path)) in chosen {
            let text = std::fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            let set = RuleSet::from_json(family.clone(), &text);
            for skipped in &set.skipped {
                tracing::warn!(
                    family = %family,
                    index = skipped.index,
                    reason = %skipped.reason,
                    "skipping rule record"
                );
            }
            if set.is_empty() {
                tracing::warn!(family = %family, path = %path.display(), "rule set has no usable rules");
            }
            tracing::debug!(
                family = %family,
                rules = set.rules.len(),
                skipped = set.skipped.len(),
                "loaded rule set"
            );
            sets.insert(family, set);
        }
        Ok(sets)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Writes `<message_id>.json` reports; buffers upserts until [`flush`](ReportSink::flush).
#[derive(Debug)]
pub struct FsReportSink {
    dir: PathBuf,
    pending: Mutex<BTreeMap<MessageId, Report>>,
}

impl FsReportSink {
    /// Sink writing into `dir`, created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self {
            dir,
            pending: Mutex::new(BTreeMap::new()),
        })
    }

    /// Path of the report file for `id`.
    pub fn report_path(&self, id: &MessageId) -> PathBuf {
        self.dir.join(format!("{}.json", file_safe(id.as_str())))
    }

    /// Read back a written report.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file is missing or not a report.
    pub fn load(&self, id: &MessageId) -> Result<Report, StoreError> {
        let path = self.report_path(id);
        let text = std::fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        serde_json::from_str(&text).map_err(|source| StoreError::Json { path, source })
    }

    fn write_atomic(&self, report: &Report) -> Result<(), StoreError> {
        let path = self.report_path(&report.message_id);
        let json = serde_json::to_vec_pretty(report).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let tmp = self
            .dir
            .join(format!(".{}.json.tmp", file_safe(report.message_id.as_str())));
        std::fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))
    }
}

impl ReportSink for FsReportSink {
    fn upsert(&self, report: Report) -> Result<(), StoreError> {
        self.pending.lock().insert(report.message_id.clone(), report);
        Ok(())
    }

    fn flush(&self) -> Result<usize, StoreError> {
        let batch = std::mem::take(&mut *self.pending.lock());
        let mut written = 0;
        let mut iter = batch.into_iter();
        while let Some((id, report)) = iter.next() {
            if let Err(e) = self.write_atomic(&report) {
                // Keep the failed report and everything after it queued.
                let mut pending = self.pending.lock();
                pending.entry(id).or_insert(report);
                for (id, report) in iter {
                    pending.entry(id).or_insert(report);
                }
                return Err(e);
            }
            written += 1;
        }
        tracing::debug!(dir = %self.dir.display(), written, "flushed reports");
        Ok(written)
    }
}

/// Map a message id to a file name stem, losslessly.
///
/// ASCII letters, digits, `-`, `_` and non-leading `.` are kept; every other
/// byte, `%` included, becomes `%XX`. The empty id is `%`, which no other id
/// encodes to.
fn file_safe(id: &str) -> String {
    if id.is_empty() {
        return "%".to_string();
    }
    let mut out = String::with_capacity(id.len());
    for (i, byte) in id.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') || (byte == b'.' && i > 0);
        if keep {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_is_text_after_second_underscore() {
        assert_eq!(message_id_from_stem("abc_123_DEF45"), "DEF45");
        assert_eq!(message_id_from_stem("in_2024_MSG_0001"), "MSG_0001");
        assert_eq!(message_id_from_stem("abc_123"), "abc_123");
        assert_eq!(message_id_from_stem("abc_123_"), "abc_123_");
        assert_eq!(message_id_from_stem("plain"), "plain");
    }

    #[test]
    fn rule_file_names_map_to_families() {
        assert_eq!(
            FsRuleSource::family_of("pacs.008.dq.json"),
            Some((FamilyId::from("pacs.008"), true))
        );
        assert_eq!(
            FsRuleSource::family_of("camt.053.json"),
            Some((FamilyId::from("camt.053"), false))
        );
        assert_eq!(FsRuleSource::family_of(".dq.json"), None);
        assert_eq!(FsRuleSource::family_of("notes.txt"), None);
    }

    #[test]
    fn file_names_escape_unsafe_bytes() {
        assert_eq!(file_safe("MSG_0001"), "MSG_0001");
        assert_eq!(file_safe("MSG/0001"), "MSG%2F0001");
        assert_eq!(file_safe("PAY 001"), "PAY%20001");
        assert_eq!(file_safe("50%"), "50%25");
        assert_eq!(file_safe("..x"), "%2E.x");
        assert_eq!(file_safe("é"), "%C3%A9");
        assert_eq!(file_safe(""), "%");
    }

    #[test]
    fn distinct_ids_get_distinct_file_names() {
        let ids = ["PAY 001", "PAY_001", "PAY%20001", "PAY/001", "", "%", ".x", "%2Ex"];
        let names: std::collections::BTreeSet<String> = ids.iter().map(|id| file_safe(id)).collect();
        assert_eq!(names.len(), ids.len());
    }
}
