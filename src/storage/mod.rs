//! File I/O.
//!
//! Reads the puppet list (`que.txt`) and writes run outputs: the last
//! page received after a settings change and the optional JSON run report.
//! Nothing written here is read back by a later run.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::engine::report::RunReport;
use crate::types::NationName;

/// Default page dump path.
pub const DEFAULT_PAGE_DUMP: &str = "response.html";

/// A `que.txt` line that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line: usize,
    pub reason: String,
}

/// Parsed puppet list.
#[derive(Debug, Clone, Default)]
pub struct PuppetList {
    pub nations: Vec<NationName>,
    pub rejected: Vec<RejectedLine>,
}

/// Parse puppet names, one per line, keeping file order.
///
/// Blank lines and `#` comments are ignored. Duplicates (compared in
/// canonical form) keep their first occurrence.
pub fn parse_puppets(contents: &str) -> PuppetList {
    let mut list = PuppetList::default();
    let mut seen = HashSet::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match NationName::parse(line) {
            Ok(name) => {
                if seen.insert(name.canonical()) {
                    list.nations.push(name);
                } else {
                    list.rejected.push(RejectedLine {
                        line: idx + 1,
                        reason: format!("duplicate of {name}"),
                    });
                }
            }
            Err(e) => list.rejected.push(RejectedLine {
                line: idx + 1,
                reason: e.to_string(),
            }),
        }
    }

    list
}

/// Load the puppet list from disk.
pub fn load_puppets(path: &Path) -> Result<PuppetList> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read puppet list: {}", path.display()))?;

    let list = parse_puppets(&contents);
    for rejected in &list.rejected {
        warn!(path = %path.display(), line = rejected.line, reason = %rejected.reason, "Skipping puppet line");
    }
    info!(
        path = %path.display(),
        puppets = list.nations.len(),
        skipped = list.rejected.len(),
        "Puppet list loaded"
    );
    Ok(list)
}

/// Write the last page received to `path` for inspection.
pub fn save_page(html: &str, path: &Path) -> Result<()> {
    std::fs::write(path, html)
        .with_context(|| format!("Failed to write page dump to {}", path.display()))?;
    debug!(path = %path.display(), bytes = html.len(), "Page saved");
    Ok(())
}

/// Open the log file for a new run, discarding the previous run's log.
pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

/// Save a run report as pretty JSON.
pub fn save_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialise run report")?;
    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write run report to {}", path.display()))?;
    info!(path = %path.display(), run_id = %report.run_id, "Run report saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("que_test_{}_{name}", uuid::Uuid::new_v4()));
        p
    }

    #[test]
    fn test_parse_keeps_order() {
        let list = parse_puppets("Puppet Three\npuppet_one\nPuppet Two\n");
        let names: Vec<_> = list.nations.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["Puppet Three", "puppet_one", "Puppet Two"]);
        assert!(list.rejected.is_empty());
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        let list = parse_puppets("\n  # batch one\nalpha\n\n   \r\nbeta  \n");
        assert_eq!(list.nations.len(), 2);
        assert_eq!(list.nations[1].as_str(), "beta");
        assert!(list.rejected.is_empty());
    }

    #[test]
    fn test_parse_dedupes_canonical() {
        let list = parse_puppets("Que Puppet\nque_puppet\nQUE PUPPET\n");
        assert_eq!(list.nations.len(), 1);
        assert_eq!(list.rejected.len(), 2);
        assert_eq!(list.rejected[0].line, 2);
        assert!(list.rejected[0].reason.contains("duplicate"));
    }

    #[test]
    fn test_parse_rejects_invalid_names() {
        let list = parse_puppets("good one\nbad/name\n");
        assert_eq!(list.nations.len(), 1);
        assert_eq!(list.rejected, vec![RejectedLine {
            line: 2,
            reason: "Invalid nation name 'bad/name': contains '/'".to_string(),
        }]);
    }

    #[test]
    fn test_load_puppets_from_file() {
        let path = temp_path("que.txt");
        std::fs::write(&path, "alpha\nbeta\n").unwrap();
        let list = load_puppets(&path).unwrap();
        assert_eq!(list.nations.len(), 2);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_puppets_missing_file() {
        assert!(load_puppets(&temp_path("absent.txt")).is_err());
    }

    #[test]
    fn test_save_page() {
        let path = temp_path("response.html");
        save_page("<html>ok</html>", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html>ok</html>");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_save_report() {
        let path = temp_path("report.json");
        let report = RunReport::new();
        save_report(&report, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["run_id"], report.run_id.to_string());
        assert!(json["puppets"].as_array().unwrap().is_empty());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_log_file_truncated_each_run() {
        use std::io::Write;

        let path = temp_path("que.log");
        std::fs::write(&path, "previous run\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "this run").unwrap();
        drop(file);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "this run\n");
        std::fs::remove_file(&path).unwrap();
    }
}
