//! Per-topic repository data: the raw records the scanner emits, the
//! preprocessing pass that turns them into display rows, and the fixed
//! display column definitions.

use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::RRError;

// Display columns, in rendering order. Column resolution walks this list, so
// its order also decides which column a partial name matches first.
pub const COLUMNS: [&str; 7] = [
    "repo",
    "description",
    "owner",
    "stars",
    "forks",
    "size",
    "pushed",
];

pub const PUSHED: usize = 6;

// Columns whose display strings hold numbers; sorting compares them as such.
pub fn is_numeric_column(idx: usize) -> bool {
    matches!(COLUMNS[idx], "stars" | "forks" | "size")
}

// One record as written by the repository scanner. Any field can be missing
// or null in older data files.
#[derive(Debug, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub stars: Option<u64>,
    #[serde(default)]
    pub forks: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub pushed: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub id: Option<u64>,
}

// One repository reduced to its display cells. The link is the target the
// repo cell points at; it is not a display column itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: [String; COLUMNS.len()],
    link: String,
}

impl Row {
    pub fn cell(&self, column: usize) -> &str {
        &self.cells[column]
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn link(&self) -> &str {
        &self.link
    }
}

// The preprocessing pass applied once per freshly loaded dataset. Blank and
// absent values become empty strings, numbers become display strings, the
// push timestamp keeps only its date part and the url is folded into the
// repo cell's link target. The bookkeeping fields (url, created, updated,
// id) are consumed here and never reach rendering.
pub fn preprocess(records: Vec<RawRecord>) -> Vec<Row> {
    records
        .into_iter()
        .map(|r| {
            let pushed = r
                .pushed
                .as_deref()
                .map(|d| d.split('T').next().unwrap_or(d).to_string())
                .unwrap_or_default();
            Row {
                cells: [
                    r.repo.unwrap_or_default(),
                    r.description.unwrap_or_default(),
                    r.owner.unwrap_or_default(),
                    r.stars.map(|v| v.to_string()).unwrap_or_default(),
                    r.forks.map(|v| v.to_string()).unwrap_or_default(),
                    r.size.map(|v| v.to_string()).unwrap_or_default(),
                    pushed,
                ],
                link: r.url.unwrap_or_default(),
            }
        })
        .collect()
}

// Load and preprocess one topic's data resource.
pub fn load(path: &Path) -> Result<Vec<Row>, RRError> {
    let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RRError::FileNotFound(path.display().to_string()),
        ErrorKind::PermissionDenied => RRError::PermissionDenied(path.display().to_string()),
        _ => RRError::IoError(e),
    })?;
    let records: Vec<RawRecord> = serde_json::from_str(&raw)?;
    debug!("Parsed {} raw records from {:?}", records.len(), path);
    let rows = preprocess(records);
    info!("Loaded {} rows from {:?}", rows.len(), path);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(json: &str) -> RawRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn null_description_becomes_empty_string() {
        let rows = preprocess(vec![record(
            r#"{"repo": "skidl", "description": null, "owner": "devbisme"}"#,
        )]);
        assert_eq!(rows[0].cell(1), "");
        assert_eq!(rows[0].cell(0), "skidl");
    }

    #[test]
    fn pushed_timestamp_keeps_only_the_date() {
        let rows = preprocess(vec![record(
            r#"{"repo": "a", "pushed": "2024-06-01T13:37:00"}"#,
        )]);
        assert_eq!(rows[0].cell(PUSHED), "2024-06-01");
    }

    #[test]
    fn url_folds_into_the_repo_link() {
        let rows = preprocess(vec![record(
            r#"{"repo": "skidl", "url": "https://github.com/devbisme/skidl",
                "created": "2016-01-01T00:00:00", "updated": "2024-01-01T00:00:00",
                "id": 42}"#,
        )]);
        let row = &rows[0];
        assert_eq!(row.link(), "https://github.com/devbisme/skidl");
        // Bookkeeping fields never show up as display cells.
        assert_eq!(row.cells().len(), COLUMNS.len());
        assert!(row.cells().iter().all(|c| c != "42"));
    }

    #[test]
    fn numbers_render_as_display_strings() {
        let rows = preprocess(vec![record(
            r#"{"repo": "a", "stars": 120, "forks": 7, "size": 2048}"#,
        )]);
        assert_eq!(rows[0].cell(3), "120");
        assert_eq!(rows[0].cell(4), "7");
        assert_eq!(rows[0].cell(5), "2048");
    }

    #[test]
    fn loads_a_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kicad.json");
        let mut f = fs::File::create(&path).unwrap();
        write!(
            f,
            r#"[{{"repo": "kicad", "description": "EDA suite", "owner": "kicad",
                 "stars": 1, "forks": 2, "size": 3,
                 "pushed": "2023-06-15T01:02:03",
                 "url": "https://github.com/kicad/kicad", "id": 1}}]"#
        )
        .unwrap();
        let rows = load(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell(PUSHED), "2023-06-15");
    }

    #[test]
    fn missing_resource_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(err, RRError::FileNotFound(_)));
    }
}
