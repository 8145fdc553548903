//! The topic catalog maps topic titles to the JSON resources produced by the
//! repository scanner. It is loaded once at startup from
//! `<data_dir>/topics.json`.

use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::RRError;

#[derive(Debug, Clone, Deserialize)]
pub struct TopicEntry {
    #[serde(rename = "JSON_file")]
    pub json_file: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    data_dir: PathBuf,
    topics: Vec<TopicEntry>,
}

impl Catalog {
    pub fn load(data_dir: &Path) -> Result<Self, RRError> {
        let path = data_dir.join("topics.json");
        let raw = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RRError::FileNotFound(path.display().to_string()),
            ErrorKind::PermissionDenied => RRError::PermissionDenied(path.display().to_string()),
            _ => RRError::IoError(e),
        })?;
        let topics: Vec<TopicEntry> = serde_json::from_str(&raw)?;
        info!("Loaded catalog with {} topics from {:?}", topics.len(), path);
        Ok(Catalog {
            data_dir: data_dir.to_path_buf(),
            topics,
        })
    }

    pub fn topics(&self) -> &[TopicEntry] {
        &self.topics
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    // Resolve a preprocessed --topic value against the catalog. An entry
    // matches on its exact resource name or on a substring of its lowercased
    // title, first match wins.
    pub fn find(&self, topic: &str) -> Option<usize> {
        self.topics
            .iter()
            .position(|t| t.json_file == topic || t.title.to_lowercase().contains(topic))
    }

    // Path of the data resource backing the given catalog entry.
    pub fn resource_path(&self, idx: usize) -> PathBuf {
        self.data_dir
            .join(format!("{}.json", self.topics[idx].json_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_catalog() -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("topics.json")).unwrap();
        write!(
            f,
            r#"[
                {{"JSON_file": "kicad", "title": "KiCad EDA", "search_terms": "kicad"}},
                {{"JSON_file": "skidl", "title": "SKiDL", "search_terms": "skidl"}}
            ]"#
        )
        .unwrap();
        let catalog = Catalog::load(dir.path()).unwrap();
        (dir, catalog)
    }

    #[test]
    fn loads_entries_in_order() {
        let (_dir, catalog) = sample_catalog();
        assert_eq!(catalog.topics().len(), 2);
        assert_eq!(catalog.topics()[0].json_file, "kicad");
        assert_eq!(catalog.topics()[1].title, "SKiDL");
    }

    #[test]
    fn finds_by_resource_name_or_title_substring() {
        let (_dir, catalog) = sample_catalog();
        assert_eq!(catalog.find("kicad"), Some(0));
        assert_eq!(catalog.find("skid"), Some(1));
        assert_eq!(catalog.find("eda"), Some(0));
        assert_eq!(catalog.find("plasma"), None);
    }

    #[test]
    fn resource_path_appends_json_suffix() {
        let (dir, catalog) = sample_catalog();
        assert_eq!(
            catalog.resource_path(1),
            dir.path().join("skidl.json")
        );
    }

    #[test]
    fn missing_catalog_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::load(&dir.path().join("nowhere")).unwrap_err();
        assert!(matches!(err, RRError::FileNotFound(_)));
    }
}
