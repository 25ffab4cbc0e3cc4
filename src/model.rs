use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::structure::StructureNode;

/// A flat section produced by structure detection, before hierarchy
/// organization. `url` is empty for headings on a single-page work; `content`
/// is empty when the body fetch was skipped or failed.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    pub url: String,
    pub level: i64,
    pub content: String,
}

/// A named hierarchy level, e.g. `{id: "chapter", ordinal: 2, label: {en:
/// "Chapter"}}`. `ordinal` is the 1-based depth, outermost first.
#[derive(Debug, Clone, Serialize)]
pub struct LevelSpec {
    pub id: String,
    pub ordinal: i64,
    pub label: BTreeMap<String, String>,
}

impl LevelSpec {
    pub fn english(id: &str, ordinal: i64, label: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert("en".to_string(), label.to_string());
        Self {
            id: id.to_string(),
            ordinal,
            label: map,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureDocument {
    pub work: String,
    pub structure: StructureBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureBody {
    pub levels: Vec<LevelSpec>,
    pub nodes: Vec<StructureNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicsDocument {
    pub work: String,
    pub assignments: Vec<TopicAssignment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicAssignment {
    pub section_id: String,
    pub topics: Vec<String>,
}

/// Resolved work metadata, collected from CLI flags before the pipeline runs.
#[derive(Debug, Clone)]
pub struct WorkConfig {
    pub id: String,
    pub title: String,
    pub short_title: String,
    pub year: Option<i64>,
    pub original_lang: String,
}

/// Resolved edition metadata for the online text being parsed.
#[derive(Debug, Clone)]
pub struct EditionConfig {
    pub site_name: String,
    pub edition_id: String,
    pub edition_lang: String,
    pub translator: String,
    pub edition_year: Option<i64>,
    pub url_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: String,
    pub name: BTreeMap<String, String>,
    pub short_name: String,
    #[serde(default)]
    pub tradition: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorsDocument {
    #[serde(default)]
    pub authors: Vec<AuthorRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkDocument {
    pub id: String,
    pub title: String,
    pub short_title: String,
    pub author: String,
    pub year: Option<i64>,
    pub original_lang: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editions: Vec<EditionDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditionDocument {
    pub id: String,
    pub title: String,
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub work_id: String,
    pub source_url: String,
    pub mode: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub counts: ParseCounts,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseCounts {
    pub toc_entries: usize,
    pub headings: usize,
    pub sections_total: usize,
    pub sections_fetched: usize,
    pub fetch_failures: usize,
    pub level_count: usize,
    pub top_level_sections: usize,
    pub sub_sections: usize,
    pub topic_assignments: usize,
    pub files_written: usize,
}
