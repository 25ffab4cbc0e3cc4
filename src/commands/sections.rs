use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::SectionsArgs;
use crate::error::StructureError;
use crate::section_number::SectionNumber;
use crate::util::write_text_file;

/// One row of the sections CSV after header normalization.
#[derive(Debug, Clone)]
struct SectionRow {
    number: SectionNumber,
    title: String,
    url: String,
}

#[derive(Debug)]
struct SectionItem {
    number: SectionNumber,
    node_id: String,
    title: String,
    url: String,
    children: Vec<SectionItem>,
}

const REQUIRED_COLUMNS: &[&str] = &[
    "work-id",
    "section_num",
    "page_url",
    "section_title",
    "section_url",
];

pub fn run(args: SectionsArgs) -> Result<()> {
    let mut reader = csv::Reader::from_path(&args.csv_path)
        .with_context(|| format!("failed to open csv: {}", args.csv_path.display()))?;

    let headers = reader.headers().context("failed to read csv header")?;
    let columns = column_indexes(headers)?;

    let mut work_order = Vec::<String>::new();
    let mut rows_by_work = HashMap::<String, Vec<SectionRow>>::new();

    for (index, record) in reader.records().enumerate() {
        let row_number = index + 2;
        let record = record.with_context(|| format!("failed to read csv row {row_number}"))?;

        let field = |name: &'static str| -> &str {
            columns
                .get(name)
                .and_then(|&column| record.get(column))
                .unwrap_or("")
                .trim()
        };
        let required = |name: &'static str| -> Result<String> {
            let value = field(name);
            if value.is_empty() {
                return Err(StructureError::EmptyRequiredField {
                    row: row_number,
                    field: name,
                }
                .into());
            }
            Ok(value.to_string())
        };

        let work_id = required("work-id")?;
        let section_num = required("section_num")?;
        let title = required("section_title")?;

        let number = SectionNumber::parse(&section_num)
            .map_err(anyhow::Error::from)
            .with_context(|| format!("row {row_number}"))?;

        let url = row_url(field("section_url"), field("page_url"), row_number)?;

        if !rows_by_work.contains_key(&work_id) {
            work_order.push(work_id.clone());
            rows_by_work.insert(work_id.clone(), Vec::new());
        }
        if let Some(rows) = rows_by_work.get_mut(&work_id) {
            rows.push(SectionRow { number, title, url });
        }
    }

    if work_order.is_empty() {
        bail!("csv {} contains no data rows", args.csv_path.display());
    }

    for work_id in &work_order {
        let Some(rows) = rows_by_work.remove(work_id) else {
            continue;
        };
        let section_count = rows.len();

        let tree = build_tree(rows)
            .map_err(anyhow::Error::from)
            .with_context(|| format!("invalid section hierarchy for work {work_id}"))?;

        let snippet = render_snippet(&tree);
        let out_path = args.works_dir.join(format!("{work_id}{}", args.suffix));
        write_text_file(&out_path, &snippet)?;

        info!(
            work = %work_id,
            sections = section_count,
            path = %out_path.display(),
            "wrote sections snippet"
        );
    }

    info!(works = work_order.len(), "sections conversion completed");
    Ok(())
}

/// Map normalized header names to column indexes. Headers are matched
/// case-insensitively with spaces and underscores collapsed to hyphens, so
/// `Work ID`, `work_id` and `work-id` all name the same column.
fn column_indexes(headers: &csv::StringRecord) -> Result<HashMap<&'static str, usize>> {
    let mut columns = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        let normalized = normalize_header(header);
        for column in REQUIRED_COLUMNS {
            if normalized == normalize_header(column) && !columns.contains_key(column) {
                columns.insert(*column, index);
            }
        }
    }

    for column in REQUIRED_COLUMNS {
        if !columns.contains_key(column) {
            bail!("csv is missing required column `{column}`");
        }
    }
    Ok(columns)
}

/// A row's URL is its own `section_url` when present, else the shared
/// `page_url`; a row with neither is unusable.
fn row_url(section_url: &str, page_url: &str, row_number: usize) -> Result<String> {
    if !section_url.is_empty() {
        return Ok(section_url.to_string());
    }
    if !page_url.is_empty() {
        return Ok(page_url.to_string());
    }
    Err(StructureError::EmptyRequiredField {
        row: row_number,
        field: "section_url",
    }
    .into())
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .replace([' ', '_'], "-")
}

/// Assemble the rows of one work into a tree, sorted by section number.
///
/// Sorting numerically puts every parent before its children, so a child
/// whose parent never appears in the data is detected immediately.
fn build_tree(mut rows: Vec<SectionRow>) -> Result<Vec<SectionItem>, StructureError> {
    rows.sort_by(|a, b| a.number.cmp(&b.number));

    let mut tree = Vec::<SectionItem>::new();
    for row in rows {
        let node_id = row.number.node_id();
        let item = SectionItem {
            number: row.number,
            node_id,
            title: row.title,
            url: row.url,
            children: Vec::new(),
        };

        match item.number.parent() {
            None => {
                if tree.iter().any(|root| root.number == item.number) {
                    return Err(StructureError::DuplicateNodeId(item.node_id));
                }
                tree.push(item);
            }
            Some(parent_number) => {
                let Some(parent) = find_item(&mut tree, &parent_number) else {
                    return Err(StructureError::OrphanedSection {
                        section_num: item.number.to_string(),
                        expected_parent: parent_number.to_string(),
                    });
                };
                if parent.children.iter().any(|child| child.number == item.number) {
                    return Err(StructureError::DuplicateNodeId(item.node_id));
                }
                parent.children.push(item);
            }
        }
    }
    Ok(tree)
}

fn find_item<'a>(
    tree: &'a mut Vec<SectionItem>,
    number: &SectionNumber,
) -> Option<&'a mut SectionItem> {
    for item in tree {
        if item.number == *number {
            return Some(item);
        }
        if let Some(found) = find_item(&mut item.children, number) {
            return Some(found);
        }
    }
    None
}

/// Render the two YAML blocks a work's front-matter needs: the nested
/// `sections` outline and the flat preorder `section_urls` table.
fn render_snippet(tree: &[SectionItem]) -> String {
    let mut lines = vec!["sections:".to_string()];
    for item in tree {
        render_section(item, 2, &mut lines);
    }

    lines.push("section_urls:".to_string());
    for item in tree {
        render_urls(item, &mut lines);
    }

    lines.join("\n") + "\n"
}

fn render_section(item: &SectionItem, indent: usize, lines: &mut Vec<String>) {
    let pad = " ".repeat(indent);
    lines.push(format!(
        "{pad}- {}: {}",
        item.node_id,
        quote(&item.title)
    ));
    if !item.children.is_empty() {
        lines.push(format!("{pad}  sections:"));
        for child in &item.children {
            render_section(child, indent + 4, lines);
        }
    }
}

fn render_urls(item: &SectionItem, lines: &mut Vec<String>) {
    lines.push(format!("  - {}: {}", item.node_id, quote(&item.url)));
    for child in &item.children {
        render_urls(child, lines);
    }
}

// JSON string quoting is valid YAML double-quoting.
fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(number: &str, title: &str, url: &str) -> SectionRow {
        SectionRow {
            number: SectionNumber::parse(number).unwrap(),
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn header_matching_accepts_common_spellings() {
        let headers = csv::StringRecord::from(vec![
            "Work ID",
            "Section Num",
            "page_url",
            "SECTION_TITLE",
            "section-url",
        ]);
        let columns = column_indexes(&headers).unwrap();
        assert_eq!(columns["work-id"], 0);
        assert_eq!(columns["section_num"], 1);
        assert_eq!(columns["section_title"], 3);
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let headers = csv::StringRecord::from(vec!["work-id", "section_num", "page_url"]);
        let err = column_indexes(&headers).unwrap_err();
        assert!(err.to_string().contains("section_title"));
    }

    #[test]
    fn tree_building_sorts_numerically_before_nesting() {
        // 1.10 must sort after 1.9, not between 1.1 and 1.2.
        let rows = vec![
            row("1.10", "Tenth", "https://x/1.10"),
            row("1", "Root", "https://x/1"),
            row("1.9", "Ninth", "https://x/1.9"),
            row("1.2", "Second", "https://x/1.2"),
        ];
        let tree = build_tree(rows).unwrap();

        assert_eq!(tree.len(), 1);
        let children = tree[0]
            .children
            .iter()
            .map(|child| child.title.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(children, vec!["Second", "Ninth", "Tenth"]);
    }

    #[test]
    fn duplicate_section_numbers_are_rejected() {
        let rows = vec![
            row("1", "Root", "https://x/1"),
            row("1.1", "First", "https://x/1.1"),
            row("1.1", "Again", "https://x/1.1b"),
        ];
        assert_eq!(
            build_tree(rows).unwrap_err(),
            StructureError::DuplicateNodeId("s1_1".to_string())
        );
    }

    #[test]
    fn child_without_its_parent_is_an_orphan() {
        let rows = vec![row("1", "Root", "https://x/1"), row("2.1", "Lost", "https://x/2.1")];
        assert_eq!(
            build_tree(rows).unwrap_err(),
            StructureError::OrphanedSection {
                section_num: "2.1".to_string(),
                expected_parent: "2".to_string(),
            }
        );
    }

    #[test]
    fn snippet_renders_nested_sections_and_preorder_urls() {
        let rows = vec![
            row("1", "Of God", "https://x/1"),
            row("1.1", "Of the \"Divine\" Essence", "https://x/1.1"),
            row("1.2", "Of the Trinity", "https://x/1.2"),
            row("2", "Of Creation", "https://x/2"),
        ];
        let tree = build_tree(rows).unwrap();
        let snippet = render_snippet(&tree);

        assert_eq!(
            snippet,
            "sections:\n\
             \x20\x20- s1: \"Of God\"\n\
             \x20\x20\x20\x20sections:\n\
             \x20\x20\x20\x20\x20\x20- s1_1: \"Of the \\\"Divine\\\" Essence\"\n\
             \x20\x20\x20\x20\x20\x20- s1_2: \"Of the Trinity\"\n\
             \x20\x20- s2: \"Of Creation\"\n\
             section_urls:\n\
             \x20\x20- s1: \"https://x/1\"\n\
             \x20\x20- s1_1: \"https://x/1.1\"\n\
             \x20\x20- s1_2: \"https://x/1.2\"\n\
             \x20\x20- s2: \"https://x/2\"\n"
        );
    }

    #[test]
    fn row_url_prefers_section_url_and_falls_back_to_page_url() {
        assert_eq!(
            row_url("https://x/1.1", "https://x/toc", 2).unwrap(),
            "https://x/1.1"
        );
        assert_eq!(row_url("", "https://x/toc", 2).unwrap(), "https://x/toc");

        let err = row_url("", "", 7).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StructureError>(),
            Some(&StructureError::EmptyRequiredField {
                row: 7,
                field: "section_url",
            })
        );
    }
}
