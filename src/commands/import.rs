use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::cli::ImportArgs;
use crate::error::StructureError;
use crate::structure::{StructureNode, preorder, render_tree_view, validate_nodes};
use crate::util::write_yaml_file;

/// One row of the structure CSV. A node usually spans several rows: one per
/// language for titles and one per site for links, all repeating the same
/// node definition.
#[derive(Debug, Clone, Deserialize)]
struct ImportRow {
    work_id: String,
    node_id: String,
    #[serde(default)]
    parent_id: String,
    level_id: String,
    ordinal: i64,
    #[serde(default)]
    lang: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    site: String,
    #[serde(default)]
    url: String,
}

/// Everything accumulated for one work across its CSV rows.
#[derive(Debug, Default)]
struct WorkImport {
    nodes: Vec<StructureNode>,
    level_order: Vec<String>,
    // lang -> node id -> title, insertion-ordered at both levels.
    titles: Vec<(String, Vec<(String, String)>)>,
    // site -> node id -> url.
    links: Vec<(String, Vec<(String, String)>)>,
}

pub fn run(args: ImportArgs) -> Result<()> {
    let mut reader = csv::Reader::from_path(&args.csv_path)
        .with_context(|| format!("failed to open csv: {}", args.csv_path.display()))?;

    check_required_columns(reader.headers().context("failed to read csv header")?)?;

    let mut work_order = Vec::<String>::new();
    let mut works = HashMap::<String, WorkImport>::new();

    for (index, record) in reader.deserialize::<ImportRow>().enumerate() {
        // Header is line 1; the first data row is line 2.
        let row_number = index + 2;
        let row = record.with_context(|| format!("failed to parse csv row {row_number}"))?;
        let work_id = row.work_id.trim().to_string();
        if work_id.is_empty() {
            return Err(StructureError::EmptyRequiredField {
                row: row_number,
                field: "work_id",
            }
            .into());
        }

        if !works.contains_key(&work_id) {
            work_order.push(work_id.clone());
            works.insert(work_id.clone(), WorkImport::default());
        }
        if let Some(work) = works.get_mut(&work_id) {
            absorb_row(work, &row, row_number)?;
        }
    }

    if work_order.is_empty() {
        bail!("csv {} contains no data rows", args.csv_path.display());
    }

    for work_id in &work_order {
        let Some(work) = works.get(work_id) else {
            continue;
        };
        validate_nodes(&work.nodes)
            .map_err(anyhow::Error::from)
            .with_context(|| format!("invalid structure for work {work_id}"))?;

        emit_work(&args.out_dir, work_id, work)?;

        if args.print_tree {
            let titles = english_titles(work);
            println!("{work_id}");
            println!("{}", render_tree_view(&work.nodes, &titles));
        }

        info!(
            work = %work_id,
            nodes = work.nodes.len(),
            levels = work.level_order.len(),
            "imported work"
        );
    }

    info!(works = work_order.len(), out_dir = %args.out_dir.display(), "import completed");
    Ok(())
}

const REQUIRED_COLUMNS: &[&str] = &["work_id", "node_id", "level_id", "ordinal"];

fn check_required_columns(headers: &csv::StringRecord) -> Result<()> {
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header.trim() == *column) {
            bail!("csv is missing required column `{column}`");
        }
    }
    Ok(())
}

/// Merge one row into its work. Rows may legitimately repeat a node id to
/// carry extra languages or sites; only a redefinition that disagrees on
/// level, parent or ordinal is an error.
fn absorb_row(work: &mut WorkImport, row: &ImportRow, row_number: usize) -> Result<()> {
    let node_id = row.node_id.trim();
    if node_id.is_empty() {
        return Err(StructureError::EmptyRequiredField {
            row: row_number,
            field: "node_id",
        }
        .into());
    }
    let level_id = row.level_id.trim();
    if level_id.is_empty() {
        return Err(StructureError::EmptyRequiredField {
            row: row_number,
            field: "level_id",
        }
        .into());
    }

    let parent = match row.parent_id.trim() {
        "" => None,
        parent_id => Some(parent_id.to_string()),
    };

    match work.nodes.iter().find(|node| node.id == node_id) {
        Some(existing) => {
            if existing.level != level_id
                || existing.parent != parent
                || existing.ordinal != row.ordinal
            {
                return Err(anyhow::Error::from(StructureError::DuplicateNodeId(
                    node_id.to_string(),
                )))
                .with_context(|| {
                    format!("row {row_number} redefines the node with different structure")
                });
            }
        }
        None => {
            work.nodes.push(StructureNode {
                id: node_id.to_string(),
                level: level_id.to_string(),
                parent,
                ordinal: row.ordinal,
            });
            if !work.level_order.iter().any(|level| level == level_id) {
                work.level_order.push(level_id.to_string());
            }
        }
    }

    let title = row.title.trim();
    if !title.is_empty() {
        let lang = match row.lang.trim() {
            "" => "en",
            lang => lang,
        };
        insert_pair(&mut work.titles, lang, node_id, title);
    }

    let url = row.url.trim();
    let site = row.site.trim();
    if !url.is_empty() && !site.is_empty() {
        insert_pair(&mut work.links, site, node_id, url);
    }

    Ok(())
}

fn insert_pair(groups: &mut Vec<(String, Vec<(String, String)>)>, key: &str, id: &str, value: &str) {
    if let Some((_, pairs)) = groups.iter_mut().find(|(group, _)| group == key) {
        if let Some((_, existing)) = pairs.iter_mut().find(|(node, _)| node == id) {
            *existing = value.to_string();
        } else {
            pairs.push((id.to_string(), value.to_string()));
        }
        return;
    }
    groups.push((key.to_string(), vec![(id.to_string(), value.to_string())]));
}

fn emit_work(out_dir: &Path, work_id: &str, work: &WorkImport) -> Result<()> {
    let ordered = preorder(&work.nodes)
        .into_iter()
        .cloned()
        .collect::<Vec<StructureNode>>();

    // Levels keep their first-appearance order, which for well-formed input
    // is outermost first.
    let levels = work
        .level_order
        .iter()
        .enumerate()
        .map(|(index, level_id)| {
            let mut level = Mapping::new();
            level.insert(Value::from("id"), Value::from(level_id.as_str()));
            level.insert(Value::from("ordinal"), Value::from(index as i64 + 1));
            Value::Mapping(level)
        })
        .collect::<Vec<Value>>();

    let mut structure_body = Mapping::new();
    structure_body.insert(Value::from("levels"), Value::Sequence(levels));
    structure_body.insert(
        Value::from("nodes"),
        serde_yaml::to_value(&ordered).context("failed to serialize nodes")?,
    );
    let mut structure = Mapping::new();
    structure.insert(Value::from("work"), Value::from(work_id));
    structure.insert(Value::from("structure"), Value::Mapping(structure_body));
    write_yaml_file(
        &out_dir.join("structures").join(format!("{work_id}.yaml")),
        &Value::Mapping(structure),
    )?;

    if let Some(titles) = titles_document(work_id, work, &ordered) {
        write_yaml_file(
            &out_dir.join("titles").join(format!("{work_id}.yaml")),
            &titles,
        )?;
    }

    if !work.links.is_empty() {
        let mut by_site = Mapping::new();
        for (site, pairs) in &work.links {
            let mut site_body = Mapping::new();
            site_body.insert(Value::from("nodes"), ordered_mapping(&ordered, pairs));
            by_site.insert(Value::from(site.as_str()), Value::Mapping(site_body));
        }
        let mut links = Mapping::new();
        links.insert(Value::from("work"), Value::from(work_id));
        links.insert(Value::from("sites"), Value::Mapping(by_site));
        write_yaml_file(
            &out_dir.join("links").join(format!("{work_id}.yaml")),
            &Value::Mapping(links),
        )?;
    }

    Ok(())
}

/// Titles document with one `<level>_titles` table per level, keyed by
/// language then node id in structure preorder. `None` when no row carried a
/// title.
fn titles_document(work_id: &str, work: &WorkImport, ordered: &[StructureNode]) -> Option<Value> {
    if work.titles.is_empty() {
        return None;
    }

    let mut document = Mapping::new();
    document.insert(Value::from("work"), Value::from(work_id));

    for level_id in &work.level_order {
        let mut by_lang = Mapping::new();
        for (lang, pairs) in &work.titles {
            let mut table = Mapping::new();
            for node in ordered {
                if node.level != *level_id {
                    continue;
                }
                if let Some((_, title)) = pairs.iter().find(|(id, _)| *id == node.id) {
                    table.insert(Value::from(node.id.as_str()), Value::from(title.as_str()));
                }
            }
            if !table.is_empty() {
                by_lang.insert(Value::from(lang.as_str()), Value::Mapping(table));
            }
        }
        if !by_lang.is_empty() {
            document.insert(
                Value::from(format!("{level_id}_titles")),
                Value::Mapping(by_lang),
            );
        }
    }

    Some(Value::Mapping(document))
}

/// Key the pairs by node id in structure preorder, so every emitted file
/// lists nodes in the same document order.
fn ordered_mapping(ordered: &[StructureNode], pairs: &[(String, String)]) -> Value {
    let mut mapping = Mapping::new();
    for node in ordered {
        if let Some((_, value)) = pairs.iter().find(|(id, _)| *id == node.id) {
            mapping.insert(Value::from(node.id.as_str()), Value::from(value.as_str()));
        }
    }
    Value::Mapping(mapping)
}

fn english_titles(work: &WorkImport) -> HashMap<String, String> {
    work.titles
        .iter()
        .find(|(lang, _)| lang == "en")
        .or_else(|| work.titles.first())
        .map(|(_, pairs)| pairs.iter().cloned().collect())
        .unwrap_or_default()
}
