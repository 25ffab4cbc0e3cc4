use anyhow::Result;
use serde_yaml::{Mapping, Value};

use crate::model::{
    EditionConfig, EditionDocument, LevelSpec, StructureBody, StructureDocument, TopicAssignment,
    TopicsDocument, WorkConfig, WorkDocument,
};
use crate::structure::StructureNode;
use crate::topics::TopicIndex;
use crate::util::{slugify, title_case};

use super::hierarchy::TreeItem;

const PLACEHOLDER_TITLE: &str = "(Untitled Section)";

/// Conventional level names per hierarchy depth, outermost first. The first
/// option of each depth is the batch-mode default.
const COMMON_LEVEL_NAMES: &[&[(&str, &str)]] = &[
    &[
        ("part", "Part"),
        ("book", "Book"),
        ("volume", "Volume"),
        ("treatise", "Treatise"),
        ("section", "Section"),
    ],
    &[
        ("chapter", "Chapter"),
        ("question", "Question"),
        ("article", "Article"),
        ("section", "Section"),
        ("lecture", "Lecture"),
        ("sermon", "Sermon"),
        ("disputation", "Disputation"),
        ("locus", "Locus"),
    ],
    &[
        ("article", "Article"),
        ("section", "Section"),
        ("paragraph", "Paragraph"),
        ("point", "Point"),
    ],
    &[
        ("sub-section", "Sub-section"),
        ("point", "Point"),
        ("paragraph", "Paragraph"),
    ],
];

fn default_level(depth: usize) -> LevelSpec {
    let options = COMMON_LEVEL_NAMES
        .get(depth)
        .copied()
        .unwrap_or(COMMON_LEVEL_NAMES[1]);
    let (id, label) = options[0];
    LevelSpec::english(id, depth as i64 + 1, label)
}

/// Parse a comma-separated `--levels` value like `book,chapter`.
pub fn parse_level_names(levels_arg: &str) -> Result<Vec<LevelSpec>> {
    let mut levels = Vec::new();
    for name in levels_arg.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let ordinal = levels.len() as i64 + 1;
        levels.push(LevelSpec::english(&slugify(name)?, ordinal, &title_case(name)));
    }
    Ok(levels)
}

/// Resolve the level names for a detected structure: explicit names from the
/// CLI padded or trimmed to the detected depth, otherwise per-depth defaults.
pub fn resolve_levels(levels_arg: Option<&str>, num_levels: usize) -> Result<Vec<LevelSpec>> {
    let mut levels = match levels_arg {
        Some(arg) => parse_level_names(arg)?,
        None => Vec::new(),
    };
    while levels.len() < num_levels {
        levels.push(default_level(levels.len()));
    }
    levels.truncate(num_levels);
    for (index, level) in levels.iter_mut().enumerate() {
        level.ordinal = index as i64 + 1;
    }
    Ok(levels)
}

/// Assign stable node ids across the tree and build the structure document.
///
/// Roots get `<workid-sans-dashes>_<n>`, children `..._<n>_<m>`, ordinals
/// 1-based in document order. Ids are recorded on the tree items so the
/// title, link and topic documents reference the same nodes.
pub fn generate_structure(
    work_id: &str,
    levels: &[LevelSpec],
    tree: &mut [TreeItem],
) -> StructureDocument {
    let id_base = work_id.replace('-', "");
    let mut nodes = Vec::<StructureNode>::new();

    if levels.len() == 1 {
        for (index, item) in tree.iter_mut().enumerate() {
            let ordinal = index as i64 + 1;
            item.node_id = format!("{id_base}_{ordinal}");
            nodes.push(StructureNode {
                id: item.node_id.clone(),
                level: levels[0].id.clone(),
                parent: None,
                ordinal,
            });
        }
    } else {
        for (parent_index, item) in tree.iter_mut().enumerate() {
            let parent_ordinal = parent_index as i64 + 1;
            item.node_id = format!("{id_base}_{parent_ordinal}");
            nodes.push(StructureNode {
                id: item.node_id.clone(),
                level: levels[0].id.clone(),
                parent: None,
                ordinal: parent_ordinal,
            });

            for (child_index, child) in item.children.iter_mut().enumerate() {
                let child_ordinal = child_index as i64 + 1;
                child.node_id = format!("{id_base}_{parent_ordinal}_{child_ordinal}");
                nodes.push(StructureNode {
                    id: child.node_id.clone(),
                    level: levels[1].id.clone(),
                    parent: Some(item.node_id.clone()),
                    ordinal: child_ordinal,
                });
            }
        }
    }

    StructureDocument {
        work: work_id.to_string(),
        structure: StructureBody {
            levels: levels.to_vec(),
            nodes,
        },
    }
}

/// Titles document: one `<level>_titles` table per level, keyed by language
/// then node id, in document order.
pub fn generate_titles(work_id: &str, levels: &[LevelSpec], tree: &[TreeItem]) -> Value {
    let mut document = Mapping::new();
    document.insert(
        Value::from("work"),
        Value::from(work_id),
    );

    if levels.len() == 1 {
        let mut titles = Mapping::new();
        for item in tree {
            if !item.node_id.is_empty() && !item.section.title.is_empty() {
                titles.insert(
                    Value::from(item.node_id.as_str()),
                    Value::from(item.section.title.as_str()),
                );
            }
        }
        document.insert(
            Value::from(format!("{}_titles", levels[0].id)),
            english_table(titles),
        );
        return Value::Mapping(document);
    }

    let mut parent_titles = Mapping::new();
    for item in tree {
        if !item.node_id.is_empty()
            && !item.section.title.is_empty()
            && item.section.title != PLACEHOLDER_TITLE
        {
            parent_titles.insert(
                Value::from(item.node_id.as_str()),
                Value::from(item.section.title.as_str()),
            );
        }
    }
    document.insert(
        Value::from(format!("{}_titles", levels[0].id)),
        english_table(parent_titles),
    );

    let mut child_titles = Mapping::new();
    for item in tree {
        for child in &item.children {
            if !child.node_id.is_empty() && !child.section.title.is_empty() {
                child_titles.insert(
                    Value::from(child.node_id.as_str()),
                    Value::from(child.section.title.as_str()),
                );
            }
        }
    }
    document.insert(
        Value::from(format!("{}_titles", levels[1].id)),
        english_table(child_titles),
    );

    Value::Mapping(document)
}

fn english_table(titles: Mapping) -> Value {
    let mut by_language = Mapping::new();
    by_language.insert(Value::from("en"), Value::Mapping(titles));
    Value::Mapping(by_language)
}

/// Links document: node id to URL under the source site, preorder.
pub fn generate_links(work_id: &str, edition: &EditionConfig, tree: &[TreeItem]) -> Value {
    let mut nodes = Mapping::new();
    for item in tree {
        if !item.node_id.is_empty() && !item.section.url.is_empty() {
            nodes.insert(
                Value::from(item.node_id.as_str()),
                Value::from(item.section.url.as_str()),
            );
        }
        for child in &item.children {
            if !child.node_id.is_empty() && !child.section.url.is_empty() {
                nodes.insert(
                    Value::from(child.node_id.as_str()),
                    Value::from(child.section.url.as_str()),
                );
            }
        }
    }

    let mut site = Mapping::new();
    site.insert(Value::from("edition"), Value::from(edition.edition_id.as_str()));
    site.insert(Value::from("url_base"), Value::from(edition.url_base.as_str()));
    site.insert(Value::from("nodes"), Value::Mapping(nodes));

    let mut sites = Mapping::new();
    sites.insert(Value::from(edition.site_name.as_str()), Value::Mapping(site));

    let mut document = Mapping::new();
    document.insert(Value::from("work"), Value::from(work_id));
    document.insert(Value::from("sites"), Value::Mapping(sites));
    Value::Mapping(document)
}

/// Topic assignments for every node with keyword evidence. Roots are only
/// classified when they carry body content of their own; an empty result is
/// no assignment, so such sections are absent rather than empty.
pub fn generate_topics(work_id: &str, tree: &[TreeItem], index: &TopicIndex) -> TopicsDocument {
    let mut assignments = Vec::<TopicAssignment>::new();

    let mut assign = |item: &TreeItem| {
        if item.node_id.is_empty() {
            return;
        }
        let topics = index.classify(&item.section.title, &item.section.content);
        if !topics.is_empty() {
            assignments.push(TopicAssignment {
                section_id: item.node_id.clone(),
                topics,
            });
        }
    };

    for item in tree {
        if !item.section.content.is_empty() {
            assign(item);
        }
        for child in &item.children {
            assign(child);
        }
    }

    TopicsDocument {
        work: work_id.to_string(),
        assignments,
    }
}

pub fn generate_work(
    work: &WorkConfig,
    author_id: &str,
    edition: &EditionConfig,
) -> WorkDocument {
    let editions = if edition.edition_id.is_empty() {
        Vec::new()
    } else {
        vec![EditionDocument {
            id: edition.edition_id.clone(),
            title: work.title.clone(),
            lang: edition.edition_lang.clone(),
            translator: if edition.translator.is_empty() {
                None
            } else {
                Some(edition.translator.clone())
            },
            year: edition.edition_year,
        }]
    };

    WorkDocument {
        id: work.id.clone(),
        title: work.title.clone(),
        short_title: work.short_title.clone(),
        author: author_id.to_string(),
        year: work.year,
        original_lang: work.original_lang.clone(),
        editions,
    }
}
