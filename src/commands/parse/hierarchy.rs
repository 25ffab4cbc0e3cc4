use crate::model::Section;

/// A detected section with its organized children. `node_id` stays empty
/// until structure generation assigns stable ids.
#[derive(Debug, Clone)]
pub struct TreeItem {
    pub section: Section,
    pub node_id: String,
    pub children: Vec<TreeItem>,
}

impl TreeItem {
    fn leaf(section: Section) -> Self {
        Self {
            section,
            node_id: String::new(),
            children: Vec::new(),
        }
    }
}

/// Group a flat, leveled section sequence into a two-level tree.
///
/// Total by construction: every input section lands in the output exactly
/// once, either as a root or as a child of the most recently started root.
/// An orphan appearing before any root gets a synthesized placeholder parent.
/// Distinct level values beyond the second are not further subdivided; deeper
/// sections flatten to direct children of the nearest preceding root.
pub fn organize_hierarchy(sections: Vec<Section>) -> (Vec<i64>, Vec<TreeItem>) {
    let mut level_values = sections
        .iter()
        .map(|section| section.level)
        .collect::<Vec<i64>>();
    level_values.sort_unstable();
    level_values.dedup();

    if level_values.len() == 1 {
        let tree = sections.into_iter().map(TreeItem::leaf).collect();
        return (level_values, tree);
    }

    let top_level = level_values[0];
    let mut tree = Vec::<TreeItem>::new();

    for section in sections {
        if section.level == top_level {
            tree.push(TreeItem::leaf(section));
            continue;
        }

        if tree.is_empty() {
            tree.push(TreeItem::leaf(Section {
                title: "(Untitled Section)".to_string(),
                url: String::new(),
                level: top_level,
                content: String::new(),
            }));
        }

        if let Some(current_parent) = tree.last_mut() {
            current_parent.children.push(TreeItem::leaf(section));
        }
    }

    (level_values, tree)
}
