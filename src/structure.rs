use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::StructureError;
use crate::section_number::SectionNumber;

/// One entry in a work's structure document. `parent` is a non-owning
/// reference by id, resolved against the same node set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureNode {
    pub id: String,
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub ordinal: i64,
}

/// Validate the invariants every node set must satisfy before emission:
/// unique ids, resolvable parents, and for numeral-derived ids a parent path
/// exactly one component shallower.
pub fn validate_nodes(nodes: &[StructureNode]) -> Result<(), StructureError> {
    let mut seen_ids = HashSet::<&str>::new();
    for node in nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(StructureError::DuplicateNodeId(node.id.clone()));
        }
    }

    for node in nodes {
        let Some(parent_id) = node.parent.as_deref() else {
            continue;
        };
        if !seen_ids.contains(parent_id) {
            return Err(StructureError::UnresolvedParent {
                node_id: node.id.clone(),
                parent_id: parent_id.to_string(),
            });
        }
    }

    // Every parent id resolving is not enough: a cyclic parent chain never
    // reaches a root, so its nodes would vanish from the preorder and every
    // document emitted from it. Treat any node preorder cannot reach as a
    // hard error.
    let reachable = preorder(nodes)
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<&str>>();
    if reachable.len() != nodes.len() {
        for node in nodes {
            if !reachable.contains(node.id.as_str()) {
                return Err(StructureError::OrphanedSection {
                    section_num: node.id.clone(),
                    expected_parent: node.parent.clone().unwrap_or_default(),
                });
            }
        }
    }

    validate_numeral_parent_paths(nodes)
}

/// For node ids that are dotted numerals (`1.2.3`), the declared parent must
/// be the numeral one level shallower: `1.2`, never `1`.
fn validate_numeral_parent_paths(nodes: &[StructureNode]) -> Result<(), StructureError> {
    for node in nodes {
        let Ok(number) = SectionNumber::parse(&node.id) else {
            continue;
        };
        let Some(expected_parent) = number.parent() else {
            continue;
        };

        let declared = node.parent.as_deref().unwrap_or("");
        if declared != expected_parent.to_string() {
            return Err(StructureError::OrphanedSection {
                section_num: number.to_string(),
                expected_parent: expected_parent.to_string(),
            });
        }
    }
    Ok(())
}

/// Stable preorder over a validated node set: each root in input order,
/// immediately followed by its entire subtree, children in input order.
pub fn preorder(nodes: &[StructureNode]) -> Vec<&StructureNode> {
    let mut children_of = HashMap::<&str, Vec<&StructureNode>>::new();
    let mut roots = Vec::<&StructureNode>::new();

    for node in nodes {
        match node.parent.as_deref() {
            Some(parent_id) => children_of.entry(parent_id).or_default().push(node),
            None => roots.push(node),
        }
    }

    let mut ordered = Vec::with_capacity(nodes.len());
    for root in roots {
        push_subtree(root, &children_of, &mut ordered);
    }
    ordered
}

fn push_subtree<'a>(
    node: &'a StructureNode,
    children_of: &HashMap<&str, Vec<&'a StructureNode>>,
    ordered: &mut Vec<&'a StructureNode>,
) {
    ordered.push(node);
    if let Some(children) = children_of.get(node.id.as_str()) {
        for child in children {
            push_subtree(child, children_of, ordered);
        }
    }
}

/// Render the nested textual tree view: one node per line, indentation
/// encoding depth, the node's title (when known) after its id.
pub fn render_tree_view(nodes: &[StructureNode], titles: &HashMap<String, String>) -> String {
    let mut depth_of = HashMap::<&str, usize>::new();
    let mut lines = Vec::<String>::new();

    for node in preorder(nodes) {
        let depth = node
            .parent
            .as_deref()
            .and_then(|parent_id| depth_of.get(parent_id))
            .map(|parent_depth| parent_depth + 1)
            .unwrap_or(0);
        depth_of.insert(node.id.as_str(), depth);

        let indent = "  ".repeat(depth);
        match titles.get(&node.id) {
            Some(title) => lines.push(format!("{indent}{} {}", node.id, title)),
            None => lines.push(format!("{indent}{}", node.id)),
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, level: &str, parent: Option<&str>, ordinal: i64) -> StructureNode {
        StructureNode {
            id: id.to_string(),
            level: level.to_string(),
            parent: parent.map(ToOwned::to_owned),
            ordinal,
        }
    }

    #[test]
    fn accepts_a_well_formed_node_set() {
        let nodes = vec![
            node("1", "chapter", None, 1),
            node("1.1", "section", Some("1"), 1),
            node("1.2", "section", Some("1"), 2),
        ];
        assert!(validate_nodes(&nodes).is_ok());
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let nodes = vec![
            node("work_1", "chapter", None, 1),
            node("work_1", "chapter", None, 2),
        ];
        assert_eq!(
            validate_nodes(&nodes).unwrap_err(),
            StructureError::DuplicateNodeId("work_1".to_string())
        );
    }

    #[test]
    fn rejects_unresolved_parent_references() {
        let nodes = vec![node("work_2_1", "section", Some("work_2"), 1)];
        assert_eq!(
            validate_nodes(&nodes).unwrap_err(),
            StructureError::UnresolvedParent {
                node_id: "work_2_1".to_string(),
                parent_id: "work_2".to_string(),
            }
        );
    }

    #[test]
    fn rejects_numeral_parent_skipping_a_level() {
        let nodes = vec![
            node("1", "part", None, 1),
            node("1.2.3", "section", Some("1"), 1),
        ];
        assert_eq!(
            validate_nodes(&nodes).unwrap_err(),
            StructureError::OrphanedSection {
                section_num: "1.2.3".to_string(),
                expected_parent: "1.2".to_string(),
            }
        );
    }

    #[test]
    fn rejects_parent_chains_no_root_can_reach() {
        // a and b resolve each other's parent ids but form a cycle, so no
        // root ever reaches them.
        let nodes = vec![
            node("root", "chapter", None, 1),
            node("a", "section", Some("b"), 1),
            node("b", "section", Some("a"), 2),
        ];
        assert_eq!(
            validate_nodes(&nodes).unwrap_err(),
            StructureError::OrphanedSection {
                section_num: "a".to_string(),
                expected_parent: "b".to_string(),
            }
        );
    }

    #[test]
    fn preorder_keeps_each_subtree_together() {
        let nodes = vec![
            node("1", "chapter", None, 1),
            node("2", "chapter", None, 2),
            node("1.1", "section", Some("1"), 1),
            node("2.1", "section", Some("2"), 1),
            node("1.2", "section", Some("1"), 2),
        ];
        let ids = preorder(&nodes)
            .iter()
            .map(|node| node.id.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(ids, vec!["1", "1.1", "1.2", "2", "2.1"]);
    }

    #[test]
    fn round_trip_through_parent_pairs_rebuilds_the_same_tree() {
        let nodes = vec![
            node("1", "chapter", None, 1),
            node("1.1", "section", Some("1"), 1),
            node("1.2", "section", Some("1"), 2),
            node("2", "chapter", None, 2),
        ];
        validate_nodes(&nodes).unwrap();

        // Flatten to (id -> parent) pairs and rebuild.
        let pairs = preorder(&nodes)
            .iter()
            .map(|node| (node.id.clone(), node.parent.clone(), node.ordinal))
            .collect::<Vec<(String, Option<String>, i64)>>();
        let rebuilt = pairs
            .iter()
            .map(|(id, parent, ordinal)| StructureNode {
                id: id.clone(),
                level: String::new(),
                parent: parent.clone(),
                ordinal: *ordinal,
            })
            .collect::<Vec<StructureNode>>();

        let original_edges = preorder(&nodes)
            .iter()
            .map(|node| (node.id.clone(), node.parent.clone(), node.ordinal))
            .collect::<Vec<(String, Option<String>, i64)>>();
        let rebuilt_edges = preorder(&rebuilt)
            .iter()
            .map(|node| (node.id.clone(), node.parent.clone(), node.ordinal))
            .collect::<Vec<(String, Option<String>, i64)>>();
        assert_eq!(original_edges, rebuilt_edges);
    }

    #[test]
    fn tree_view_indents_children_under_parents() {
        let nodes = vec![
            node("1", "chapter", None, 1),
            node("1.1", "section", Some("1"), 1),
        ];
        let mut titles = HashMap::new();
        titles.insert("1".to_string(), "Of God".to_string());
        titles.insert("1.1".to_string(), "Of the Divine Essence".to_string());

        let view = render_tree_view(&nodes, &titles);
        assert_eq!(view, "1 Of God\n  1.1 Of the Divine Essence");
    }
}
