use thiserror::Error;

/// Fatal structural problems in imported or detected hierarchies.
///
/// Any of these aborts the work being processed: once ordering or parentage
/// is untrustworthy, downstream output would be silently wrong.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("malformed section number `{number}`: {reason}")]
    MalformedSectionNumber { number: String, reason: String },

    #[error("duplicate node id `{0}`")]
    DuplicateNodeId(String),

    #[error("node `{node_id}` references missing parent `{parent_id}`")]
    UnresolvedParent { node_id: String, parent_id: String },

    #[error("missing parent for section {section_num}: expected parent {expected_parent}")]
    OrphanedSection {
        section_num: String,
        expected_parent: String,
    },

    #[error("row {row}: required field `{field}` is empty")]
    EmptyRequiredField { row: usize, field: &'static str },
}
