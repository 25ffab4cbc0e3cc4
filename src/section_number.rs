use std::fmt;

use crate::error::StructureError;

/// A dotted section numeral such as `1`, `1.2` or `2.10.3`, ordered by its
/// integer components rather than by string comparison, so `1.9` sorts before
/// `1.10`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionNumber {
    components: Vec<u64>,
}

impl SectionNumber {
    /// Parse a numeral like `1.2.3`, tolerating one trailing dot (`2.1.`).
    pub fn parse(raw: &str) -> Result<Self, StructureError> {
        let trimmed = raw.trim();
        let malformed = |reason: &str| StructureError::MalformedSectionNumber {
            number: raw.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(malformed("empty numeral"));
        }

        let body = trimmed.strip_suffix('.').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(malformed("empty numeral"));
        }

        let mut components = Vec::new();
        for segment in body.split('.') {
            if segment.is_empty() {
                return Err(malformed("empty segment between dots"));
            }
            if !segment.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(malformed("non-numeric segment"));
            }
            let value = segment
                .parse::<u64>()
                .map_err(|_| malformed("segment out of range"))?;
            components.push(value);
        }

        Ok(Self { components })
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// The numeral exactly one level shallower, or `None` for a top-level
    /// section.
    pub fn parent(&self) -> Option<SectionNumber> {
        if self.components.len() <= 1 {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Stable node id derived from the numeral: `1.2.3` becomes `s1_2_3`.
    pub fn node_id(&self) -> String {
        let joined = self
            .components
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<String>>()
            .join("_");
        format!("s{}", joined)
    }
}

impl fmt::Display for SectionNumber {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .components
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<String>>()
            .join(".");
        formatter.write_str(&joined)
    }
}
