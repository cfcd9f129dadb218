//! Inputs produced outside the engine: analysis reports and header precedence.
//!
//! An external analysis service reviews a screenshot set and reports gaps,
//! near-duplicates and the height of a banner shared by every image. The
//! engine never interprets these issues; callers decide what to do with them
//! before handing the final image sequence over.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Kind of problem flagged between two images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    /// Content is missing between the two images.
    Gap,
    /// The two images are effectively duplicates.
    Similarity,
}

/// One flagged problem between two images of the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisIssue {
    /// What was flagged.
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// Indices of the two images involved.
    pub indices: (usize, usize),
    /// Human-readable explanation.
    pub reason: String,
}

/// Result of an external analysis pass over a screenshot set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Flagged problems, possibly empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<AnalysisIssue>,
    /// Height of a banner present on every image, 0 if none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_header_height: u32,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl AnalysisReport {
    /// Parse a report from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Analysis`] if the JSON does not match.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a report file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be read and
    /// [`crate::Error::Analysis`] if it cannot be parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Indices of the later image in every similarity pair, sorted and
    /// deduplicated. Indices outside `0..image_count` are ignored.
    #[must_use]
    pub fn similar_duplicates(&self, image_count: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .issues
            .iter()
            .filter(|issue| issue.kind == IssueKind::Similarity)
            .map(|issue| issue.indices.0.max(issue.indices.1))
            .filter(|&i| i < image_count)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Pick the header height to crop.
///
/// A positive manual selection wins, otherwise the suggested height is used.
#[must_use]
pub fn resolve_header_height(manual: Option<u32>, suggested: Option<u32>) -> u32 {
    match manual {
        Some(h) if h > 0 => h,
        _ => suggested.unwrap_or(0),
    }
}
