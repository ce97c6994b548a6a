//! Conformity classifier
//!
//! Reads the IN conclusions of the evaluator output and turns them into one
//! verdict per (jurisdiction, article). OUT and undecided conclusions are
//! ignored.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

lazy_static! {
    static ref TOKEN_PATTERN: Regex = Regex::new(
        r"(?x)
        (?P<section>\b(?:IN|OUT|UND)\b)
        |
        (?P<neg>'-'\(\s*|-\s*)?
        (?P<kind>\bconformity|\bpartialConformity|\bpartial_conformity)
        \(\s*'?(?P<j>[^,()'\s]+)'?\s*,\s*'?(?P<a>[^,()'\s]+)'?\s*\)"
    )
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConformityVerdict {
    Full,
    Partial,
    None,
    /// Nothing concluded, or the evaluator output was inconsistent or missing.
    Unknown,
}

impl fmt::Display for ConformityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConformityVerdict::Full => "full conformity",
            ConformityVerdict::Partial => "partial conformity",
            ConformityVerdict::None => "no conformity",
            ConformityVerdict::Unknown => "conformity unknown",
        };
        f.write_str(text)
    }
}

/// An IN conclusion found in evaluator output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Conclusion {
    pub jurisdiction: String,
    pub article: String,
    pub verdict: ConformityVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConformityEntry {
    pub jurisdiction: String,
    pub article: String,
    pub verdict: ConformityVerdict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConformityReport {
    pub entries: Vec<ConformityEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl ConformityReport {
    /// Every expected pair as Unknown, used when the evaluator failed.
    pub fn unknown(expected: &BTreeSet<(String, String)>, warning: impl Into<String>) -> Self {
        Self {
            entries: expected
                .iter()
                .map(|(j, a)| ConformityEntry {
                    jurisdiction: j.clone(),
                    article: a.clone(),
                    verdict: ConformityVerdict::Unknown,
                })
                .collect(),
            warnings: vec![warning.into()],
        }
    }

    pub fn verdict(&self, jurisdiction: &str, article: &str) -> Option<ConformityVerdict> {
        self.entries
            .iter()
            .find(|e| e.jurisdiction == jurisdiction && e.article == article)
            .map(|e| e.verdict)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per pair, for prompts.
    pub fn render_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} {}: {}", e.jurisdiction, e.article, e.verdict))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// IN conclusions in order of appearance.
pub fn in_conclusions(output: &str) -> Vec<Conclusion> {
    let mut section: Option<&str> = None;
    let mut found = Vec::new();

    for caps in TOKEN_PATTERN.captures_iter(output) {
        if let Some(marker) = caps.name("section") {
            section = Some(marker.as_str());
            continue;
        }
        if section != Some("IN") {
            continue;
        }
        let (Some(kind), Some(j), Some(a)) = (caps.name("kind"), caps.name("j"), caps.name("a")) else {
            continue;
        };
        let verdict = match (kind.as_str(), caps.name("neg").is_some()) {
            ("conformity", false) => ConformityVerdict::Full,
            ("conformity", true) => ConformityVerdict::None,
            (_, false) => ConformityVerdict::Partial,
            // A negated partial conclusion says nothing about the level.
            (_, true) => continue,
        };
        found.push(Conclusion {
            jurisdiction: j.as_str().to_string(),
            article: a.as_str().to_string(),
            verdict,
        });
    }
    found
}

/// Classify evaluator output. `expected` pairs are always reported, as
/// Unknown when nothing was concluded about them.
pub fn classify(output: &str, expected: &BTreeSet<(String, String)>) -> ConformityReport {
    let mut concluded: BTreeMap<(String, String), BTreeSet<ConformityVerdict>> = expected
        .iter()
        .map(|pair| (pair.clone(), BTreeSet::new()))
        .collect();
    for conclusion in in_conclusions(output) {
        concluded
            .entry((conclusion.jurisdiction, conclusion.article))
            .or_default()
            .insert(conclusion.verdict);
    }

    let mut report = ConformityReport::default();
    for ((jurisdiction, article), verdicts) in concluded {
        let verdict = resolve(&verdicts).unwrap_or_else(|| {
            let message = format!(
                "inconsistent conformity conclusions for {} {}: {:?}",
                jurisdiction, article, verdicts
            );
            warn!("{}", message);
            report.warnings.push(message);
            ConformityVerdict::Unknown
        });
        report.entries.push(ConformityEntry {
            jurisdiction,
            article,
            verdict,
        });
    }
    report
}

/// `None` for an inconsistent combination.
///
/// The negated conclusion holds whenever no national rule has the reference
/// premises, so it accompanies every partial conclusion; partial wins.
fn resolve(verdicts: &BTreeSet<ConformityVerdict>) -> Option<ConformityVerdict> {
    let has = |v: ConformityVerdict| verdicts.contains(&v);
    match (
        has(ConformityVerdict::Full),
        has(ConformityVerdict::Partial),
        has(ConformityVerdict::None),
    ) {
        (false, false, false) => Some(ConformityVerdict::Unknown),
        (true, false, false) => Some(ConformityVerdict::Full),
        (false, true, _) => Some(ConformityVerdict::Partial),
        (false, false, true) => Some(ConformityVerdict::None),
        (true, _, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(pairs: &[(&str, &str)]) -> BTreeSet<(String, String)> {
        pairs.iter().map(|(j, a)| (j.to_string(), a.to_string())).collect()
    }

    #[test]
    fn test_reads_only_in_section() {
        let output = "IN\nconformity(pl, art2_7)\nOUT\n'-'(conformity(pl, art3))\npartialConformity(pl, art2_7)\n";
        let report = classify(output, &expected(&[("pl", "art2_7")]));
        assert_eq!(report.verdict("pl", "art2_7"), Some(ConformityVerdict::Full));
        assert_eq!(report.verdict("pl", "art3"), None);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_token_forms() {
        let conclusions = in_conclusions(
            "IN: [ -conformity(it, a1), '-'(conformity(nl, a2)), partial_conformity(bg, a3), partialConformity('pl', 'a4') ]",
        );
        let verdicts: Vec<ConformityVerdict> = conclusions.iter().map(|c| c.verdict).collect();
        assert_eq!(
            verdicts,
            vec![
                ConformityVerdict::None,
                ConformityVerdict::None,
                ConformityVerdict::Partial,
                ConformityVerdict::Partial
            ]
        );
        assert_eq!(conclusions[3].jurisdiction, "pl");
        assert_eq!(conclusions[3].article, "a4");
    }

    #[test]
    fn test_missing_conclusion_is_unknown_not_none() {
        let report = classify("IN\nOUT\nconformity(pl, art2_7)\n", &expected(&[("pl", "art2_7")]));
        assert_eq!(report.verdict("pl", "art2_7"), Some(ConformityVerdict::Unknown));
    }

    #[test]
    fn test_partial_absorbs_negation() {
        let output = "IN\npartialConformity(pl, art2_7)\n-conformity(pl, art2_7)\n";
        let report = classify(output, &expected(&[("pl", "art2_7")]));
        assert_eq!(report.verdict("pl", "art2_7"), Some(ConformityVerdict::Partial));
    }

    #[test]
    fn test_inconsistent_output_is_unknown_with_warning() {
        let output = "IN\nconformity(pl, art2_7)\n-conformity(pl, art2_7)\n";
        let report = classify(output, &expected(&[("pl", "art2_7")]));
        assert_eq!(report.verdict("pl", "art2_7"), Some(ConformityVerdict::Unknown));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_words_containing_in_are_not_sections() {
        let output = "OUT\nINFO: conformity(pl, art1)\n";
        assert!(in_conclusions(output).is_empty());
    }

    #[test]
    fn test_unknown_report_covers_expected_pairs() {
        let report = ConformityReport::unknown(&expected(&[("pl", "a1"), ("pl", "a2")]), "timeout");
        assert_eq!(report.entries.len(), 2);
        assert!(report.entries.iter().all(|e| e.verdict == ConformityVerdict::Unknown));
    }
}
