//! Fact vocabulary
//!
//! The allow-list handed to the extraction collaborator. Vocabulary files are
//! Prolog-style templates (`person_status(PersonId, suspect).`) with `%`
//! comments; the templates' name/arity pairs form the allow-list.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::logic::term::Term;
use crate::memory::facts::Fact;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    pub name: String,
    pub arity: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    sources: Vec<String>,
    signatures: BTreeSet<Signature>,
}

impl Vocabulary {
    /// Global, directive and directive/country vocabularies, in that order.
    /// Missing files are skipped.
    pub fn load(dir: &Path, directive: &str, country: &str) -> Result<Self, ConfigError> {
        let candidates: [PathBuf; 3] = [
            dir.join("facts.pl"),
            dir.join(format!("{}.pl", directive)),
            dir.join(directive).join(format!("{}.pl", country)),
        ];

        let mut sources = Vec::new();
        for path in candidates.iter() {
            if !path.exists() {
                debug!("Vocabulary file {} not present", path.display());
                continue;
            }
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            sources.push(text);
        }

        let vocabulary = Self::from_sources(sources);
        if vocabulary.is_empty() {
            warn!("No vocabulary found under {}; extraction is unrestricted", dir.display());
        }
        Ok(vocabulary)
    }

    pub fn from_sources(sources: Vec<String>) -> Self {
        let mut signatures = BTreeSet::new();
        for source in &sources {
            for line in source.lines() {
                let line = line.split('%').next().unwrap_or("").trim();
                let Some(clause) = line.strip_suffix('.') else {
                    continue;
                };
                match Term::parse(clause) {
                    Ok(term) => {
                        if let Some((name, arity)) = term.signature() {
                            signatures.insert(Signature {
                                name: name.to_string(),
                                arity,
                            });
                        }
                    }
                    Err(e) => debug!("Skipping vocabulary line '{}': {}", clause, e),
                }
            }
        }
        Self { sources, signatures }
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn signatures(&self) -> &BTreeSet<Signature> {
        &self.signatures
    }

    /// An empty vocabulary allows everything.
    pub fn allows(&self, fact: &Fact) -> bool {
        self.signatures.is_empty()
            || self.signatures.contains(&Signature {
                name: fact.functor().to_string(),
                arity: fact.arity(),
            })
    }

    /// Raw vocabulary text for the extraction prompt.
    pub fn prompt_text(&self) -> String {
        self.sources.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const GLOBAL: &str = r#"
%% person_status(PersonId, _suspect)
%
% The person is a suspect.
%

person_status(PersonId, suspect).
proceeding_language(PersonId, Language).
"#;

    #[test]
    fn test_signatures_from_templates() {
        let vocabulary = Vocabulary::from_sources(vec![GLOBAL.to_string()]);
        assert_eq!(vocabulary.signatures().len(), 2);
        assert!(vocabulary.allows(&Fact::parse("person_status(p, accused)").unwrap()));
        assert!(!vocabulary.allows(&Fact::parse("person_status(p)").unwrap()));
        assert!(!vocabulary.allows(&Fact::parse("favourite_colour(p, blue)").unwrap()));
    }

    #[test]
    fn test_load_layers_and_skips_missing() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("facts.pl"), GLOBAL).unwrap();
        std::fs::create_dir(dir.path().join("directive_2010_64")).unwrap();
        std::fs::write(
            dir.path().join("directive_2010_64").join("pl.pl"),
            "person_document(PersonId, charge).\n",
        )
        .unwrap();

        let vocabulary = Vocabulary::load(dir.path(), "directive_2010_64", "pl").unwrap();
        assert_eq!(vocabulary.signatures().len(), 3);
        assert!(vocabulary.prompt_text().contains("person_document"));
    }

    #[test]
    fn test_empty_vocabulary_is_permissive() {
        let vocabulary = Vocabulary::default();
        assert!(vocabulary.allows(&Fact::parse("anything(x)").unwrap()));
    }
}
