use serde::{Deserialize, Serialize};

/// The language-model collaborators of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    IntentClassifier,
    FactExtractor,
    Narrator,
}

impl CollaboratorRole {
    /// Get the default model for this role
    pub fn default_model(&self) -> &'static str {
        match self {
            CollaboratorRole::IntentClassifier => "llama3.2:3b",
            CollaboratorRole::FactExtractor => "llama3.1:8b",
            CollaboratorRole::Narrator => "llama3.1:8b",
        }
    }

    /// System prompt sent with every request of this role. The narrator's
    /// system prompt is composed per turn instead.
    pub fn system_prompt(&self) -> Option<&'static str> {
        match self {
            CollaboratorRole::IntentClassifier => Some(
                "You classify what the user of a legal-rights assistant wants to do next. \
                 Reply with the requested token only, without explanations.",
            ),
            CollaboratorRole::FactExtractor => Some(
                "You translate a case description into Prolog facts. \
                 Use only the predicates you are given and never invent new ones.",
            ),
            CollaboratorRole::Narrator => None,
        }
    }
}

impl std::fmt::Display for CollaboratorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaboratorRole::IntentClassifier => write!(f, "IntentClassifier"),
            CollaboratorRole::FactExtractor => write!(f, "FactExtractor"),
            CollaboratorRole::Narrator => write!(f, "Narrator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_default_model() {
        assert_eq!(CollaboratorRole::IntentClassifier.default_model(), "llama3.2:3b");
        assert_eq!(CollaboratorRole::Narrator.default_model(), "llama3.1:8b");
    }

    #[test]
    fn test_narrator_has_no_fixed_system_prompt() {
        assert!(CollaboratorRole::Narrator.system_prompt().is_none());
        assert!(CollaboratorRole::FactExtractor
            .system_prompt()
            .unwrap()
            .contains("Prolog facts"));
    }
}
