//! Prompt construction.
//!
//! Rule selection and prompt wording belong to the caller's pipeline; the
//! orchestrator only needs a [`PromptBuilder`]. [`RulePromptBuilder`] is a
//! small default that asks for the JSON shape [`crate::response`] expects.

use crate::types::{AnalysisRequest, Prompt};

pub trait PromptBuilder: Send + Sync {
    fn build(&self, request: &AnalysisRequest) -> Prompt;
}

impl<F> PromptBuilder for F
where
    F: Fn(&AnalysisRequest) -> Prompt + Send + Sync,
{
    fn build(&self, request: &AnalysisRequest) -> Prompt {
        self(request)
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a meticulous code reviewer. \
Respond with a single JSON object inside a ```json fenced block and nothing else. \
The object must have exactly these keys: \
\"issues\" (array of {\"rule\", \"severity\", \"line\", \"message\"}), \
\"suggestions\" (array of strings), \
\"metrics\" (object of numeric measurements such as \"complexity\").";

#[derive(Debug, Clone)]
pub struct RulePromptBuilder {
    system: String,
}

impl Default for RulePromptBuilder {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl RulePromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }
}

impl PromptBuilder for RulePromptBuilder {
    fn build(&self, request: &AnalysisRequest) -> Prompt {
        let opts = &request.options;
        let rules = if opts.rules.is_empty() {
            "all applicable rules".to_string()
        } else {
            opts.rules.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let user = format!(
            "Language: {}\nRules: {}\n\nAnalyze the following code:\n```{}\n{}\n```",
            opts.language, rules, opts.language, request.content
        );
        Prompt::new(self.system.clone(), user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalysisOptions;

    #[test]
    fn test_user_prompt_lists_language_and_sorted_rules() {
        let req = AnalysisRequest::new(
            "let x = 1;",
            AnalysisOptions::new("javascript").with_rules(["style", "security"]),
        );
        let prompt = RulePromptBuilder::new().build(&req);
        assert!(prompt.user.contains("Language: javascript"));
        assert!(prompt.user.contains("Rules: security, style"));
        assert!(prompt.user.contains("let x = 1;"));
        assert!(prompt.system.contains("\"issues\""));
    }

    #[test]
    fn test_closure_builder() {
        let builder = |req: &AnalysisRequest| Prompt::new("sys", req.content.to_uppercase());
        let prompt = builder.build(&AnalysisRequest::new("abc", AnalysisOptions::new("go")));
        assert_eq!(prompt.user, "ABC");
    }
}
