//! System prompt management
//!
//! The two fixed instructions used by every turn: the architect prompt for
//! the first completion and the narration prompt for the follow-up.

/// System prompt configuration and generation
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    /// Base system prompt
    base: String,
    /// Additional context appended after the base
    context: Option<String>,
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::architect()
    }
}

impl SystemPrompt {
    /// Prompt for the first completion of a turn
    pub fn architect() -> Self {
        Self::with_base(ARCHITECT_PROMPT)
    }

    /// Prompt for the follow-up completion after tool calls
    pub fn narration() -> Self {
        Self::with_base(NARRATION_PROMPT)
    }

    /// Create with custom base prompt
    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            context: None,
        }
    }

    /// Add custom context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Build the final system prompt
    pub fn build(&self) -> String {
        match &self.context {
            Some(ctx) => format!("{}\n\n{}", self.base, ctx),
            None => self.base.clone(),
        }
    }

    /// Get the base prompt without context
    pub fn base(&self) -> &str {
        &self.base
    }
}

pub const ARCHITECT_PROMPT: &str = r#"You are the PromptContractor Architect. Your job is to help users build rigorous "Prompt Contracts".

A Prompt Contract has 4 clauses:
1. GOAL: Clear, high-level objective.
2. CONSTRAINTS: Technical limits, style, and "never" rules.
3. OUTPUT FORMAT: Exact structure (JSON, Markdown, etc).
4. FAILURE CONDITIONS: What to do if the goal cannot be met.

When you have enough information, ALWAYS use the 'propose_contract' tool to push a draft to the user.
Use 'browse_documentation' to research specific APIs or technologies if the user mentions them."#;

pub const NARRATION_PROMPT: &str = "Respond to the user about the tool results. If you proposed a contract, tell them to review it in the editor.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architect_prompt_names_clauses_and_tool() {
        let prompt = SystemPrompt::architect().build();
        for clause in ["GOAL", "CONSTRAINTS", "OUTPUT FORMAT", "FAILURE CONDITIONS"] {
            assert!(prompt.contains(clause), "missing {clause}");
        }
        assert!(prompt.contains("propose_contract"));
    }

    #[test]
    fn test_context_is_appended() {
        let prompt = SystemPrompt::narration().with_context("Session: demo").build();
        assert!(prompt.starts_with(NARRATION_PROMPT));
        assert!(prompt.ends_with("Session: demo"));
    }
}
