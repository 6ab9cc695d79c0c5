use crate::Scope;

/// Wire names and placeholder text for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeProfile {
    pub request_event: String,
    pub response_event: String,
    pub progress_event: String,
    pub placeholder: String,
    /// Payload field carrying the user's input in the request event.
    pub input_field: String,
}

impl ScopeProfile {
    pub fn for_scope(scope: &Scope) -> Self {
        match scope.as_str() {
            Scope::CHAT => Self::with_prefix("inference-completion", "AI is thinking...", "promptText"),
            Scope::DOCUMENT_QA => {
                Self::with_prefix("query-document", "Processing your query...", "documentPrompt")
            }
            Scope::PARSER => Self::with_prefix("add-document", "Parsing document...", "sourceLocation"),
            other => Self::with_prefix(other, "Working...", "input"),
        }
    }

    fn with_prefix(prefix: &str, placeholder: &str, input_field: &str) -> Self {
        Self {
            request_event: format!("{prefix}-request"),
            response_event: format!("{prefix}-response"),
            progress_event: format!("{prefix}-progress"),
            placeholder: placeholder.to_string(),
            input_field: input_field.to_string(),
        }
    }
}
