//! Prompt templates for grounded generation

/// System instruction sent with every completion
pub const SYSTEM_INSTRUCTION: &str =
    "You are an assistant that answers questions based on the provided context only.";

/// Context used when retrieval finds nothing
pub const NO_CONTEXT: &str = "No relevant documents found.";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join retrieved texts with newlines, keeping within `max_chars`
    ///
    /// Returns the context block and how many texts it contains. Texts are
    /// taken in order; the first one that does not fit is cut at a character
    /// boundary and nothing after it is included. An empty input yields the
    /// [`NO_CONTEXT`] sentinel.
    pub fn build_context(texts: &[String], max_chars: usize) -> (String, usize) {
        if texts.is_empty() {
            return (NO_CONTEXT.to_string(), 0);
        }

        let mut context = String::new();
        let mut used_chars = 0usize;
        let mut included = 0usize;

        for text in texts {
            let separator = usize::from(included > 0);
            let remaining = max_chars.saturating_sub(used_chars + separator);
            if remaining == 0 {
                break;
            }
            if separator == 1 {
                context.push('\n');
            }

            let len = text.chars().count();
            if len <= remaining {
                context.push_str(text);
                used_chars += separator + len;
                included += 1;
            } else {
                context.extend(text.chars().take(remaining));
                included += 1;
                break;
            }
        }

        (context, included)
    }

    /// Fill the question template
    pub fn build_prompt(context: &str, query: &str) -> String {
        format!("Context:\n{}\n\nQuestion: {}\n\nAnswer:", context, query)
    }
}
