use crate::error::{RagError, Result};

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUERY_PLACEHOLDER: &str = "{query}";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "The following is a document and question\n\
Only provide a very concise answer\n\
Context:\n\n\
{context}\n\n\
Here's the question:{query}\n\
answer:";

/// A prompt with `{context}` and `{query}` slots, both required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUERY_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(RagError::InvalidPromptTemplate(format!(
                    "The prompt template must include \"{}\"",
                    placeholder
                )));
            }
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fill both slots in a single left-to-right pass, so placeholder text
    /// inside the context or query is never expanded.
    pub fn render(&self, context: &str, query: &str) -> String {
        let slots = [(CONTEXT_PLACEHOLDER, context), (QUERY_PLACEHOLDER, query)];
        let mut out = String::with_capacity(self.template.len() + context.len() + query.len());
        let mut rest = self.template.as_str();

        loop {
            let next = slots
                .iter()
                .filter_map(|&(placeholder, value)| rest.find(placeholder).map(|pos| (pos, placeholder, value)))
                .min_by_key(|&(pos, _, _)| pos);

            match next {
                Some((pos, placeholder, value)) => {
                    out.push_str(&rest[..pos]);
                    out.push_str(value);
                    rest = &rest[pos + placeholder.len()..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}
