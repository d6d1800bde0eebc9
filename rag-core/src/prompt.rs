//! Prompt templates and the default grounded-answer prompts.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` produce literal braces.
//! A template is checked only when it is formatted, so an invalid template
//! can be constructed but never rendered.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::document::SearchResult;
use crate::error::{RagError, Result};

/// System prompt used when answering from retrieved context.
pub const RAG_SYSTEM_TEMPLATE: &str = "You are a supportive mental coach. \
Answer the user's question using only the provided context.
If the context does not contain the information needed, say that you don't have enough information to answer.
When a question touches on medical, psychological, legal or financial concerns, recommend consulting a qualified professional.
{response_style}";

/// User prompt carrying the question and the retrieved context.
pub const RAG_USER_TEMPLATE: &str = "Context:
{context}

Number of relevant sources found: {context_count}
{similarity_scores}
Question: {user_query}

Answer using only the context above.";

/// System prompt used when no context can be retrieved.
pub const FALLBACK_SYSTEM_PROMPT: &str = "You are a supportive mental coach.";

const DEFAULT_RESPONSE_STYLE: &str = "Keep the answer warm, clear and concise.";

/// A parametrized prompt with optional default values.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
    defaults: HashMap<String, String>,
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Brace(char),
    Placeholder(&'a str),
}

impl PromptTemplate {
    /// Create a template with no defaults.
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into(), defaults: HashMap::new() }
    }

    /// Provide a value used when `name` is not passed to [`format`](Self::format).
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// The raw template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Prompt`] if the template is malformed.
    pub fn placeholders(&self) -> Result<Vec<&str>> {
        let mut names = Vec::new();
        for segment in self.parse()? {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    /// Placeholders without a default value.
    pub fn required_parameters(&self) -> Result<Vec<&str>> {
        Ok(self
            .placeholders()?
            .into_iter()
            .filter(|name| !self.defaults.contains_key(*name))
            .collect())
    }

    /// Render the template, taking values from `params` first and defaults second.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Prompt`] if the template is malformed or any
    /// placeholder has neither a parameter nor a default.
    pub fn format<K, V>(&self, params: &HashMap<K, V>) -> Result<String>
    where
        K: Borrow<str> + Hash + Eq,
        V: AsRef<str>,
    {
        let segments = self.parse()?;
        let mut out = String::with_capacity(self.template.len());
        let mut missing: Vec<&str> = Vec::new();

        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Brace(c) => out.push(c),
                Segment::Placeholder(name) => {
                    if let Some(value) = params.get(name) {
                        out.push_str(value.as_ref());
                    } else if let Some(value) = self.defaults.get(name) {
                        out.push_str(value);
                    } else if !missing.contains(&name) {
                        missing.push(name);
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(RagError::Prompt(format!("missing parameters: {}", missing.join(", "))));
        }
        Ok(out)
    }

    fn parse(&self) -> Result<Vec<Segment<'_>>> {
        let text = self.template.as_str();
        let mut segments = Vec::new();
        let mut literal_start = 0;
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '{' | '}' if chars.peek().map(|(_, next)| *next) == Some(c) => {
                    segments.push(Segment::Text(&text[literal_start..i]));
                    segments.push(Segment::Brace(c));
                    chars.next();
                    literal_start = i + 2;
                }
                '{' => {
                    let close = text[i + 1..].find('}').map(|p| i + 1 + p).ok_or_else(|| {
                        RagError::Prompt(format!("unclosed '{{' at byte {i}"))
                    })?;
                    let name = &text[i + 1..close];
                    let valid = name.chars().all(|ch| ch.is_alphanumeric() || ch == '_');
                    if name.is_empty() || !valid {
                        return Err(RagError::Prompt(format!("invalid placeholder '{{{name}}}'")));
                    }
                    segments.push(Segment::Text(&text[literal_start..i]));
                    segments.push(Segment::Placeholder(name));
                    while chars.peek().is_some_and(|(j, _)| *j <= close) {
                        chars.next();
                    }
                    literal_start = close + 1;
                }
                '}' => return Err(RagError::Prompt(format!("unmatched '}}' at byte {i}"))),
                _ => {}
            }
        }
        segments.push(Segment::Text(&text[literal_start..]));
        segments.retain(|s| *s != Segment::Text(""));
        Ok(segments)
    }
}

/// The default system template for grounded answers.
pub fn rag_system_template() -> PromptTemplate {
    PromptTemplate::new(RAG_SYSTEM_TEMPLATE).with_default("response_style", DEFAULT_RESPONSE_STYLE)
}

/// The default user template for grounded answers.
pub fn rag_user_template() -> PromptTemplate {
    PromptTemplate::new(RAG_USER_TEMPLATE).with_default("similarity_scores", "")
}

/// Number the retrieved chunks as `[1] text`, separated by blank lines.
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}", i + 1, r.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One line listing each source's similarity score, or empty if there are none.
pub fn format_scores(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }
    let scores = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {:.3}", i + 1, r.score))
        .collect::<Vec<_>>();
    format!("Similarity scores: {}\n", scores.join(", "))
}
