//! Prompt assembly.
//!
//! Combines the persona template, the retrieved chunk texts, and the user's
//! question into one generation prompt. Chunk texts are joined with
//! [`CONTEXT_DELIMITER`] in retrieval rank order.
//!
//! Nothing is escaped, truncated, or sanitized: chunk text and question are
//! inserted verbatim, so text in the corpus can steer the model. This is an
//! accepted limitation of the tool.

use corpus_rag_core::models::Chunk;

use crate::config::PromptConfig;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";
pub const CONTEXT_DELIMITER: &str = "\n";

/// Default persona: a concise Italian-speaking security and DevOps expert.
pub const DEFAULT_TEMPLATE: &str = "\
Personalità:
    Rispondi in modo coerente e conciso: prima comandi e formule, poi il concetto.
    Ignora i link presenti nel contesto, non sono raggiungibili.
    Sei esperto di cybersecurity, DevOps, DFIR, CVE, ROI e normativa sulla sicurezza informatica.
    Includi formule e comandi quando sono pertinenti.
    Nei blocchi tecnici privilegia la chiarezza: liste, tabelle, codice.

Contesto:
{context}

Domanda: {question}

Blocco di comandi e configurazione:
";

/// Builds generation prompts from a fixed template.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: String,
}

impl PromptAssembler {
    pub fn new(config: &PromptConfig) -> Self {
        Self::with_template(&config.template)
    }

    pub fn with_template(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Assemble the prompt for `question` over `chunks` (best first).
    pub fn assemble(&self, chunks: &[Chunk], question: &str) -> String {
        let context = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_DELIMITER);
        render(&self.template, &context, question)
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::with_template(DEFAULT_TEMPLATE)
    }
}

/// Substitute both placeholders in a single left-to-right pass, so
/// placeholder-looking text inside `context` or `question` stays literal.
fn render(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);

    out
}
