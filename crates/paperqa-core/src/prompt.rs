//! Persona-conditioned prompt templates.
//!
//! A persona changes only the instruction paragraph of the prompt; the
//! rest of the template is fixed and has exactly two placeholders,
//! `{context}` and `{input}`, followed by a trailing `Answer:` cue.
//!
//! ```rust
//! use paperqa_core::prompt::{build_prompt, Persona};
//!
//! let prompt = build_prompt("professor");
//! assert_eq!(prompt.persona, Persona::Professor);
//! let text = prompt.render("[METHOD | a.pdf]\nWe used X.", "What method was used?");
//! assert!(text.trim_end().ends_with("Answer:"));
//! ```

use serde::Serialize;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const INPUT_PLACEHOLDER: &str = "{input}";

const DEFAULT_INSTRUCTION: &str = "You are a helpful AI assistant answering questions about scientific papers. \
Be concise, clear, and informative. Use numbers or bullet points if it helps clarity.";

const STUDENT_INSTRUCTION: &str = "You are a student trying to understand the main idea and method of a scientific paper. \
Answer in a simple, step-by-step, and easy-to-understand way. Use numbered lists or bullet points. \
Focus on the main idea, method, and key results. Avoid jargon.";

const PROFESSOR_INSTRUCTION: &str = "You are a senior researcher (professor) answering questions about scientific papers. \
Provide a detailed, technical, and structured answer. Use numbered points or sections if relevant. \
Explain advanced concepts clearly, and include references to the context when possible.";

/// Response style. Affects prompt phrasing only, never retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    Default,
    Student,
    Professor,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Default, Persona::Student, Persona::Professor];

    /// Parse a persona identifier. Unknown identifiers map to
    /// [`Persona::Default`].
    pub fn parse(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "student" => Persona::Student,
            "professor" => Persona::Professor,
            _ => Persona::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Default => "default",
            Persona::Student => "student",
            Persona::Professor => "professor",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            Persona::Default => DEFAULT_INSTRUCTION,
            Persona::Student => STUDENT_INSTRUCTION,
            Persona::Professor => PROFESSOR_INSTRUCTION,
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prompt template for one persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptTemplate {
    pub persona: Persona,
    pub instruction: String,
    /// Full template text containing both placeholders once.
    pub template: String,
}

impl PromptTemplate {
    pub fn for_persona(persona: Persona) -> Self {
        let instruction = persona.instruction().to_string();
        let template = format!(
            "{}\n\n<context>\n{}\n</context>\n\nQuestion: {}\nAnswer:\n",
            instruction, CONTEXT_PLACEHOLDER, INPUT_PLACEHOLDER
        );
        Self {
            persona,
            instruction,
            template,
        }
    }

    /// Substitute the two placeholders. Inserted text is never rescanned,
    /// so braces inside the context or question are kept verbatim.
    pub fn render(&self, context: &str, input: &str) -> String {
        let (head, rest) = self
            .template
            .split_once(CONTEXT_PLACEHOLDER)
            .unwrap_or((self.template.as_str(), ""));
        let (middle, tail) = rest.split_once(INPUT_PLACEHOLDER).unwrap_or((rest, ""));

        let mut out =
            String::with_capacity(self.template.len() + context.len() + input.len());
        out.push_str(head);
        out.push_str(context);
        out.push_str(middle);
        out.push_str(input);
        out.push_str(tail);
        out
    }
}

/// Build the prompt template for a persona identifier.
pub fn build_prompt(persona: &str) -> PromptTemplate {
    PromptTemplate::for_persona(Persona::parse(persona))
}
