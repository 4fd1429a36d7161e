//! Prompt template with named slots
//!
//! A template is parsed once into literal text and slot segments. Rendering
//! walks the segments a single time, so slot values are inserted verbatim and
//! never scanned for further slots.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Instructions wrapped around every student question.
pub const STUDY_TEMPLATE: &str = "\
You are an AI assistant designed to help students with their studies.
Your tasks include:
- Explaining complex concepts in simple terms
- Helping with homework and assignments
- Providing study resources and references
- Answering questions about various subjects

Here is some relevant context: {study_materials}

Student's question: {question}

Please provide a clear, detailed answer with examples where appropriate.
If the question relates to specific subjects (math, physics, programming etc.),
tailor your response accordingly. /no_think
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    StudyMaterials,
    Question,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::StudyMaterials, Slot::Question];

    pub fn name(&self) -> &'static str {
        match self {
            Slot::StudyMaterials => "study_materials",
            Slot::Question => "question",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Slot::ALL.into_iter().find(|slot| slot.name() == name)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.name())
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown slot {{{name}}} at byte {offset}")]
    UnknownSlot { name: String, offset: usize },
    #[error("unclosed '{{' at byte {0}")]
    UnclosedBrace(usize),
    #[error("unmatched '}}' at byte {0} (use '}}}}' for a literal brace)")]
    StrayBrace(usize),
    #[error("template never uses the {0} slot")]
    MissingSlot(Slot),
    #[error("failed to read template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Slot),
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// The built-in study assistant template.
    pub fn study_assistant() -> Result<Self, TemplateError> {
        Self::parse(STUDY_TEMPLATE)
    }

    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' => {
                    if chars.peek().map(|(_, c)| *c) == Some('{') {
                        chars.next();
                        literal.push('{');
                        continue;
                    }

                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::UnclosedBrace(offset));
                    }

                    let slot = Slot::from_name(name.trim())
                        .ok_or(TemplateError::UnknownSlot { name, offset })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                '}' => {
                    if chars.peek().map(|(_, c)| *c) == Some('}') {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(TemplateError::StrayBrace(offset));
                    }
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }

        for slot in Slot::ALL {
            if !segments.contains(&Segment::Slot(slot)) {
                return Err(TemplateError::MissingSlot(slot));
            }
        }

        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    /// The template source as it was parsed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn render(&self, question: &str, study_materials: &str) -> String {
        let mut prompt = String::with_capacity(self.text.len() + question.len() + study_materials.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => prompt.push_str(text),
                Segment::Slot(Slot::Question) => prompt.push_str(question),
                Segment::Slot(Slot::StudyMaterials) => prompt.push_str(study_materials),
            }
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_template_parses() {
        let template = PromptTemplate::study_assistant().unwrap();
        assert_eq!(template.text(), STUDY_TEMPLATE);
    }

    #[test]
    fn test_render_places_values_in_slots() {
        let template = PromptTemplate::study_assistant().unwrap();
        let prompt = template.render("What is a derivative?", "Calculus notes");

        assert!(prompt.contains("Here is some relevant context: Calculus notes\n"));
        assert!(prompt.contains("Student's question: What is a derivative?\n"));
        assert!(prompt.starts_with("You are an AI assistant designed to help students"));
        assert!(prompt.ends_with("tailor your response accordingly. /no_think\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let template = PromptTemplate::study_assistant().unwrap();
        let a = template.render("q", "m");
        let b = template.render("q", "m");
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_only_touches_slots() {
        let template = PromptTemplate::parse("A {question} B {study_materials} C").unwrap();
        assert_eq!(template.render("1", "2"), "A 1 B 2 C");
        assert_eq!(template.render("", ""), "A  B  C");
    }

    #[test]
    fn test_slot_syntax_in_values_is_not_substituted() {
        let template = PromptTemplate::parse("[{study_materials}] [{question}]").unwrap();
        let prompt = template.render("{study_materials}", "{question} and {{x}}");
        assert_eq!(prompt, "[{question} and {{x}}] [{study_materials}]");
    }

    #[test]
    fn test_slot_may_repeat() {
        let template = PromptTemplate::parse("{question}/{question} {study_materials}").unwrap();
        assert_eq!(template.render("q", "m"), "q/q m");
    }

    #[test]
    fn test_double_braces_are_literal() {
        let template = PromptTemplate::parse("{{json}} {question} {study_materials} }}").unwrap();
        assert_eq!(template.render("q", "m"), "{json} q m }");
    }

    #[test]
    fn test_unknown_slot_is_rejected() {
        let err = PromptTemplate::parse("{question} {study_materials} {topic}").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownSlot { ref name, offset: 29 } if name == "topic"));
    }

    #[test]
    fn test_unclosed_brace_is_rejected() {
        let err = PromptTemplate::parse("{question} {study_materials").unwrap_err();
        assert!(matches!(err, TemplateError::UnclosedBrace(11)));
    }

    #[test]
    fn test_stray_closing_brace_is_rejected() {
        let err = PromptTemplate::parse("{question} } {study_materials}").unwrap_err();
        assert!(matches!(err, TemplateError::StrayBrace(11)));
    }

    #[test]
    fn test_missing_slot_is_rejected() {
        let err = PromptTemplate::parse("Only {question}").unwrap_err();
        assert!(matches!(err, TemplateError::MissingSlot(Slot::StudyMaterials)));
        assert_eq!(err.to_string(), "template never uses the {study_materials} slot");
    }

    #[test]
    fn test_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.txt");
        std::fs::write(&path, "Context: {study_materials}\nQ: {question}").unwrap();

        let template = PromptTemplate::from_file(&path).unwrap();
        assert_eq!(template.render("why?", "notes"), "Context: notes\nQ: why?");

        let missing = PromptTemplate::from_file(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(missing, TemplateError::Read { .. }));
    }
}
