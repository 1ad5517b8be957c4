use webrag_core::error::{Error, Result};

pub const DEFAULT_TEMPLATE: &str = "You are an assistant for question-answering tasks.
Use the following documents to answer the question.
If you don't know the answer, just say that you don't know.
Use three sentences maximum and keep the answer concise:
Question: {question}
Documents: {documents}
Answer:
";

const QUESTION_SLOT: &str = "{question}";
const DOCUMENTS_SLOT: &str = "{documents}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Question,
    Documents,
}

/// Prompt text with `{question}` and `{documents}` slots.
///
/// The template is parsed once; rendering is a single pass, so slot markers
/// inside the substituted values are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let source = template.into();
        let segments = parse(&source);
        let required = [(QUESTION_SLOT, Segment::Question), (DOCUMENTS_SLOT, Segment::Documents)];
        for (slot, segment) in required {
            if !segments.contains(&segment) {
                return Err(Error::config(format!("prompt template is missing the {slot} slot")));
            }
        }
        Ok(Self { source, segments })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn render(&self, question: &str, documents: &str) -> String {
        let mut out = String::with_capacity(self.source.len() + question.len() + documents.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Question => out.push_str(question),
                Segment::Documents => out.push_str(documents),
            }
        }
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { source: DEFAULT_TEMPLATE.to_string(), segments: parse(DEFAULT_TEMPLATE) }
    }
}

fn parse(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;
    loop {
        let next = [(QUESTION_SLOT, Segment::Question), (DOCUMENTS_SLOT, Segment::Documents)]
            .into_iter()
            .filter_map(|(slot, seg)| rest.find(slot).map(|at| (at, slot.len(), seg)))
            .min_by_key(|(at, _, _)| *at);
        match next {
            Some((at, len, seg)) => {
                if at > 0 {
                    segments.push(Segment::Text(rest[..at].to_string()));
                }
                segments.push(seg);
                rest = &rest[at + len..];
            }
            None => {
                if !rest.is_empty() {
                    segments.push(Segment::Text(rest.to_string()));
                }
                return segments;
            }
        }
    }
}
