use serde_json::Value;

/// One typed probe against a known provider response shape.
///
/// Probes are tried in the fixed order of [`PROBES`]; the first that yields a
/// non-empty string wins. Missing or null intermediate fields are a miss,
/// never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// OpenAI-style chat completion: `choices[0].message.content`.
    ChatMessage,
    /// Legacy completion: `choices[0].text`.
    ChatText,
    /// Anthropic-style content blocks: `content[0].text`.
    ContentBlocks,
    /// Gemini-style: `candidates[0].content.parts[0].text`.
    CandidateParts,
    /// Flat string field at the top level.
    Flat(&'static str),
}

/// Priority order for response extraction.
pub const PROBES: [Probe; 9] = [
    Probe::ChatMessage,
    Probe::ChatText,
    Probe::ContentBlocks,
    Probe::CandidateParts,
    Probe::Flat("completion"),
    Probe::Flat("text"),
    Probe::Flat("content"),
    Probe::Flat("response"),
    Probe::Flat("output"),
];

impl Probe {
    pub fn apply(&self, body: &Value) -> Option<String> {
        let text = match self {
            Probe::ChatMessage => body
                .get("choices")?
                .get(0)?
                .get("message")?
                .get("content")?
                .as_str()?,
            Probe::ChatText => body.get("choices")?.get(0)?.get("text")?.as_str()?,
            Probe::ContentBlocks => body.get("content")?.get(0)?.get("text")?.as_str()?,
            Probe::CandidateParts => body
                .get("candidates")?
                .get(0)?
                .get("content")?
                .get("parts")?
                .get(0)?
                .get("text")?
                .as_str()?,
            Probe::Flat(field) => body.get(*field)?.as_str()?,
        };

        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// Normalize an arbitrary decoded provider body into a single text blob.
pub fn extract_text(body: &Value) -> Option<String> {
    PROBES.iter().find_map(|probe| probe.apply(body))
}
