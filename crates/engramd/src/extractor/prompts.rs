//! Prompts for completion-driven fact extraction.

/// System prompt for the extraction call.
///
/// The user prompt is the raw input text; the model answers with bare
/// JSON in the shape the extractor parses.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You split user text into durable memory facts.

Rules:
1. Break the text into standalone facts. Each fact must be a short, self-contained sentence that makes sense without the others.
2. Classify the text as one strand: "factual" (knowledge), "experiential" (events that happened), "procedural" (how to do something), "preferential" (likes, dislikes, settings), "relational" (people and relationships), or "general" (anything else).
3. Extract time-varying facts about entities as temporalFacts. Use "speaker" as the entity for first-person statements. Keep attribute names short and stable (e.g. "phone", "city", "employer") and values to the distinguishing word or phrase.

Respond with ONLY a JSON object in this exact shape, no prose and no code fences:
{
  "facts": ["..."],
  "strand": "preferential",
  "temporalFacts": [{"entity": "speaker", "attribute": "phone", "value": "Samsung"}]
}

If nothing is worth remembering, return {"facts": [], "strand": "general", "temporalFacts": []}."#;
