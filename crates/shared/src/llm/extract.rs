use serde_json::Value;

/// Known locations of the assistant text in provider responses, tried in
/// the order of [`REPLY_SHAPES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// `{"text": "..."}`
    DirectText,
    /// `{"choices": [{"message": {"content": [{"text": "..."}]}}]}`
    ChoiceMessageContent,
    /// `{"choices": [{"text": "..."}]}`
    ChoiceText,
    /// `{"message": {"content": [{"text": "..."}]}}`
    MessageContent,
    /// `{"content": [{"text": "..."}]}`, the Anthropic Messages response.
    ContentBlocks,
}

pub const REPLY_SHAPES: [ReplyShape; 5] = [
    ReplyShape::DirectText,
    ReplyShape::ChoiceMessageContent,
    ReplyShape::ChoiceText,
    ReplyShape::MessageContent,
    ReplyShape::ContentBlocks,
];

impl ReplyShape {
    pub fn pointer(self) -> &'static str {
        match self {
            Self::DirectText => "/text",
            Self::ChoiceMessageContent => "/choices/0/message/content/0/text",
            Self::ChoiceText => "/choices/0/text",
            Self::MessageContent => "/message/content/0/text",
            Self::ContentBlocks => "/content/0/text",
        }
    }

    /// Empty strings do not count as a match.
    pub fn locate(self, response: &Value) -> Option<&str> {
        response
            .pointer(self.pointer())
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Text { shape: ReplyShape, text: String },
    NoText,
}

impl Extraction {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::NoText => None,
        }
    }
}

pub fn extract_reply(response: &Value) -> Extraction {
    REPLY_SHAPES
        .iter()
        .find_map(|shape| {
            shape.locate(response).map(|text| Extraction::Text {
                shape: *shape,
                text: text.to_string(),
            })
        })
        .unwrap_or(Extraction::NoText)
}

pub fn extract_reply_bytes(body: &[u8]) -> Result<Extraction, serde_json::Error> {
    let response = serde_json::from_slice::<Value>(body)?;
    Ok(extract_reply(&response))
}
