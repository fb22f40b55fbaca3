use serde::Deserialize;

use crate::domain::FetchError;

const MAX_ERROR_SUMMARY_CHARS: usize = 200;

/// Collapses whitespace in an error body and shortens it for display.
pub(crate) fn summarize_error_body(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_SUMMARY_CHARS {
        return collapsed;
    }

    let mut summary: String = collapsed.chars().take(MAX_ERROR_SUMMARY_CHARS).collect();
    summary.push_str("...");
    summary
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<ResponseCandidate>,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResponseCandidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if present and non-blank.
    pub(crate) fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub(crate) fn first_finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()?
            .finish_reason
            .as_deref()
            .filter(|reason| !reason.trim().is_empty())
    }
}

pub(crate) fn decode_generate_content(body: &str) -> Result<GenerateContentResponse, FetchError> {
    serde_json::from_str(body)
        .map_err(|err| FetchError::parse(format!("Gemini response decode failed: {err}")))
}
