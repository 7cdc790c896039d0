//! Request and reply bodies for the remote functions.
//!
//! Replies keep only the fields this client acts on; anything else the
//! functions return is ignored on decode.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── content-intake ──

/// A job description for `content-intake`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_type: String,
    pub requester_email: String,
    /// Free-form brief handed to the first stage.
    pub payload: serde_json::Value,
    pub initial_stage: String,
}

/// What `content-intake` hands back on acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeReceipt {
    pub job_id: Uuid,
    pub status: Option<String>,
    pub stage: Option<String>,
}

// ── generate-side-by-side ──

/// Body for `generate-side-by-side`.
///
/// `outline_guid` is preferred by the function when present; `task_id` lets it
/// find an existing task row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideBySideRequest {
    pub task_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline_guid: Option<String>,
}

/// Reply from `generate-side-by-side`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideBySideReply {
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "task_id")]
    pub task_id: Option<String>,
    pub status: Option<String>,
    pub html: Option<String>,
    pub schema: Option<serde_json::Value>,
    #[serde(default)]
    pub schema_generated: bool,
    /// `false` means the function reused existing edited content.
    pub generated_markdown: Option<bool>,
    /// `false` means the function reused an existing post JSON.
    pub generated_json: Option<bool>,
    pub error: Option<String>,
}

impl SideBySideReply {
    pub fn html_len(&self) -> usize {
        self.html.as_deref().map_or(0, str::len)
    }
}

// ── generate-hero-image-prompt / generate-hero-image ──

/// Body for `generate-hero-image-prompt`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeroPromptRequest {
    pub content_plan_outline_guid: String,
    pub use_unedited_content: bool,
}

/// Body for `generate-hero-image`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeroImageRequest {
    pub guid: String,
    pub regenerate: bool,
}

/// Where the prompt function stored its output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveStatus {
    #[serde(default)]
    pub success: bool,
    pub hero_image_prompt_id: Option<serde_json::Value>,
}

/// Reply from `generate-hero-image-prompt`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeroPromptReply {
    pub save_status: Option<SaveStatus>,
    pub content_source: Option<String>,
    pub aspect_ratio: Option<String>,
    /// Everything else the function returned, prompt text included.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl HeroPromptReply {
    pub fn saved(&self) -> bool {
        self.save_status.as_ref().is_some_and(|s| s.success)
    }

    pub fn prompt_id(&self) -> Option<&serde_json::Value> {
        self.save_status
            .as_ref()
            .and_then(|s| s.hero_image_prompt_id.as_ref())
    }
}

/// Reply from `generate-hero-image`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeroImageReply {
    #[serde(default)]
    pub success: bool,
    pub hero_image_url: Option<String>,
    pub title: Option<String>,
}

// ── generate-schema-perfect ──

/// Body for `generate-schema-perfect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaRequest {
    pub url: String,
}
