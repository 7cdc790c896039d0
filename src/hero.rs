//! Hero image generation: a prompt step, then an image step.
//!
//! Both steps are keyed by the content plan outline GUID. The second step only
//! runs if the first answered 200, and its failure keeps the first step's reply.

use std::time::Duration;

use tracing::{info, warn};

use crate::backend::{Backend, BackendError};
use crate::model::{HeroImageReply, HeroImageRequest, HeroPromptReply, HeroPromptRequest};

pub const PROMPT_FUNCTION: &str = "generate-hero-image-prompt";
pub const IMAGE_FUNCTION: &str = "generate-hero-image";

pub const TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum HeroError {
    #[error("step 1 (prompt) failed: {0}")]
    Prompt(#[source] BackendError),

    #[error("step 2 (image) failed: {source}")]
    Image {
        source: BackendError,
        prompt: Box<HeroPromptReply>,
    },
}

/// Both replies from a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct HeroImage {
    pub prompt: HeroPromptReply,
    pub image: HeroImageReply,
}

impl HeroImage {
    pub fn url(&self) -> Option<&str> {
        self.image.hero_image_url.as_deref()
    }

    pub fn prompt_id(&self) -> Option<&serde_json::Value> {
        self.prompt.prompt_id()
    }
}

/// Step 1: write an image prompt from the outline's content.
pub fn generate_prompt(
    backend: &Backend,
    outline_guid: &str,
) -> Result<HeroPromptReply, BackendError> {
    let request = HeroPromptRequest {
        content_plan_outline_guid: outline_guid.to_string(),
        use_unedited_content: true,
    };
    let reply: HeroPromptReply = backend
        .call_function(PROMPT_FUNCTION, &request, TIMEOUT)?
        .accept(&[200])?
        .json()?;

    if !reply.saved() {
        warn!(outline_guid, "prompt generated but not confirmed saved");
    }
    Ok(reply)
}

/// Step 2: render the image from the saved prompt.
pub fn generate_image(
    backend: &Backend,
    outline_guid: &str,
) -> Result<HeroImageReply, BackendError> {
    let request = HeroImageRequest {
        guid: outline_guid.to_string(),
        regenerate: false,
    };
    backend
        .call_function(IMAGE_FUNCTION, &request, TIMEOUT)?
        .accept(&[200])?
        .json()
}

/// Run both steps in order.
///
/// `on_prompt` sees step 1's reply before step 2 starts.
pub fn generate(
    backend: &Backend,
    outline_guid: &str,
    on_prompt: impl FnOnce(&HeroPromptReply),
) -> Result<HeroImage, HeroError> {
    let prompt = generate_prompt(backend, outline_guid).map_err(HeroError::Prompt)?;
    on_prompt(&prompt);

    let image = match generate_image(backend, outline_guid) {
        Ok(image) => image,
        Err(source) => {
            return Err(HeroError::Image {
                source,
                prompt: Box::new(prompt),
            });
        }
    };
    info!(outline_guid, url = ?image.hero_image_url, "hero image generated");
    Ok(HeroImage { prompt, image })
}
