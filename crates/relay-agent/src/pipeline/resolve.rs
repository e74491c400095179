use tokio::sync::Mutex;
use tracing::debug;

use relay_core::config::ModelConfig;

use crate::conversation::Conversation;
use crate::provider::{ChatRequest, Content, LlmProvider, Message, ProviderError};

/// Pick the vision model when the turn carries images, the text model otherwise.
pub fn select_model(models: &ModelConfig, has_images: bool) -> &str {
    if has_images {
        &models.vision
    } else {
        &models.text
    }
}

/// Run one exchange: append the user turn, call the model with the whole
/// history, append and return the reply.
///
/// The conversation lock is released while the provider call is in flight,
/// so a reset never waits on the model. A reply that arrives after a reset
/// is returned but not recorded. Callers serialize exchanges themselves.
///
/// Errors from the provider propagate unchanged. The user turn has already
/// been appended at that point and stays in the history.
pub async fn resolve_response(
    conversation: &Mutex<Conversation>,
    provider: &dyn LlmProvider,
    models: &ModelConfig,
    text: &str,
    image_urls: &[String],
) -> Result<String, ProviderError> {
    let has_images = !image_urls.is_empty();
    let content = if has_images {
        Content::WithImages {
            text: text.to_string(),
            image_urls: image_urls.to_vec(),
        }
    } else {
        Content::Text(text.to_string())
    };

    let (req, generation) = {
        let mut conv = conversation.lock().await;
        conv.append(Message::user(content));
        let req = ChatRequest {
            model: select_model(models, has_images).to_string(),
            messages: conv.entries().to_vec(),
        };
        (req, conv.generation())
    };

    debug!(
        provider = provider.name(),
        model = %req.model,
        history = req.messages.len(),
        "resolving response"
    );

    let resp = provider.send(&req).await?;

    let mut conv = conversation.lock().await;
    if conv.generation() == generation {
        conv.append(Message::assistant(resp.content.clone()));
    } else {
        debug!(provider = provider.name(), "conversation reset mid-exchange, reply not recorded");
    }
    Ok(resp.content)
}
