use tracing::{info, warn};

use crate::provider::ProviderError;
use crate::session::Session;

use super::target::ReplyTarget;

/// Quote the user's text, mention the author, then the model's reply.
pub fn format_reply(user_text: &str, author_id: u64, reply: &str) -> String {
    format!("> **{user_text}** - <@{author_id}> \n\n{reply}")
}

/// Resolve a reply for `user_text` and deliver it to `target`.
///
/// Resolution errors propagate to the caller. Delivery errors are logged and
/// swallowed: the exchange is already recorded in the history.
pub async fn send_message<T: ReplyTarget>(
    session: &Session,
    target: &T,
    user_text: &str,
) -> Result<(), ProviderError> {
    let image_urls = target.image_urls();
    let reply = session.resolve(user_text, &image_urls).await?;
    let formatted = format_reply(user_text, target.author_id(), &reply);

    match target.send_split(&formatted).await {
        Ok(()) => info!(
            channel = target.channel_id(),
            chars = formatted.chars().count(),
            "reply delivered"
        ),
        Err(e) => warn!(
            channel = target.channel_id(),
            error = %e,
            "error while sending message"
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_format() {
        assert_eq!(format_reply("Hello", 42, "Hi!"), "> **Hello** - <@42> \n\nHi!");
    }

    #[test]
    fn reply_format_keeps_multiline_reply() {
        let out = format_reply("q", 1, "line1\nline2");
        assert!(out.starts_with("> **q** - <@1> \n\n"));
        assert!(out.ends_with("line1\nline2"));
    }
}
