use serenity::http::Http;
use serenity::model::id::ChannelId;

/// Maximum characters per Discord message (2000 is the limit; we use 1950 for safety).
pub const CHUNK_MAX: usize = 1950;

/// Split `text` into chunks of at most [`CHUNK_MAX`] characters, preferring
/// splits on newline, then whitespace, to avoid cutting words mid-way.
pub fn split_chunks(text: &str) -> Vec<String> {
    split_chunks_at(text, CHUNK_MAX)
}

/// Character-counted split. Boundaries always land on a char boundary, so
/// multi-byte text is never cut inside a code point.
fn split_chunks_at(text: &str, max: usize) -> Vec<String> {
    if text.chars().count() <= max {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.chars().count() > max {
        let window_end = remaining
            .char_indices()
            .nth(max)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..window_end];
        let separator = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0);

        // Only the separator itself is consumed; indentation on the next line stays.
        let (split_at, resume_at) = match separator {
            Some(i) => (i, i + 1),
            None => (window_end, window_end),
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[resume_at..];
    }

    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }

    chunks
}

/// Send `text` to `channel_id` in ≤1950-char chunks, in order.
pub async fn send_chunked(
    http: &Http,
    channel_id: ChannelId,
    text: &str,
) -> Result<(), serenity::Error> {
    for chunk in split_chunks(text) {
        channel_id.say(http, &chunk).await?;
    }
    Ok(())
}
