//! Offline backend used when the environment is `development`.
//!
//! [`CannedBackend`] answers every prompt with the same long, structured reply
//! (numbered sections and bullet lists, which exercises every formatting rule)
//! and streams it one character per frame with a short pause between frames,
//! the way a live backend trickles tokens.

use std::time::Duration;

use bytes::Bytes;
use futures::stream;
use rand::Rng;

use crate::client::{ByteStream, GenerationRequest, OutgoingRequest};
use crate::error::Result;
use crate::observability::CLIENT_REQUESTS;

/// Shortest pause between two frames.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(30);

/// Spread added on top of [`MIN_FRAME_DELAY`].
pub const FRAME_JITTER: Duration = Duration::from_millis(20);

/// Canned-response generator that needs no network.
#[derive(Clone, Debug)]
pub struct CannedBackend {
    min_delay: Duration,
    jitter: Duration,
}

impl CannedBackend {
    /// A backend with the default 30-50 ms pause between characters.
    pub fn new() -> Self {
        Self {
            min_delay: MIN_FRAME_DELAY,
            jitter: FRAME_JITTER,
        }
    }

    /// A backend that pauses exactly `delay` between characters.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            min_delay: delay,
            jitter: Duration::ZERO,
        }
    }

    fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.min_delay;
        }
        let spread = self.jitter.as_millis() as u64;
        self.min_delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

impl Default for CannedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl OutgoingRequest for CannedBackend {
    async fn send(&self, request: &GenerationRequest) -> Result<ByteStream> {
        CLIENT_REQUESTS.click();
        tracing::debug!(model = %request.model, "serving canned response");
        let frames = canned_reply(&request.prompt)
            .chars()
            .map(|c| frame(&c.to_string()))
            .chain(std::iter::once(Bytes::from_static(b"data: [DONE]\n\n")))
            .collect::<Vec<_>>();
        let delays = (0..frames.len()).map(|_| self.next_delay()).collect::<Vec<_>>();
        let stream = stream::unfold(
            (frames.into_iter(), delays.into_iter()),
            |(mut frames, mut delays)| async move {
                let frame = frames.next()?;
                let delay = delays.next().unwrap_or_default();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let item: Result<Bytes> = Ok(frame);
                Some((item, (frames, delays)))
            },
        );
        Ok(Box::pin(stream))
    }
}

/// Frame `text` as one `data:` record.
pub fn frame(text: &str) -> Bytes {
    let payload = serde_json::json!({ "content": text });
    Bytes::from(format!("data: {payload}\n\n"))
}

/// The reply served for `prompt`.
pub fn canned_reply(prompt: &str) -> String {
    format!(
        r#"In response to your question "{prompt}", let me develop a comprehensive analysis.

1. Historical Context:
Historically, this issue emerged in the 1990s with the advent of new technologies. Early research showed promising results, but it wasn't until the early 2000s that major breakthroughs occurred.

2. Current State of Knowledge:
Recent studies show significant evolution in our understanding of the subject. Researchers have identified several key factors that directly influence observed results.

3. Practical Applications:
In the real world, these concepts find numerous applications:
- Optimization of existing processes
- Development of new methodologies
- Improvement of systemic performance
- Integration into modern workflows

4. Future Perspectives:
Current trends suggest we're on the cusp of a new era in this field. Experts predict major developments in the next 5 to 10 years.

5. Important Considerations:
It is crucial to take into account several aspects:
- Scalability of proposed solutions
- Environmental impact
- Ethical implications
- Long-term sustainability

6. Conclusion:
Your question raises essential points that deserve careful attention. Current research shows we're on the right track, but there's still much to explore."#
    )
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::format::{FormattedLine, ResponseAccumulator};
    use crate::sse::{Delta, FrameDecoder};

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            model: "canned".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    #[test]
    fn reply_quotes_prompt() {
        assert!(canned_reply("why is the sky blue").contains("\"why is the sky blue\""));
    }

    #[test]
    fn frame_escapes_json() {
        assert_eq!(&frame("\"")[..], b"data: {\"content\":\"\\\"\"}\n\n");
    }

    #[test]
    fn delays_stay_within_bounds() {
        let backend = CannedBackend::new();
        for _ in 0..500 {
            let delay = backend.next_delay();
            assert!(delay >= MIN_FRAME_DELAY);
            assert!(delay <= MIN_FRAME_DELAY + FRAME_JITTER);
        }
    }

    #[test]
    fn fixed_delay_has_no_jitter() {
        let backend = CannedBackend::with_delay(Duration::from_millis(5));
        assert!((0..50).all(|_| backend.next_delay() == Duration::from_millis(5)));
    }

    #[tokio::test]
    async fn stream_decodes_to_reply() {
        let backend = CannedBackend::with_delay(Duration::ZERO);
        let mut stream = backend.send(&request("tides")).await.unwrap();
        let mut decoder = FrameDecoder::new();
        let mut acc = ResponseAccumulator::new();
        let mut last = None;
        while let Some(chunk) = stream.next().await {
            for delta in decoder.feed(&chunk.unwrap()) {
                if let Delta::Content(text) = delta {
                    last = Some(acc.append(&text));
                }
            }
        }
        assert_eq!(decoder.finish().collect::<Vec<_>>(), vec![Delta::Done]);
        assert_eq!(acc.text(), canned_reply("tides"));
        let formatted = last.unwrap();
        assert!(formatted.lines().iter().any(|line| matches!(line, FormattedLine::Bullet(_))));
        assert!(
            formatted
                .lines()
                .iter()
                .any(|line| matches!(line, FormattedLine::Ordinal { .. }))
        );
    }
}
