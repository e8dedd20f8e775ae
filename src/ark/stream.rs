use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::error::{ArkError, Result};
use crate::models::{ImageData, ImageGenerationResponse, Usage};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "data: [DONE]";

/// Provider event envelope, discriminated on the `type` field.
/// Event types introduced after this was written decode as `Unknown`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "image_generation.partial_succeeded")]
    PartialSucceeded {
        url: String,
        revised_prompt: Option<String>,
        id: Option<String>,
        model: Option<String>,
        created: Option<i64>,
    },
    #[serde(rename = "image_generation.completed")]
    Completed { usage: UsageEvent },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct UsageEvent {
    #[serde(default)]
    generated_images: u32,
    #[serde(default)]
    output_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Accumulates incremental generation events into one response.
///
/// Images keep the arrival order of their `partial_succeeded` events. The
/// first such event seeds the response identity (id, model, created); later
/// events never overwrite it. Usage counters come from the `completed`
/// event, last writer wins.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    seeded: bool,
    id: Option<String>,
    model: Option<String>,
    created: Option<i64>,
    images: Vec<ImageData>,
    usage: Option<Usage>,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of the event stream.
    ///
    /// Empty lines, the `data: [DONE]` sentinel, lines without the data
    /// marker, and undecodable payloads are all skipped: a single bad line
    /// must not discard images that already arrived.
    pub fn process_line(&mut self, line: &str) {
        let line = line.trim();

        if line.is_empty() || line == DONE_SENTINEL {
            return;
        }

        let payload = match line.strip_prefix(DATA_PREFIX) {
            Some(payload) => payload,
            None => return,
        };

        let event = match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => event,
            Err(e) => {
                log::debug!("Skipping undecodable stream line: {}", e);
                return;
            }
        };

        match event {
            StreamEvent::PartialSucceeded {
                url,
                revised_prompt,
                id,
                model,
                created,
            } => {
                if !self.seeded {
                    self.seeded = true;
                    self.id = id;
                    self.model = model;
                    self.created = created;
                }

                self.images.push(ImageData {
                    url,
                    b64_json: None,
                    revised_prompt,
                });
            }
            StreamEvent::Completed { usage } => {
                self.usage = Some(Usage {
                    generated_images: usage.generated_images,
                    output_tokens: usage.output_tokens,
                    total_tokens: usage.total_tokens,
                });
            }
            StreamEvent::Unknown => {}
        }
    }

    /// Finalize the aggregation. A stream that produced no images is not a
    /// valid success, even if the provider sent a closing summary event.
    pub fn finish(self) -> Result<ImageGenerationResponse> {
        if self.images.is_empty() {
            return Err(ArkError::EmptyResult);
        }

        Ok(ImageGenerationResponse {
            id: self.id.unwrap_or_default(),
            object: "list".to_string(),
            created: self.created.unwrap_or_default(),
            model: self.model.unwrap_or_default(),
            data: self.images,
            usage: self.usage.unwrap_or_default(),
        })
    }
}

/// Drive a [`StreamAggregator`] over a stream of byte chunks, splitting on
/// newlines. Chunk boundaries need not align with line boundaries.
pub async fn aggregate<S, B, E>(mut stream: S) -> Result<ImageGenerationResponse>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut aggregator = StreamAggregator::new();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| ArkError::StreamError(format!("error reading event stream: {}", e)))?;
        buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));

        while let Some(newline) = buffer.find('\n') {
            let line: String = buffer.drain(..=newline).collect();
            aggregator.process_line(&line);
        }
    }

    if !buffer.trim().is_empty() {
        aggregator.process_line(&buffer);
    }

    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn partial_line(url: &str) -> String {
        format!(
            "data: {{\"type\":\"image_generation.partial_succeeded\",\"url\":\"{}\"}}",
            url
        )
    }

    #[test]
    fn test_images_follow_arrival_order() {
        let mut aggregator = StreamAggregator::new();
        aggregator.process_line(&partial_line("https://img/1.png"));
        aggregator.process_line(&partial_line("https://img/2.png"));
        aggregator.process_line(&partial_line("https://img/3.png"));
        aggregator.process_line("data: [DONE]");

        let response = aggregator.finish().unwrap();
        assert_eq!(response.data.len(), 3);
        assert_eq!(response.data[0].url, "https://img/1.png");
        assert_eq!(response.data[1].url, "https://img/2.png");
        assert_eq!(response.data[2].url, "https://img/3.png");
    }

    #[test]
    fn test_first_event_seeds_identity() {
        let mut aggregator = StreamAggregator::new();
        aggregator.process_line(
            "data: {\"type\":\"image_generation.partial_succeeded\",\"url\":\"https://img/1.png\",\
             \"id\":\"gen_1\",\"model\":\"doubao-seedream-4-0-250828\",\"created\":1720000000}",
        );
        aggregator.process_line(
            "data: {\"type\":\"image_generation.partial_succeeded\",\"url\":\"https://img/2.png\",\
             \"id\":\"gen_other\",\"model\":\"other-model\",\"created\":9}",
        );

        let response = aggregator.finish().unwrap();
        assert_eq!(response.id, "gen_1");
        assert_eq!(response.model, "doubao-seedream-4-0-250828");
        assert_eq!(response.created, 1720000000);
        assert_eq!(response.object, "list");
    }

    #[test]
    fn test_revised_prompt_captured() {
        let mut aggregator = StreamAggregator::new();
        aggregator.process_line(
            "data: {\"type\":\"image_generation.partial_succeeded\",\"url\":\"https://img/1.png\",\
             \"revised_prompt\":\"a bright red balloon in the sky\"}",
        );

        let response = aggregator.finish().unwrap();
        assert_eq!(
            response.data[0].revised_prompt.as_deref(),
            Some("a bright red balloon in the sky")
        );
    }

    #[test]
    fn test_completed_event_sets_usage() {
        let mut aggregator = StreamAggregator::new();
        aggregator.process_line(&partial_line("https://img/1.png"));
        aggregator.process_line(
            "data: {\"type\":\"image_generation.completed\",\"usage\":\
             {\"generated_images\":1,\"output_tokens\":4096,\"total_tokens\":4200}}",
        );

        let response = aggregator.finish().unwrap();
        assert_eq!(response.usage.generated_images, 1);
        assert_eq!(response.usage.output_tokens, 4096);
        assert_eq!(response.usage.total_tokens, 4200);
    }

    #[test]
    fn test_last_completed_event_wins() {
        let mut aggregator = StreamAggregator::new();
        aggregator.process_line(&partial_line("https://img/1.png"));
        aggregator.process_line(
            "data: {\"type\":\"image_generation.completed\",\"usage\":{\"generated_images\":1}}",
        );
        aggregator.process_line(
            "data: {\"type\":\"image_generation.completed\",\"usage\":\
             {\"generated_images\":2,\"output_tokens\":10,\"total_tokens\":12}}",
        );

        let response = aggregator.finish().unwrap();
        assert_eq!(response.usage.generated_images, 2);
        assert_eq!(response.usage.total_tokens, 12);
    }

    #[test]
    fn test_empty_stream_is_not_a_success() {
        let aggregator = StreamAggregator::new();
        assert!(matches!(aggregator.finish(), Err(ArkError::EmptyResult)));
    }

    #[test]
    fn test_completed_without_images_is_not_a_success() {
        let mut aggregator = StreamAggregator::new();
        aggregator.process_line(
            "data: {\"type\":\"image_generation.completed\",\"usage\":{\"generated_images\":0}}",
        );
        aggregator.process_line("data: [DONE]");
        assert!(matches!(aggregator.finish(), Err(ArkError::EmptyResult)));
    }

    #[test]
    fn test_malformed_line_between_valid_lines_is_tolerated() {
        let mut aggregator = StreamAggregator::new();
        aggregator.process_line(&partial_line("https://img/1.png"));
        aggregator.process_line("data: {not valid json");
        aggregator.process_line(&partial_line("https://img/2.png"));

        let response = aggregator.finish().unwrap();
        assert_eq!(response.data.len(), 2);
    }

    #[test]
    fn test_unknown_event_types_are_ignored() {
        let mut aggregator = StreamAggregator::new();
        aggregator.process_line("data: {\"type\":\"image_generation.queued\"}");
        aggregator.process_line(&partial_line("https://img/1.png"));
        aggregator.process_line("data: {\"type\":\"some.future.event\",\"payload\":42}");

        let response = aggregator.finish().unwrap();
        assert_eq!(response.data.len(), 1);
    }

    #[test]
    fn test_non_data_lines_are_skipped() {
        let mut aggregator = StreamAggregator::new();
        aggregator.process_line("");
        aggregator.process_line(": keep-alive");
        aggregator.process_line("event: message");
        aggregator.process_line(&partial_line("https://img/1.png"));

        let response = aggregator.finish().unwrap();
        assert_eq!(response.data.len(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_splits_chunks_across_line_boundaries() {
        let first = partial_line("https://img/1.png");
        let (head, tail) = first.split_at(30);
        let second = partial_line("https://img/2.png");

        let chunks: Vec<std::result::Result<Vec<u8>, Infallible>> = vec![
            Ok(head.as_bytes().to_vec()),
            Ok(format!("{}\n", tail).into_bytes()),
            Ok(format!("{}\ndata: [DONE]\n", second).into_bytes()),
        ];

        let response = aggregate(tokio_stream::iter(chunks)).await.unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].url, "https://img/1.png");
    }

    #[tokio::test]
    async fn test_aggregate_handles_missing_trailing_newline() {
        let chunks: Vec<std::result::Result<Vec<u8>, Infallible>> =
            vec![Ok(partial_line("https://img/1.png").into_bytes())];

        let response = aggregate(tokio_stream::iter(chunks)).await.unwrap();
        assert_eq!(response.data.len(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_surfaces_read_errors() {
        let chunks: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(format!("{}\n", partial_line("https://img/1.png")).into_bytes()),
            Err("connection reset".to_string()),
        ];

        let result = aggregate(tokio_stream::iter(chunks)).await;
        assert!(matches!(result, Err(ArkError::StreamError(_))));
    }
}
