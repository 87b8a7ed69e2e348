//! Vision model OCR engine
//!
//! Sends the prepared PNG to an Ollama vision model and keeps only the
//! characters the request allows.

use crate::ollama::{ChatMessage, ChatOptions, ChatRequest, OllamaClient, OllamaConfig};
use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reader_core::ocr::{OcrEngine, RecognitionOptions, RecognitionRequest, RecognitionTask};
use reader_core::Recognition;

/// OCR engine backed by a local vision model
pub struct VisionOcrEngine {
    client: OllamaClient,
    ready: bool,
}

impl VisionOcrEngine {
    /// Create a new vision engine
    pub fn new(client: OllamaClient) -> Self {
        Self {
            client,
            ready: false,
        }
    }

    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        Ok(Self::new(OllamaClient::new(config)?))
    }

    fn model(&self) -> &str {
        &self.client.config().model
    }
}

#[async_trait]
impl OcrEngine for VisionOcrEngine {
    fn name(&self) -> &str {
        "vision model"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn initialize(&mut self) -> Result<()> {
        let models = self.client.list_models().await?;
        let wanted = self.model().to_string();
        // Ollama lists untagged models with an implicit ":latest"
        let available = models
            .iter()
            .any(|m| *m == wanted || m.strip_suffix(":latest") == Some(wanted.as_str()));
        if !available {
            anyhow::bail!("model {} is not pulled (ollama pull {})", wanted, wanted);
        }

        self.ready = true;
        tracing::info!(model = %wanted, "vision model ready");
        Ok(())
    }

    fn recognize(&self, request: RecognitionRequest) -> RecognitionTask {
        if !self.ready {
            return RecognitionTask::failed(request.id, "vision model not initialized");
        }

        let (reporter, task) = RecognitionTask::channel(request.id);
        let client = self.client.clone();
        let chat = build_chat_request(self.model(), &request);

        tokio::spawn(async move {
            reporter.progress(0, "recognizing text");
            match client.chat(chat).await {
                Ok(response) => {
                    reporter.progress(100, "recognizing text");
                    let text = clean_reply(&response.message.content, &request.options);
                    reporter.done(Recognition::new(text));
                }
                Err(e) => reporter.failed(format!("{:#}", e)),
            }
        });

        task
    }
}

fn build_chat_request(model: &str, request: &RecognitionRequest) -> ChatRequest {
    let image_b64 = general_purpose::STANDARD.encode(&request.png);

    let prompt = format!(
        r#"This image contains a single line of text on a plain background.
Transcribe it exactly. Use only these characters: {}
Return only the text, with no explanation. If there is no text, return nothing."#,
        request.options.char_whitelist
    );

    ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: prompt,
            images: Some(vec![image_b64]),
        }],
        stream: Some(false),
        options: Some(ChatOptions { temperature: 0.0 }),
    }
}

/// Keep the first non-empty line, filtered to allowed characters
fn clean_reply(reply: &str, options: &RecognitionOptions) -> String {
    reply
        .lines()
        .map(|line| line.chars().filter(|&c| options.allows(c)).collect::<String>())
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reader_core::ocr::EngineEvent;
    use reader_core::RequestId;

    fn request() -> RecognitionRequest {
        RecognitionRequest {
            id: RequestId::new(),
            png: vec![1, 2, 3],
            options: RecognitionOptions::default(),
        }
    }

    #[test]
    fn test_clean_reply() {
        let options = RecognitionOptions::default();
        assert_eq!(clean_reply("AB12", &options), "AB12");
        assert_eq!(clean_reply("`X-Y 9`\nnote: blurry", &options), "XY9");
        assert_eq!(clean_reply("\n  \n", &options), "");
    }

    #[test]
    fn test_chat_request_carries_image() {
        let chat = build_chat_request("llava:13b", &request());
        assert_eq!(chat.model, "llava:13b");
        assert_eq!(chat.messages[0].images, Some(vec!["AQID".to_string()]));
        assert!(chat.messages[0].content.contains("0123456789&"));
    }

    #[tokio::test]
    async fn test_recognize_before_initialize_fails() {
        let engine = VisionOcrEngine::new(OllamaClient::default_client().unwrap());
        let mut task = engine.recognize(request());
        match task.next_event().await {
            Some(EngineEvent::Failed(msg)) => assert!(msg.contains("not initialized")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_initialize_unreachable_server() {
        let config = OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..OllamaConfig::default()
        };
        let mut engine = VisionOcrEngine::from_config(config).unwrap();
        assert!(engine.initialize().await.is_err());
        assert!(!engine.is_ready());
    }
}
