//! OCR module
//!
//! Defines the engine seam used by the reader and a baseline engine backed
//! by Tesseract (via leptess).
//!
//! A recognition is a [`RecognitionTask`]: a stream of [`EngineEvent`]s over
//! a single channel, zero or more progress updates followed by exactly one
//! `Done` or `Failed`. Sharing one channel keeps progress ordered before the
//! terminal event.

use crate::config::ReaderConfig;
use crate::types::{Recognition, RequestId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use leptess::{LepTess, Variable};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::mpsc;

/// Progress notification from an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Percent complete, 0-100
    pub progress: u8,
    /// Engine-defined phase description
    pub status: String,
}

/// Event emitted by a running recognition
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress(Progress),
    Done(Recognition),
    Failed(String),
}

/// Fixed recognition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    pub language: String,
    pub char_whitelist: String,
    pub page_seg_mode: u8,
}

impl RecognitionOptions {
    pub fn from_config(config: &ReaderConfig) -> Self {
        Self {
            language: config.language.clone(),
            char_whitelist: config.char_whitelist.clone(),
            page_seg_mode: config.page_seg_mode,
        }
    }

    /// Whether `c` may appear in recognized text
    pub fn allows(&self, c: char) -> bool {
        self.char_whitelist.is_empty() || self.char_whitelist.contains(c)
    }
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self::from_config(&ReaderConfig::default())
    }
}

/// A PNG image to recognize
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub id: RequestId,
    pub png: Vec<u8>,
    pub options: RecognitionOptions,
}

/// Receiving half of a recognition
pub struct RecognitionTask {
    id: RequestId,
    events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl RecognitionTask {
    /// Create a task and the reporter an engine uses to feed it
    pub fn channel(id: RequestId) -> (TaskReporter, Self) {
        let (tx, events) = mpsc::unbounded_channel();
        (TaskReporter { tx }, Self { id, events })
    }

    /// A task that has already failed
    pub fn failed(id: RequestId, message: impl Into<String>) -> Self {
        let (reporter, task) = Self::channel(id);
        reporter.failed(message);
        task
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Next event, or `None` once the engine side is gone
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }
}

/// Sending half of a recognition
///
/// `done` and `failed` consume the reporter, so a task sees at most one
/// terminal event.
pub struct TaskReporter {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl TaskReporter {
    pub fn progress(&self, progress: u8, status: impl Into<String>) {
        let _ = self.tx.send(EngineEvent::Progress(Progress {
            progress: progress.min(100),
            status: status.into(),
        }));
    }

    pub fn done(self, recognition: Recognition) {
        let _ = self.tx.send(EngineEvent::Done(recognition));
    }

    pub fn failed(self, message: impl Into<String>) {
        let _ = self.tx.send(EngineEvent::Failed(message.into()));
    }
}

/// An OCR engine reachable through an asynchronous request/response channel
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short name for logs and status text
    fn name(&self) -> &str;

    fn is_ready(&self) -> bool;

    /// Load models or check connectivity. May be retried after a failure.
    async fn initialize(&mut self) -> Result<()>;

    /// Start recognizing an image. Must be called from within a tokio runtime.
    fn recognize(&self, request: RecognitionRequest) -> RecognitionTask;
}

/// Tesseract engine
///
/// leptess handles are not `Send`, so each recognition creates its own
/// instance on the blocking pool.
pub struct TesseractEngine {
    tessdata_dir: Option<String>,
    language: String,
    ready: bool,
}

impl TesseractEngine {
    pub fn new(tessdata_dir: Option<&Path>, language: impl Into<String>) -> Self {
        Self {
            tessdata_dir: tessdata_dir.map(|dir| dir.to_string_lossy().into_owned()),
            language: language.into(),
            ready: false,
        }
    }

    pub fn from_config(config: &ReaderConfig) -> Self {
        Self::new(config.tessdata_dir.as_deref(), config.language.clone())
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn initialize(&mut self) -> Result<()> {
        let data_path = self.tessdata_dir.clone();
        let language = self.language.clone();

        tokio::task::spawn_blocking(move || {
            LepTess::new(data_path.as_deref(), &language)
                .map(drop)
                .context("Failed to initialize Tesseract. Is Tesseract installed?")
        })
        .await
        .context("Tesseract initialization task panicked")??;

        self.ready = true;
        tracing::info!(language = %self.language, "Tesseract initialized");
        Ok(())
    }

    fn recognize(&self, request: RecognitionRequest) -> RecognitionTask {
        if !self.ready {
            return RecognitionTask::failed(request.id, "Tesseract engine not initialized");
        }

        let (reporter, task) = RecognitionTask::channel(request.id);
        let data_path = self.tessdata_dir.clone();

        tokio::task::spawn_blocking(move || {
            reporter.progress(0, "recognizing text");
            match extract_text_tesseract(data_path.as_deref(), &request) {
                Ok(recognition) => {
                    reporter.progress(100, "recognizing text");
                    reporter.done(recognition);
                }
                Err(e) => reporter.failed(format!("{:#}", e)),
            }
        });

        task
    }
}

/// Run Tesseract on a PNG with the request's whitelist and segmentation mode
///
/// # Errors
/// * Returns error if Tesseract is not installed or OCR fails
pub fn extract_text_tesseract(
    data_path: Option<&str>,
    request: &RecognitionRequest,
) -> Result<Recognition> {
    let options = &request.options;
    let mut tesseract = LepTess::new(data_path, &options.language)
        .context("Failed to initialize Tesseract. Is Tesseract installed?")?;

    tesseract
        .set_variable(Variable::TesseditCharWhitelist, &options.char_whitelist)
        .context("Failed to set Tesseract character whitelist")?;
    tesseract
        .set_variable(
            Variable::TesseditPagesegMode,
            &options.page_seg_mode.to_string(),
        )
        .context("Failed to set Tesseract page segmentation mode")?;

    tesseract
        .set_image_from_mem(&request.png)
        .context("Failed to load image into Tesseract")?;

    let text = tesseract
        .get_utf8_text()
        .context("Failed to extract text from image")?;
    let confidence = tesseract.mean_text_conf();

    Ok(Recognition {
        text,
        confidence: Some(confidence as f32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::encode_png;
    use image::{ImageBuffer, Rgba};

    #[tokio::test]
    async fn test_events_arrive_in_send_order() {
        let (reporter, mut task) = RecognitionTask::channel(RequestId::new());
        reporter.progress(0, "loading");
        reporter.progress(50, "recognizing");
        reporter.progress(100, "recognizing");
        reporter.done(Recognition::new("XY9"));

        let mut seen = Vec::new();
        while let Some(event) = task.next_event().await {
            seen.push(event);
        }
        assert_eq!(seen.len(), 4);
        assert!(matches!(&seen[1], EngineEvent::Progress(p) if p.progress == 50));
        assert_eq!(seen[3], EngineEvent::Done(Recognition::new("XY9")));
    }

    #[tokio::test]
    async fn test_progress_is_clamped() {
        let (reporter, mut task) = RecognitionTask::channel(RequestId::new());
        reporter.progress(250, "odd engine");
        drop(reporter);
        match task.next_event().await {
            Some(EngineEvent::Progress(p)) => assert_eq!(p.progress, 100),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(task.next_event().await.is_none());
    }

    #[test]
    fn test_options_whitelist() {
        let options = RecognitionOptions::default();
        assert_eq!(options.page_seg_mode, 7);
        assert!(options.allows('&'));
        assert!(options.allows('z'));
        assert!(!options.allows('-'));
        assert!(!options.allows(' '));
    }

    #[tokio::test]
    async fn test_uninitialized_tesseract_fails_task() {
        let engine = TesseractEngine::new(None, "eng");
        let request = RecognitionRequest {
            id: RequestId::new(),
            png: Vec::new(),
            options: RecognitionOptions::default(),
        };
        let mut task = engine.recognize(request);
        match task.next_event().await {
            Some(EngineEvent::Failed(msg)) => assert!(msg.contains("not initialized")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tesseract_blank_image() {
        // Passes with or without a Tesseract install; without one the error
        // must say what is missing
        let mut engine = TesseractEngine::new(None, "eng");
        match engine.initialize().await {
            Ok(()) => {
                let img = ImageBuffer::from_pixel(100, 40, Rgba([255u8, 255, 255, 255]));
                let request = RecognitionRequest {
                    id: RequestId::new(),
                    png: encode_png(&img).unwrap(),
                    options: RecognitionOptions::default(),
                };
                let mut task = engine.recognize(request);
                let mut terminal = None;
                while let Some(event) = task.next_event().await {
                    if !matches!(event, EngineEvent::Progress(_)) {
                        terminal = Some(event);
                    }
                }
                match terminal {
                    Some(EngineEvent::Done(recognition)) => {
                        assert!(recognition.text.trim().is_empty())
                    }
                    other => panic!("unexpected terminal event: {:?}", other),
                }
            }
            Err(e) => {
                let msg = format!("{:#}", e).to_lowercase();
                assert!(msg.contains("tesseract"));
                assert!(!engine.is_ready());
            }
        }
    }
}
