//! Read orchestration
//!
//! [`ReaderContext`] drives one read at a time through
//! `Idle -> Selecting -> Preprocessing -> Recognizing -> Reporting -> Idle`.
//! Every failure is recovered here and reported through the status sink;
//! a read always ends back in `Idle`.
//!
//! [`ReaderHandle`] shares a context between callers and rejects a read
//! that arrives while another is still running.

use crate::config::ReaderConfig;
use crate::error::ReaderError;
use crate::locate::find_nearest_field;
use crate::message::{ReadOutcome, ReaderRequest, ReaderResponse};
use crate::ocr::{EngineEvent, OcrEngine, RecognitionOptions, RecognitionRequest};
use crate::page::PageHost;
use crate::preprocess::preprocess_surface;
use crate::select::select_target;
use crate::status::{Status, StatusSink};
use crate::store::{MemoryResultStore, ResultSink};
use crate::types::{ExtractedText, Recognition, RequestId};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Where a read currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Selecting,
    Preprocessing,
    Recognizing,
    Reporting,
}

/// Everything a read needs, owned by whoever drives the reader
pub struct ReaderContext {
    engine: Box<dyn OcrEngine>,
    status: Box<dyn StatusSink>,
    results: Box<dyn ResultSink>,
    config: ReaderConfig,
    state: ReaderState,
    last_result: MemoryResultStore,
}

impl ReaderContext {
    pub fn new(
        engine: Box<dyn OcrEngine>,
        status: Box<dyn StatusSink>,
        results: Box<dyn ResultSink>,
        config: ReaderConfig,
    ) -> Self {
        Self {
            engine,
            status,
            results,
            config,
            state: ReaderState::Idle,
            last_result: MemoryResultStore::new(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Last successful extraction of this context
    pub fn last_result(&self) -> Option<ExtractedText> {
        self.last_result.latest()
    }

    /// Initialize the engine now instead of on the first read
    pub async fn warm_up(&mut self) -> Result<(), ReaderError> {
        self.ensure_engine().await
    }

    /// Forget the last result, both here and in the result sink
    pub fn clear_last_result(&mut self) -> anyhow::Result<()> {
        self.last_result.clear()?;
        self.results.clear()?;
        self.status.show(Status::Cleared);
        Ok(())
    }

    /// Read the best surface on `page` and fill the nearest field
    pub async fn read(&mut self, page: &mut dyn PageHost) -> ReadOutcome {
        let outcome = match self.run(page).await {
            Ok(outcome) => outcome,
            Err(error) => self.recover(error),
        };
        self.transition(ReaderState::Idle);
        outcome
    }

    async fn run(&mut self, page: &mut dyn PageHost) -> Result<ReadOutcome, ReaderError> {
        self.ensure_engine().await?;

        self.transition(ReaderState::Selecting);
        let viewport = page.viewport();
        let target = select_target(page.surfaces(), &viewport, self.config.min_surface_size)
            .map_err(ReaderError::NoCandidate)?;
        self.status.show(Status::Reading);

        self.transition(ReaderState::Preprocessing);
        let prepared = preprocess_surface(target, &self.config)?;
        tracing::debug!(
            node = target.node.0,
            width = prepared.pixels.width(),
            height = prepared.pixels.height(),
            "prepared surface"
        );

        self.transition(ReaderState::Recognizing);
        let recognition = self.recognize(prepared.png).await?;

        self.transition(ReaderState::Reporting);
        let text = recognition.text.trim();
        if text.is_empty() {
            return Err(ReaderError::EmptyResult);
        }

        let extracted = ExtractedText::now(text);
        if let Err(e) = self.last_result.store(&extracted) {
            tracing::warn!("failed to cache result: {:#}", e);
        }
        if let Err(e) = self.results.store(&extracted) {
            tracing::warn!("failed to store result: {:#}", e);
        }

        let destination = find_nearest_field(page.tree(), target, page.fields()).map(|f| f.node);
        let highlight = self.config.highlight_duration;
        match destination {
            Some(node) if page.fill_field(node, text, highlight) => {
                tracing::info!(field = node.0, "filled field with extracted text");
                self.status.show(Status::Filled {
                    text: text.to_string(),
                });
                Ok(ReadOutcome::Filled {
                    text: text.to_string(),
                    field: node,
                })
            }
            _ => {
                tracing::info!("extracted text but found no field to fill");
                self.status.show(Status::ExtractedNoDestination);
                Ok(ReadOutcome::Extracted {
                    text: text.to_string(),
                })
            }
        }
    }

    /// Initialize the engine if needed; a failed attempt is retried next time
    async fn ensure_engine(&mut self) -> Result<(), ReaderError> {
        if self.engine.is_ready() {
            return Ok(());
        }

        let engine = self.engine.name().to_string();
        self.status.show(Status::LoadingEngine {
            engine: engine.clone(),
        });

        match self.engine.initialize().await {
            Ok(()) => {
                self.status.show(Status::EngineReady { engine });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(engine = %engine, "engine initialization failed: {:#}", e);
                self.status.show(Status::EngineFailed { engine });
                Err(ReaderError::EngineUnavailable(format!("{:#}", e)))
            }
        }
    }

    async fn recognize(&mut self, png: Vec<u8>) -> Result<Recognition, ReaderError> {
        self.status.show(Status::Extracting {
            engine: self.engine.name().to_string(),
        });

        let request = RecognitionRequest {
            id: RequestId::new(),
            png,
            options: RecognitionOptions::from_config(&self.config),
        };
        let mut task = self.engine.recognize(request);
        let id = task.id();

        while let Some(event) = task.next_event().await {
            match event {
                EngineEvent::Progress(progress) => {
                    tracing::debug!(request = %id.0, progress = progress.progress, "{}", progress.status);
                    self.status.show(Status::Progress(progress));
                }
                EngineEvent::Done(recognition) => return Ok(recognition),
                EngineEvent::Failed(message) => return Err(ReaderError::RecognitionFailure(message)),
            }
        }

        Err(ReaderError::RecognitionFailure(
            "engine closed the request without a result".to_string(),
        ))
    }

    fn recover(&mut self, error: ReaderError) -> ReadOutcome {
        match error {
            ReaderError::NoCandidate(reason) => {
                tracing::info!(?reason, "no surface to read");
                self.status.show(Status::NoCandidate(reason));
                ReadOutcome::NoCandidate { reason }
            }
            ReaderError::EmptyResult => {
                tracing::info!("recognition returned no text");
                self.status.show(Status::NoTextDetected);
                ReadOutcome::NoTextDetected
            }
            // Status was already shown during initialization
            ReaderError::EngineUnavailable(message) => ReadOutcome::EngineUnavailable { message },
            error @ (ReaderError::RecognitionFailure(_)
            | ReaderError::Preprocess(_)
            | ReaderError::Busy) => {
                tracing::warn!("error processing canvas: {}", error);
                self.status.show(Status::ExtractionFailed);
                ReadOutcome::RecognitionFailed {
                    message: error.to_string(),
                }
            }
        }
    }

    fn transition(&mut self, next: ReaderState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "reader state");
            self.state = next;
        }
    }
}

/// Shared access to a [`ReaderContext`] with a reject-when-busy policy
#[derive(Clone)]
pub struct ReaderHandle {
    context: Arc<Mutex<ReaderContext>>,
    last_result: MemoryResultStore,
}

impl ReaderHandle {
    pub fn new(context: ReaderContext) -> Self {
        let last_result = context.last_result.clone();
        Self {
            context: Arc::new(Mutex::new(context)),
            last_result,
        }
    }

    /// Last successful extraction; never waits on a running read
    pub fn last_result(&self) -> Option<ExtractedText> {
        self.last_result.latest()
    }

    /// Run a read, or fail with [`ReaderError::Busy`] if one is in flight
    pub async fn read(&self, page: &mut dyn PageHost) -> Result<ReadOutcome, ReaderError> {
        let mut context = self.context.try_lock().map_err(|_| ReaderError::Busy)?;
        Ok(context.read(page).await)
    }

    pub async fn handle(&self, request: ReaderRequest, page: &mut dyn PageHost) -> ReaderResponse {
        match request {
            ReaderRequest::Ping => ReaderResponse::Ready,
            ReaderRequest::GetLastText => ReaderResponse::LastText {
                text: self.last_result(),
            },
            ReaderRequest::ReadCanvas => match self.read(page).await {
                Ok(outcome) => ReaderResponse::ReadFinished { outcome },
                Err(_) => ReaderResponse::Busy,
            },
            ReaderRequest::ClearText => match self.context.try_lock() {
                Ok(mut context) => {
                    if let Err(e) = context.clear_last_result() {
                        tracing::warn!("failed to clear result: {:#}", e);
                    }
                    ReaderResponse::Cleared
                }
                Err(_) => ReaderResponse::Busy,
            },
        }
    }
}
