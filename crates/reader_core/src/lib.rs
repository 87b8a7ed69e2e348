//! Core of the canvas reader
//!
//! This crate picks the canvas-like surface on a page that most likely
//! holds text, prepares its pixels for OCR, hands them to an OCR engine,
//! and writes the recognized text into the closest text field.

pub mod config;
pub mod error;
pub mod locate;
pub mod message;
pub mod ocr;
pub mod page;
pub mod preprocess;
pub mod reader;
pub mod select;
pub mod status;
pub mod store;
pub mod types;

pub use config::ReaderConfig;
pub use error::{NoCandidate, ReaderError};
pub use message::{ReadOutcome, ReaderRequest, ReaderResponse};
pub use ocr::{EngineEvent, OcrEngine, RecognitionRequest, RecognitionTask, TesseractEngine};
pub use page::{Page, PageHost};
pub use reader::{ReaderContext, ReaderHandle, ReaderState};
pub use status::{Status, StatusBoard, StatusSink};
pub use store::{JsonFileStore, MemoryResultStore, ResultSink};
pub use types::*;
