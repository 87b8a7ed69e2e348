//! LLM Bridge for Ollama integration
//!
//! Provides an OCR engine backed by a local vision model served through
//! the Ollama HTTP API, as an alternative to Tesseract.
//!
//! Copyright (c) 2025 Michael A Wright

pub mod ollama;
pub mod vision;

pub use ollama::{OllamaClient, OllamaConfig};
pub use vision::VisionOcrEngine;
