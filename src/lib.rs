//! Spot-the-object detection client
//!
//! This crate turns a photographed image into a list of named,
//! confidence-scored objects for the spot-the-object game.
//!
//! # Architecture
//!
//! The detection pipeline is, leaf first:
//!
//! 1. **ImageEncoder**: raw image bytes to a bare base64 payload.
//! 2. **DetectionTransport**: one request to a multimodal completion endpoint.
//! 3. **ResponseParser**: tolerant extraction, strict per-record validation.
//! 4. **MockResultGenerator**: randomized plausible detections, no I/O.
//! 5. **DetectionService**: real-vs-mock selection and fallback policy.
//!
//! `DetectionService::detect` never fails from the caller's point of view.
//! When the real pipeline cannot run or breaks, the caller receives mock
//! detections with `success == false` and a human-readable `error`.
//!
//! # Module Structure
//!
//! - `detect`: the pipeline components and result types
//! - `config`: layered configuration (file, then environment)

pub mod config;
pub mod detect;

pub use config::{DetectorConfig, MockSettings};
pub use detect::{
    ApiKey, DetectError, DetectedObject, DetectionResult, DetectionService, DetectionTransport,
    ErrorKind, ExtractionStrategy, HttpTransport, ImageEncoder, JsonArrayParser,
    MockResultGenerator, Notice, Notifier, RawImage, ResponseParser, ServiceState,
    UpstreamSettings,
};
