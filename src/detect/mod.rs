mod credential;
mod encoder;
mod error;
mod mock;
mod notify;
mod parser;
mod result;
mod service;
mod transport;

pub use credential::{ApiKey, PLACEHOLDER_API_KEY};
pub use encoder::{EncodedImage, ImageEncoder, RawImage, MAX_IMAGE_BYTES};
pub use error::{DetectError, ErrorKind, EMPTY_CONTENT_MESSAGE};
pub use mock::{
    MockResultGenerator, DEFAULT_MAX_OBJECTS, DEFAULT_MIN_CONFIDENCE, DEFAULT_MIN_OBJECTS,
    DEFAULT_VOCABULARY,
};
pub use notify::{ChannelNotifier, LogNotifier, Notice, Notifier, Severity};
pub use parser::{ExtractionStrategy, JsonArrayParser, ParseReport, ResponseParser};
pub use result::{DetectedObject, DetectionResult};
pub use service::{DetectionService, ServiceState, DEFAULT_MOCK_DELAY, DETECTION_INSTRUCTION};
pub use transport::{
    DetectionTransport, HttpTransport, ImageDetail, UpstreamSettings, DEFAULT_API_URL,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};
