//! Detection orchestration: real-vs-mock selection and fallback policy.
//!
//! `detect` always hands the caller something to render. Either the whole
//! real pipeline (encode, send, parse) succeeds, or the caller receives a
//! complete mock substitute flagged with `success == false`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::credential::ApiKey;
use super::encoder::{ImageEncoder, RawImage};
use super::error::DetectError;
use super::mock::MockResultGenerator;
use super::notify::{LogNotifier, Notice, Notifier};
use super::parser::{JsonArrayParser, ResponseParser};
use super::result::{DetectedObject, DetectionResult};
use super::transport::{DetectionTransport, HttpTransport, UpstreamSettings};
use crate::config::DetectorConfig;

/// Simulated latency of the unconfigured path.
pub const DEFAULT_MOCK_DELAY: Duration = Duration::from_millis(1500);

/// Instruction sent with every image.
pub const DETECTION_INSTRUCTION: &str = "Analiza esta imagen y detecta todos los objetos visibles.
Devuelve ÚNICAMENTE un array JSON con objetos que tengan las propiedades 'name' (en español) y 'confidence' (número entre 0 y 1).
Ejemplo: [{\"name\": \"pelota\", \"confidence\": 0.95}, {\"name\": \"mesa\", \"confidence\": 0.87}]
No incluyas explicaciones adicionales, solo el JSON.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    /// No usable credential; every call takes the mock path.
    Unconfigured,
    /// Calls attempt the real path and fall back to mock on failure.
    Configured,
}

pub struct DetectionService {
    transport: Option<Box<dyn DetectionTransport>>,
    encoder: ImageEncoder,
    parser: Box<dyn ResponseParser>,
    mock: MockResultGenerator,
    notifier: Arc<dyn Notifier>,
    mock_delay: Duration,
    instruction: String,
}

impl DetectionService {
    /// Configured iff `credential` is present, non-blank and not the
    /// placeholder sentinel. The transport is discarded otherwise.
    ///
    /// `credential` only gates; `transport` authenticates itself. Use
    /// [`DetectionService::http`] when the credential is also the key to send.
    pub fn new<T: DetectionTransport + 'static>(credential: Option<&str>, transport: T) -> Self {
        match credential.and_then(ApiKey::new) {
            Some(_) => Self::with_transport(Some(Box::new(transport))),
            None => Self::unconfigured(),
        }
    }

    /// HTTP-backed service whose bearer key is `credential`, so the reported
    /// state and the key on the wire come from the same value.
    pub fn http(credential: Option<&str>, settings: UpstreamSettings) -> Self {
        match credential.and_then(ApiKey::new) {
            Some(key) => Self::with_transport(Some(Box::new(HttpTransport::new(settings, key)))),
            None => Self::unconfigured(),
        }
    }

    /// Service that always answers from the mock generator.
    pub fn unconfigured() -> Self {
        log::warn!("upstream API key not configured; using mock detection");
        Self::with_transport(None)
    }

    /// Build the HTTP-backed service described by `config`.
    pub fn from_config(config: &DetectorConfig) -> Self {
        let service = match &config.api_key {
            Some(key) => Self::with_transport(Some(Box::new(HttpTransport::new(
                config.upstream.clone(),
                key.clone(),
            )))),
            None => Self::unconfigured(),
        };
        let mock = MockResultGenerator::new()
            .with_count_range(config.mock.min_objects, config.mock.max_objects)
            .with_min_confidence(config.mock.min_confidence);
        service
            .with_mock_generator(mock)
            .with_mock_delay(config.mock.delay)
    }

    fn with_transport(transport: Option<Box<dyn DetectionTransport>>) -> Self {
        Self {
            transport,
            encoder: ImageEncoder::new(),
            parser: Box::new(JsonArrayParser::default()),
            mock: MockResultGenerator::new(),
            notifier: Arc::new(LogNotifier),
            mock_delay: DEFAULT_MOCK_DELAY,
            instruction: DETECTION_INSTRUCTION.to_string(),
        }
    }

    pub fn with_parser<P: ResponseParser + 'static>(mut self, parser: P) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn with_mock_generator(mut self, mock: MockResultGenerator) -> Self {
        self.mock = mock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_encoder(mut self, encoder: ImageEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Latency applied on the unconfigured path. Zero disables it.
    pub fn with_mock_delay(mut self, delay: Duration) -> Self {
        self.mock_delay = delay;
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn state(&self) -> ServiceState {
        if self.transport.is_some() {
            ServiceState::Configured
        } else {
            ServiceState::Unconfigured
        }
    }

    /// Diagnostic predicate; `detect` gates itself.
    pub fn is_configured(&self) -> bool {
        self.state() == ServiceState::Configured
    }

    /// Detect objects in `image`. Never fails and never returns an empty
    /// object list.
    pub fn detect(&self, image: RawImage) -> DetectionResult {
        let Some(transport) = self.transport.as_deref() else {
            if !self.mock_delay.is_zero() {
                std::thread::sleep(self.mock_delay);
            }
            return DetectionResult::detected(self.mock.generate());
        };

        match self.detect_real(transport, image) {
            Ok(objects) => {
                log::info!(
                    "detected {} object(s) via {} transport",
                    objects.len(),
                    transport.name()
                );
                DetectionResult::detected(objects)
            }
            Err(err) => {
                log::error!("object detection failed ({:?}): {}", err.kind(), err);
                self.notifier.notify(Notice::simulated_detection());
                let objects = self.mock.generate();
                log::info!("substituted {} simulated object(s)", objects.len());
                DetectionResult::fallback(objects, err.to_string())
            }
        }
    }

    fn detect_real(
        &self,
        transport: &dyn DetectionTransport,
        image: RawImage,
    ) -> Result<Vec<DetectedObject>, DetectError> {
        let encoded = self.encoder.encode(image)?;
        let raw = transport.send(&encoded, &self.instruction)?;
        self.parser.parse(&raw).inspect_err(|_| {
            log::debug!("raw upstream content ({}): {}", self.parser.name(), raw);
        })
    }
}

impl fmt::Debug for DetectionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionService")
            .field("state", &self.state())
            .field("transport", &self.transport.as_ref().map(|t| t.name()))
            .field("parser", &self.parser.name())
            .field("mock", &self.mock)
            .field("mock_delay", &self.mock_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::credential::PLACEHOLDER_API_KEY;
    use crate::detect::encoder::EncodedImage;
    use crate::detect::notify::{ChannelNotifier, Severity};
    use crate::detect::parser::ExtractionStrategy;
    use std::io::{self, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    struct FakeTransport {
        calls: Arc<AtomicUsize>,
        reply: fn() -> Result<String, DetectError>,
    }

    impl FakeTransport {
        fn new(reply: fn() -> Result<String, DetectError>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    reply,
                },
                calls,
            )
        }
    }

    impl DetectionTransport for FakeTransport {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn send(&self, image: &EncodedImage, instruction: &str) -> Result<String, DetectError> {
            assert!(!image.payload().is_empty());
            assert!(instruction.contains("JSON"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)()
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "camera gone"))
        }
    }

    fn image() -> RawImage {
        RawImage::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
    }

    fn good_reply() -> Result<String, DetectError> {
        Ok(r#"Claro: [{"name": "pelota", "confidence": 0.95}, {"name": "libro", "confidence": 0.8}]"#.to_string())
    }

    fn rate_limited() -> Result<String, DetectError> {
        Err(DetectError::status(429, "Rate limit reached"))
    }

    fn garbage_reply() -> Result<String, DetectError> {
        Ok("I cannot help with that.".to_string())
    }

    fn configured(
        reply: fn() -> Result<String, DetectError>,
    ) -> (DetectionService, Arc<AtomicUsize>) {
        let (transport, calls) = FakeTransport::new(reply);
        (DetectionService::new(Some("sk-test"), transport), calls)
    }

    #[test]
    fn placeholder_or_missing_key_never_touches_transport() {
        for credential in [None, Some(""), Some(PLACEHOLDER_API_KEY)] {
            let (transport, calls) = FakeTransport::new(good_reply);
            let service =
                DetectionService::new(credential, transport).with_mock_delay(Duration::ZERO);
            assert_eq!(service.state(), ServiceState::Unconfigured);

            let result = service.detect(image());
            assert!(result.success);
            assert!(result.error.is_none());
            assert!((8..=12).contains(&result.objects.len()));
            assert!(result
                .objects
                .iter()
                .all(|o| o.confidence() >= 0.7 && o.confidence() < 1.0));
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn successful_real_call_returns_parsed_objects() {
        let (service, calls) = configured(good_reply);
        assert!(service.is_configured());
        let result = service.detect(image());
        assert!(result.success);
        assert!(result.error.is_none());
        let names: Vec<_> = result.objects.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["pelota", "libro"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transport_failure_falls_back_and_notifies_once() {
        let (tx, rx) = mpsc::channel();
        let (service, calls) = configured(rate_limited);
        let service = service.with_notifier(Arc::new(ChannelNotifier::new(tx)));

        let result = service.detect(image());
        assert!(!result.success);
        assert!((8..=12).contains(&result.objects.len()));
        assert_eq!(
            result.error.as_deref(),
            Some("API Error: 429 - Rate limit reached")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let notice = rx.try_recv().expect("notice");
        assert_eq!(notice.severity, Severity::Destructive);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn parse_failure_falls_back_with_parse_message() {
        let (service, _) = configured(garbage_reply);
        let result = service.detect(image());
        assert!(!result.success);
        assert!(!result.objects.is_empty());
        let error = result.error.expect("error");
        assert!(error.starts_with("Failed to parse AI response"), "{}", error);
    }

    #[test]
    fn encoding_failure_skips_transport() {
        let (service, calls) = configured(good_reply);
        let result = service.detect(RawImage::from_reader(BrokenReader));
        assert!(!result.success);
        assert!(!result.objects.is_empty());
        assert!(result.error.expect("error").contains("camera gone"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn configured_encoder_limit_is_enforced_before_sending() {
        let (service, calls) = configured(good_reply);
        let service = service.with_encoder(ImageEncoder::new().with_max_bytes(4));
        let result = service.detect(image());
        assert!(!result.success);
        assert!(result
            .error
            .expect("error")
            .starts_with("image encoding failed"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn custom_parser_and_mock_are_used() {
        let (transport, _) = FakeTransport::new(|| {
            Ok("```json\n[{\"name\": \"taza\", \"confidence\": 0.5}]\n```".to_string())
        });
        let service = DetectionService::new(Some("sk-test"), transport)
            .with_parser(JsonArrayParser::new(ExtractionStrategy::FencedBlock))
            .with_mock_generator(MockResultGenerator::new().with_vocabulary(["solo"]));
        let result = service.detect(image());
        assert!(result.success);
        assert_eq!(result.objects[0].name(), "taza");

        let (service, _) = configured(rate_limited);
        let service = service
            .with_mock_generator(MockResultGenerator::new().with_vocabulary(["solo"]));
        let result = service.detect(image());
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.objects[0].name(), "solo");
    }

    #[test]
    fn service_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DetectionService>();

        let (service, calls) = configured(good_reply);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| assert!(service.detect(image()).success));
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
