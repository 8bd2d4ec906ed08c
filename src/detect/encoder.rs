//! Image payload encoding for the upstream request.
//!
//! The encoder turns a raw image (bytes, file, reader, or an existing data
//! URI) into a bare base64 payload. Container prefixes such as
//! `data:image/png;base64,` are stripped; the mime type is kept separately so
//! the transport can rebuild the URI it sends.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::error::DetectError;

/// Upper bound on raw image size accepted for upload.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_MIME: &str = "image/jpeg";

/// A photographed image handed to `detect`.
pub struct RawImage {
    source: ImageSource,
}

enum ImageSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
    DataUri(String),
}

impl RawImage {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: ImageSource::Bytes(bytes.into()),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ImageSource::Path(path.into()),
        }
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            source: ImageSource::Reader(Box::new(reader)),
        }
    }

    /// An already-encoded `data:<mime>;base64,<payload>` string.
    pub fn from_data_uri(uri: impl Into<String>) -> Self {
        Self {
            source: ImageSource::DataUri(uri.into()),
        }
    }

    /// Short description for logs; never includes image content.
    pub fn describe(&self) -> String {
        match &self.source {
            ImageSource::Bytes(bytes) => format!("{} bytes in memory", bytes.len()),
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Reader(_) => "stream".to_string(),
            ImageSource::DataUri(uri) => format!("data uri ({} chars)", uri.len()),
        }
    }
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("source", &self.describe())
            .finish()
    }
}

/// Transport-safe image: bare base64 payload plus its mime type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    payload: String,
    mime: String,
}

impl EncodedImage {
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.payload)
    }
}

#[derive(Clone, Debug)]
pub struct ImageEncoder {
    max_bytes: usize,
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEncoder {
    pub fn new() -> Self {
        Self {
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Encode an image. Read failures (missing file, truncated stream) are
    /// `DetectError::Encoding` and are not retried.
    pub fn encode(&self, image: RawImage) -> Result<EncodedImage, DetectError> {
        match image.source {
            ImageSource::Bytes(bytes) => self.encode_bytes(&bytes),
            ImageSource::Path(path) => {
                let file = File::open(&path).map_err(|e| {
                    DetectError::encoding(format!("open {}: {}", path.display(), e))
                })?;
                let bytes = self.read_bounded(file)?;
                self.encode_bytes(&bytes)
            }
            ImageSource::Reader(reader) => {
                let bytes = self.read_bounded(reader)?;
                self.encode_bytes(&bytes)
            }
            ImageSource::DataUri(uri) => self.encode_data_uri(&uri),
        }
    }

    fn read_bounded<R: Read>(&self, reader: R) -> Result<Vec<u8>, DetectError> {
        let mut bytes = Vec::new();
        reader
            .take(self.max_bytes as u64 + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| DetectError::encoding(format!("read image: {}", e)))?;
        Ok(bytes)
    }

    fn encode_bytes(&self, bytes: &[u8]) -> Result<EncodedImage, DetectError> {
        self.check_size(bytes.len())?;
        Ok(EncodedImage {
            payload: STANDARD.encode(bytes),
            mime: sniff_mime(bytes).to_string(),
        })
    }

    fn encode_data_uri(&self, uri: &str) -> Result<EncodedImage, DetectError> {
        let (header, payload) = uri
            .trim()
            .split_once(',')
            .ok_or_else(|| DetectError::encoding("data uri has no payload separator"))?;
        let header = header
            .strip_prefix("data:")
            .ok_or_else(|| DetectError::encoding("data uri must start with 'data:'"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| DetectError::encoding("data uri is not base64 encoded"))?;

        let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| DetectError::encoding(format!("invalid base64 payload: {}", e)))?;
        self.check_size(decoded.len())?;

        let mime = if mime.is_empty() {
            sniff_mime(&decoded).to_string()
        } else {
            mime.to_string()
        };
        Ok(EncodedImage { payload, mime })
    }

    fn check_size(&self, len: usize) -> Result<(), DetectError> {
        if len == 0 {
            return Err(DetectError::encoding("image is empty"));
        }
        if len > self.max_bytes {
            return Err(DetectError::encoding(format!(
                "image exceeds {} bytes",
                self.max_bytes
            )));
        }
        Ok(())
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(DEFAULT_MIME)
}
