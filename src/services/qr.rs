use std::io::Cursor;
use std::path::PathBuf;

use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use sonic_rs::JsonValueTrait;
use thiserror::Error;

use crate::error::{AppError, Result};

/// Pixels per QR module.
const QR_BOX_SIZE: u32 = 10;
/// Width of the white quiet zone around the symbol, in modules.
const QR_BORDER: u32 = 5;
/// Public path the QR directory is served under.
pub const QR_URL_PREFIX: &str = "/qr_codes";

/// The identity embedded in a student's QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    pub student_id: String,
    pub name: String,
}

impl QrPayload {
    /// Serializes the payload as `{"student_id":"..","name":".."}`.
    pub fn to_json(&self) -> Result<String> {
        sonic_rs::to_string(self)
            .map_err(|e| AppError::Internal(format!("QR payload serialization failed: {}", e)))
    }
}

/// A QR code image written for one student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrArtifact {
    pub student_id: String,
    /// Where the PNG lives on disk.
    pub path: PathBuf,
    /// The public address the PNG is served at.
    pub url: String,
}

/// A QR code image encoded in memory and not yet written.
#[derive(Debug, Clone)]
pub struct RenderedQr {
    student_id: String,
    png: Vec<u8>,
}

/// Why an uploaded image was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestionError {
    #[error("image could not be decoded: {0}")]
    ImageDecodeFailure(String),

    #[error("no QR code found in image")]
    NoSymbolFound,

    #[error("QR code does not contain valid JSON: {0}")]
    InvalidJson(String),

    #[error("QR code JSON lacks student_id or name")]
    MissingFields,
}

impl IngestionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            IngestionError::ImageDecodeFailure(_) => {
                "The uploaded file could not be read as an image."
            }
            IngestionError::NoSymbolFound => {
                "No QR code data found. Please upload a valid QR code."
            }
            IngestionError::InvalidJson(_) => {
                "Invalid QR code format. Ensure it contains valid JSON data."
            }
            IngestionError::MissingFields => "QR code data is missing required fields.",
        }
    }
}

/// Writes and locates student QR code images.
///
/// One image exists per student id; issuing again overwrites it.
#[derive(Clone, Debug)]
pub struct QrService {
    dir: PathBuf,
}

impl QrService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The public address of the image for `student_id`.
    pub fn url_for(&self, student_id: &str) -> String {
        format!("{}/{}.png", QR_URL_PREFIX, student_id)
    }

    /// Encodes the student's identity without touching the disk.
    ///
    /// Anything that can go wrong before the image is written fails here.
    pub fn render(&self, student_id: &str, name: &str) -> Result<RenderedQr> {
        if !is_valid_student_id(student_id) || name.is_empty() {
            return Err(AppError::Internal(format!(
                "Cannot issue QR code for student id {:?}",
                student_id
            )));
        }

        let payload = QrPayload {
            student_id: student_id.to_string(),
            name: name.to_string(),
        };
        let png = render_png(&payload.to_json()?)?;

        Ok(RenderedQr {
            student_id: payload.student_id,
            png,
        })
    }

    /// Writes a rendered image, replacing any previous one for the student.
    pub async fn store(&self, rendered: RenderedQr) -> Result<QrArtifact> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.png", rendered.student_id));
        tokio::fs::write(&path, &rendered.png).await?;

        tracing::info!("✅ QR code issued for {} at {}", rendered.student_id, path.display());

        Ok(QrArtifact {
            url: self.url_for(&rendered.student_id),
            student_id: rendered.student_id,
            path,
        })
    }

    /// Renders the student's identity as a QR code PNG and stores it.
    pub async fn issue(&self, student_id: &str, name: &str) -> Result<QrArtifact> {
        let rendered = self.render(student_id, name)?;
        self.store(rendered).await
    }

    /// Maps a public address back to an existing artifact.
    ///
    /// Returns `None` for addresses outside the QR directory or for students
    /// without an image.
    pub async fn resolve(&self, address: &str) -> Option<QrArtifact> {
        let student_id = address
            .strip_prefix(QR_URL_PREFIX)?
            .strip_prefix('/')?
            .strip_suffix(".png")?;

        if !is_valid_student_id(student_id) {
            tracing::warn!("❌ Rejected QR address: {}", address);
            return None;
        }

        let path = self.dir.join(format!("{}.png", student_id));
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(QrArtifact {
                student_id: student_id.to_string(),
                path,
                url: self.url_for(student_id),
            }),
            _ => None,
        }
    }

    /// Returns the student's own artifact, writing it again if it is missing.
    pub async fn ensure(&self, student_id: &str, name: &str) -> Result<QrArtifact> {
        if let Some(artifact) = self.resolve(&self.url_for(student_id)).await {
            return Ok(artifact);
        }

        tracing::warn!("⚠️ QR code missing for {}; issuing again", student_id);
        self.issue(student_id, name).await
    }
}

fn is_valid_student_id(student_id: &str) -> bool {
    !student_id.is_empty()
        && student_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Encodes `text` as a black-on-white QR code PNG.
///
/// Starts at version 1 with medium error correction and grows the version
/// until the text fits.
pub fn render_png(text: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::M)?;
    encode_png(&code)
}

fn encode_png(code: &QrCode) -> Result<Vec<u8>> {
    let width = code.width() as u32;
    let colors = code.to_colors();
    let side = (width + 2 * QR_BORDER) * QR_BOX_SIZE;

    let image = GrayImage::from_fn(side, side, |x, y| {
        let mx = x / QR_BOX_SIZE;
        let my = y / QR_BOX_SIZE;
        let inside = (QR_BORDER..QR_BORDER + width).contains(&mx)
            && (QR_BORDER..QR_BORDER + width).contains(&my);
        if inside {
            let idx = ((my - QR_BORDER) * width + (mx - QR_BORDER)) as usize;
            if colors[idx] == Color::Dark {
                return Luma([0u8]);
            }
        }
        Luma([255u8])
    });

    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// Reads the student identity out of an uploaded QR code image.
///
/// Only the first detected symbol is used.
pub fn ingest(bytes: &[u8]) -> std::result::Result<QrPayload, IngestionError> {
    if bytes.is_empty() {
        return Err(IngestionError::ImageDecodeFailure("empty upload".to_string()));
    }

    if let Some(kind) = infer::get(bytes) {
        tracing::debug!("🔍 Uploaded QR image type: {}", kind.mime_type());
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| IngestionError::ImageDecodeFailure(e.to_string()))?
        .to_luma8();

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        image.width() as usize,
        image.height() as usize,
        |x, y| image.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    tracing::debug!("🔍 Detected {} QR symbol(s)", grids.len());

    let grid = grids.first().ok_or(IngestionError::NoSymbolFound)?;
    let mut data = Vec::new();
    grid.decode_to(&mut data).map_err(|e| {
        tracing::debug!("QR symbol detected but not decodable: {}", e);
        IngestionError::NoSymbolFound
    })?;

    let text = String::from_utf8(data)
        .map_err(|e| IngestionError::InvalidJson(format!("payload is not UTF-8: {}", e)))?;

    parse_payload(&text)
}

/// Parses the JSON text carried by a QR code.
pub fn parse_payload(text: &str) -> std::result::Result<QrPayload, IngestionError> {
    let value: sonic_rs::Value =
        sonic_rs::from_str(text).map_err(|e| IngestionError::InvalidJson(e.to_string()))?;

    let field = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match (field("student_id"), field("name")) {
        (Some(student_id), Some(name)) => Ok(QrPayload { student_id, name }),
        _ => Err(IngestionError::MissingFields),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_png() -> Vec<u8> {
        let image = GrayImage::from_pixel(200, 200, Luma([255u8]));
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        png
    }

    #[test]
    fn test_payload_json_shape() {
        let payload = QrPayload {
            student_id: "alice".to_string(),
            name: "Alice".to_string(),
        };
        assert_eq!(payload.to_json().unwrap(), r#"{"student_id":"alice","name":"Alice"}"#);
    }

    #[tokio::test]
    async fn test_issue_then_ingest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let service = QrService::new(dir.path().join("qr_codes"));

        let artifact = service.issue("alice", "Alice Liddell").await.unwrap();
        assert_eq!(artifact.url, "/qr_codes/alice.png");
        assert_eq!(artifact.path, dir.path().join("qr_codes").join("alice.png"));

        let bytes = tokio::fs::read(&artifact.path).await.unwrap();
        assert_eq!(infer::get(&bytes).map(|k| k.mime_type()), Some("image/png"));

        let payload = ingest(&bytes).unwrap();
        assert_eq!(
            payload,
            QrPayload {
                student_id: "alice".to_string(),
                name: "Alice Liddell".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_reissue_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let service = QrService::new(dir.path());

        service.issue("s-1", "First").await.unwrap();
        let artifact = service.issue("s-1", "Second").await.unwrap();

        let bytes = tokio::fs::read(&artifact.path).await.unwrap();
        assert_eq!(ingest(&bytes).unwrap().name, "Second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_issue_rejects_unsafe_student_id() {
        let dir = tempfile::tempdir().unwrap();
        let service = QrService::new(dir.path());
        assert!(service.issue("../escape", "x").await.is_err());
        assert!(service.issue("", "x").await.is_err());
        assert!(service.issue("ok", "").await.is_err());
    }

    #[tokio::test]
    async fn test_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let service = QrService::new(dir.path());
        let artifact = service.issue("alice", "alice").await.unwrap();

        assert_eq!(service.resolve("/qr_codes/alice.png").await, Some(artifact));
        assert!(service.resolve("/qr_codes/bob.png").await.is_none());
        assert!(service.resolve("/qr_codes/../secret.png").await.is_none());
        assert!(service.resolve("/etc/passwd").await.is_none());
    }

    #[tokio::test]
    async fn test_ensure_reissues_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let service = QrService::new(dir.path());
        let artifact = service.issue("alice", "alice").await.unwrap();
        std::fs::remove_file(&artifact.path).unwrap();

        let restored = service.ensure("alice", "alice").await.unwrap();
        assert_eq!(restored, artifact);
        let bytes = tokio::fs::read(&restored.path).await.unwrap();
        assert_eq!(ingest(&bytes).unwrap().student_id, "alice");

        assert_eq!(service.ensure("alice", "alice").await.unwrap(), artifact);
    }

    #[tokio::test]
    async fn test_render_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let service = QrService::new(dir.path().join("qr_codes"));

        let rendered = service.render("alice", "alice").unwrap();
        assert!(!dir.path().join("qr_codes").exists());
        assert!(service.render("../escape", "x").is_err());

        let artifact = service.store(rendered).await.unwrap();
        assert!(artifact.path.exists());
    }

    #[tokio::test]
    async fn test_store_into_unwritable_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("qr_codes");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let service = QrService::new(&blocker);

        let rendered = service.render("alice", "alice").unwrap();
        assert!(matches!(service.store(rendered).await, Err(AppError::Io(_))));
    }

    #[test]
    fn test_non_utf8_payload() {
        let code = QrCode::with_error_correction_level(&[0xff, 0xfe], EcLevel::M).unwrap();
        let png = encode_png(&code).unwrap();
        assert!(matches!(ingest(&png), Err(IngestionError::InvalidJson(_))));
    }

    #[test]
    fn test_blank_image_has_no_symbol() {
        assert_eq!(ingest(&blank_png()), Err(IngestionError::NoSymbolFound));
    }

    #[test]
    fn test_non_json_payload() {
        let png = render_png("not json").unwrap();
        assert!(matches!(ingest(&png), Err(IngestionError::InvalidJson(_))));
    }

    #[test]
    fn test_missing_name() {
        let png = render_png(r#"{"student_id":"S1"}"#).unwrap();
        assert_eq!(ingest(&png), Err(IngestionError::MissingFields));
    }

    #[test]
    fn test_undecodable_bytes() {
        assert!(matches!(
            ingest(b"definitely not an image"),
            Err(IngestionError::ImageDecodeFailure(_))
        ));
        assert!(matches!(ingest(&[]), Err(IngestionError::ImageDecodeFailure(_))));
    }

    #[test]
    fn test_parse_payload_edge_cases() {
        assert_eq!(parse_payload(r#"{"student_id":"","name":"x"}"#), Err(IngestionError::MissingFields));
        assert_eq!(parse_payload(r#"{"student_id":7,"name":"x"}"#), Err(IngestionError::MissingFields));
        assert_eq!(parse_payload("[1,2]"), Err(IngestionError::MissingFields));
        assert!(matches!(parse_payload("{"), Err(IngestionError::InvalidJson(_))));

        let payload = parse_payload(r#"{"name":"Bob","student_id":"b1","extra":true}"#).unwrap();
        assert_eq!(payload.student_id, "b1");
        assert_eq!(payload.name, "Bob");
    }
}
