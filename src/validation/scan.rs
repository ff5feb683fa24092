use axum::extract::Multipart;
use garde::Validate;

use crate::error::{AppError, Result};
use crate::validation::form::not_blank;

/// The multipart scan form a teacher submits with a QR code image.
#[derive(Debug, Default, Validate)]
pub struct ScanForm {
    #[garde(custom(has_upload))]
    pub qr_code: Vec<u8>,
    #[garde(length(chars, min = 1, max = 64), custom(not_blank))]
    pub period: String,
    /// Legacy field; the recorded teacher always comes from the session.
    #[garde(skip)]
    pub teacher_id: Option<String>,
    #[garde(skip)]
    pub csrf_token: String,
}

impl ScanForm {
    /// Reads the scan form out of a multipart body.
    ///
    /// Unknown fields are ignored.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = ScanForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Multipart(format!("Failed to read multipart field: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "qr_code" => {
                    form.qr_code = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Multipart(format!("Failed to read upload: {}", e)))?
                        .to_vec();
                }
                "period" | "teacher_id" | "csrf_token" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::Multipart(format!("Failed to read {}: {}", name, e)))?;
                    match name.as_str() {
                        "period" => form.period = value.trim().to_string(),
                        "teacher_id" => {
                            let value = value.trim();
                            form.teacher_id = (!value.is_empty()).then(|| value.to_string());
                        }
                        _ => form.csrf_token = value,
                    }
                }
                other => {
                    tracing::debug!("Ignoring unknown scan form field: {}", other);
                }
            }
        }

        Ok(form)
    }
}

fn has_upload(bytes: &[u8], _ctx: &()) -> garde::Result {
    if bytes.is_empty() {
        return Err(garde::Error::new("Please upload a QR code image."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::form::validated;

    #[test]
    fn test_scan_form_requires_upload_and_period() {
        match validated(ScanForm::default()) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.has("qr_code"));
                assert!(errors.has("period"));
                assert!(!errors.has("teacher_id"));
            }
            _ => panic!("empty scan form should not validate"),
        }
    }

    #[test]
    fn test_scan_form_without_teacher_id_is_valid() {
        let form = ScanForm {
            qr_code: vec![0x89, b'P', b'N', b'G'],
            period: "P1".to_string(),
            teacher_id: None,
            csrf_token: String::new(),
        };
        assert!(validated(form).is_ok());
    }
}
