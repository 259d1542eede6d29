//! Tesseract OCR backend.
//!
//! Uses Tesseract via command-line: `tesseract <image> stdout -l <lang> --psm N --oem N`.

use std::path::Path;
use std::process::Command;
use std::time::Instant;

use super::backend::{check_binary, OcrBackend, OcrError, OcrResult};
use crate::config::OcrSettings;

/// Tesseract OCR backend.
pub struct TesseractBackend {
    settings: OcrSettings,
}

impl TesseractBackend {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    fn args(&self) -> Vec<String> {
        vec![
            "stdout".to_string(),
            "-l".to_string(),
            self.settings.language.clone(),
            "--psm".to_string(),
            self.settings.psm.to_string(),
            "--oem".to_string(),
            self.settings.oem.to_string(),
        ]
    }

    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .args(self.args())
            .output();

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr)))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OcrError::BackendNotAvailable(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ))
            }
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new(OcrSettings::default())
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else {
            "Tesseract is available".to_string()
        }
    }

    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let text = self.run_tesseract(image_path)?;

        Ok(OcrResult {
            text,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_carry_language_and_modes() {
        let backend = TesseractBackend::new(OcrSettings {
            language: "eng+deu".to_string(),
            ..Default::default()
        });
        assert_eq!(
            backend.args(),
            vec!["stdout", "-l", "eng+deu", "--psm", "1", "--oem", "3"]
        );
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let backend = TesseractBackend::default();
        if !backend.is_available() {
            return;
        }
        assert!(backend
            .ocr_image(Path::new("/nonexistent/page.png"))
            .is_err());
    }
}
