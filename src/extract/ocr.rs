use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AppError, Result};

/// Turns a slip image into plain text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, image: &Path) -> Result<String>;
}

/// Runs an external OCR command. The template is split on whitespace and
/// every `{path}` token is replaced by the image path; text is read from
/// stdout.
pub struct CommandTranscriber {
    program: String,
    args: Vec<String>,
}

impl CommandTranscriber {
    pub fn new(template: &str) -> Result<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| AppError::Config("OCR_COMMAND is empty".to_string()))?;
        Ok(Self { program, args: parts.collect() })
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, image: &Path) -> Result<String> {
        let path = image.to_string_lossy();
        let args: Vec<String> = self.args.iter().map(|a| a.replace("{path}", &path)).collect();
        debug!(program = %self.program, ?args, "Running OCR");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| AppError::Ocr(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Ocr(format!(
                "{} exited with {:?}: {}",
                self.program,
                output.status.code(),
                stderr.trim()
            )));
        }

        // Slip text is matched line-insensitively downstream; fold it to one line.
        let text = String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return Err(AppError::Ocr(format!("no text read from {}", image.display())));
        }
        Ok(text)
    }
}
