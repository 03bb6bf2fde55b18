//! Copying entry bodies to the system clipboard

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Best-effort destination for copied text
#[async_trait]
pub trait CopySink: Send + Sync {
    /// Deliver `text`; returns whether a clipboard actually received it
    async fn copy(&self, text: &str) -> bool;
}

type Tool = (&'static str, &'static [&'static str]);

#[cfg(target_os = "macos")]
const TOOLS: &[Tool] = &[("pbcopy", &[])];

#[cfg(target_os = "windows")]
const TOOLS: &[Tool] = &[("clip", &[])];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const TOOLS: &[Tool] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Platform clipboard via the usual command-line helpers
pub struct SystemClipboard {
    candidates: &'static [Tool],
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self { candidates: TOOLS }
    }

    async fn pipe_into(program: &str, args: &[&str], text: &str) -> std::io::Result<bool> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
        }

        Ok(child.wait().await?.success())
    }
}

#[async_trait]
impl CopySink for SystemClipboard {
    async fn copy(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }

        for (program, args) in self.candidates {
            match Self::pipe_into(program, args, text).await {
                Ok(true) => {
                    tracing::debug!("Copied {} bytes with {}", text.len(), program);
                    return true;
                }
                Ok(false) => tracing::debug!("{} exited unsuccessfully", program),
                Err(e) => tracing::debug!("{} unavailable: {}", program, e),
            }
        }

        tracing::warn!("No clipboard tool available, printing payload instead");
        println!("{}", text);
        false
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records copied text instead of touching the clipboard
    #[derive(Default)]
    pub(crate) struct RecordingSink(pub Mutex<Vec<String>>);

    #[async_trait]
    impl CopySink for RecordingSink {
        async fn copy(&self, text: &str) -> bool {
            if text.is_empty() {
                return false;
            }
            self.0.lock().unwrap().push(text.to_string());
            true
        }
    }

    #[tokio::test]
    async fn test_empty_text_is_not_copied() {
        let clipboard = SystemClipboard { candidates: &[] };
        assert!(!clipboard.copy("").await);
    }

    #[tokio::test]
    async fn test_missing_tools_fall_back_to_printing() {
        const MISSING: &[Tool] = &[("caper-history-no-such-clipboard-tool", &[])];
        let clipboard = SystemClipboard { candidates: MISSING };
        assert!(!clipboard.copy("a=1").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_is_killed_when_writing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("still-running");
        let marker = marker.to_str().unwrap();

        // Closes its input at once, so a payload larger than the pipe buffer cannot be written
        let script = r#"exec 0<&-; sleep 1; echo late > "$0""#;
        let payload = "x".repeat(1 << 20);

        let result = SystemClipboard::pipe_into("sh", &["-c", script, marker], &payload).await;
        assert!(result.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!std::path::Path::new(marker).exists());
    }
}
