//! Build rendering through an external engine
//!
//! A [`Renderer`] turns the two raw character-window documents of one
//! character into a single Path of Building export string. The production
//! implementation is [`HeadlessRenderer`], which runs Path of Building's
//! headless wrapper as a subprocess.

mod headless;

pub use headless::HeadlessRenderer;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while rendering a build
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to create scratch directory {path}: {source}")]
    ScratchDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("Render engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("Render engine exited with status {code:?}: {output}")]
    Exit { code: Option<i32>, output: String },

    #[error("Render engine produced no export")]
    NoOutput,
}

/// Turns raw character documents into a build export
pub trait Renderer: Send + Sync {
    /// Renders one character
    ///
    /// `character_id` only keys scratch state; `items` and `passives` are the
    /// documents exactly as returned by the API.
    ///
    /// Engine output is read as stderr followed by stdout, not interleaved,
    /// so the export is the second-to-last line of stdout.
    fn render(
        &self,
        character_id: i64,
        items: &[u8],
        passives: &[u8],
    ) -> impl Future<Output = Result<String, RenderError>> + Send;
}

/// Picks the export out of the engine's combined output
///
/// The engine prints diagnostics freely; the export is the line immediately
/// preceding the last line.
pub fn extract_export(output: &str) -> Option<&str> {
    let lines: Vec<&str> = output.split('\n').collect();
    if lines.len() < 2 {
        return None;
    }

    let candidate = lines[lines.len() - 2].trim();
    if candidate.is_empty() {
        None
    } else {
        Some(candidate)
    }
}
