//! Headless Path of Building invocation
//!
//! Each render:
//! 1. Creates `<scratch-dir>/<character-id>/`
//! 2. Writes `items.json` and `passives.json` into it
//! 3. Runs `<interpreter> <script> <items> <passives>` from `<engine-root>/src`
//!    with `LUA_PATH`/`LUA_CPATH` pointing into `<engine-root>/runtime`
//! 4. Takes the export from the combined output
//! 5. Removes the scratch directory whatever the outcome

use crate::config::RendererConfig;
use crate::renderer::{extract_export, RenderError, Renderer};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::Instrument;

const ITEMS_FILE: &str = "items.json";
const PASSIVES_FILE: &str = "passives.json";

/// Longest output excerpt kept in an error
const OUTPUT_EXCERPT_LEN: usize = 2000;

/// Renderer backed by the Path of Building headless wrapper
#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    config: RendererConfig,
}

impl HeadlessRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Scratch directory used for a character
    pub fn scratch_path(&self, character_id: i64) -> PathBuf {
        self.config.scratch_dir.join(character_id.to_string())
    }

    fn lua_path(&self) -> String {
        let runtime_lua = self.config.engine_root.join("runtime").join("lua");
        format!("{0}/?.lua;{0}/?/init.lua;;", runtime_lua.display())
    }

    fn lua_cpath(&self) -> String {
        let runtime = self.config.engine_root.join("runtime");
        format!("{0}/?.so;{0}/?.dll;;", runtime.display())
    }

    async fn render_in(
        &self,
        dir: &Path,
        items: &[u8],
        passives: &[u8],
    ) -> Result<String, RenderError> {
        let items_path = write_payload(dir, ITEMS_FILE, items).await?;
        let passives_path = write_payload(dir, PASSIVES_FILE, passives).await?;

        let mut command = Command::new(&self.config.interpreter);
        command
            .arg(&self.config.script)
            .arg(&items_path)
            .arg(&passives_path)
            .env("LUA_PATH", self.lua_path())
            .env("LUA_CPATH", self.lua_cpath())
            .current_dir(self.config.engine_root.join("src"))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::info!("Executing Path of Building in headless mode");
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| RenderError::Timeout(timeout))?
            .map_err(|source| RenderError::Spawn {
                program: self.config.interpreter.clone(),
                source,
            })?;

        let combined = combine_output(&output.stdout, &output.stderr);

        if !output.status.success() {
            return Err(RenderError::Exit {
                code: output.status.code(),
                output: tail(&combined, OUTPUT_EXCERPT_LEN).to_string(),
            });
        }

        let export = extract_export(&combined).ok_or(RenderError::NoOutput)?;
        tracing::debug!(len = export.len(), "Render finished");
        Ok(export.to_string())
    }
}

impl Renderer for HeadlessRenderer {
    async fn render(
        &self,
        character_id: i64,
        items: &[u8],
        passives: &[u8],
    ) -> Result<String, RenderError> {
        let dir = self.scratch_path(character_id);
        let span = tracing::info_span!("renderer", character_id, dir = %dir.display());

        async {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| RenderError::ScratchDir {
                    path: dir.clone(),
                    source,
                })?;

            let result = self.render_in(&dir, items, passives).await;

            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                tracing::warn!("Failed to remove scratch directory: {}", e);
            }

            result
        }
        .instrument(span)
        .await
    }
}

/// Writes one payload and returns its absolute path
async fn write_payload(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf, RenderError> {
    let path = dir.join(name);
    tokio::fs::write(&path, data)
        .await
        .map_err(|source| RenderError::WriteFile {
            path: path.clone(),
            source,
        })?;

    // The engine runs from its own source root, so relative paths would not resolve
    tokio::fs::canonicalize(&path)
        .await
        .map_err(|source| RenderError::WriteFile {
            path: path.clone(),
            source,
        })
}

/// Joins stderr and stdout so that stdout's final lines stay last
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stderr).into_owned();
    if !combined.is_empty() && !combined.ends_with('\n') {
        combined.push('\n');
    }
    combined.push_str(&String::from_utf8_lossy(stdout));
    combined
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
