//! Where the background's fragment program comes from.
//!
//! A [`ShaderSourceSpec`] names a built-in preset, inline GLSL, a file on
//! disk, or an `http(s)` URL. [`ShaderSourceProvider::request`] turns a spec
//! into a [`SourceFuture`]: presets, inline text and files resolve
//! immediately, remote programs are fetched on a worker thread so the window
//! can be attached while the download is in flight.

mod future;
mod remote;
mod spec;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use future::SourceFuture;
pub use remote::fetch_program;
pub use spec::{expand_home, ShaderSourceSpec};

use renderer::{FragmentProgram, ProgramTuning};

/// Default bound on how long a remote fetch may take.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
    #[error("invalid shader URL '{input}': {message}")]
    InvalidUrl { input: String, message: String },
    #[error("failed to read fragment program at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("timed out after {timeout:?} waiting for {url}")]
    Timeout { url: String, timeout: Duration },
    #[error("fragment program from {0} is empty")]
    Empty(String),
    #[error("source worker disconnected before returning a result")]
    WorkerDisconnected,
}

/// Resolves [`ShaderSourceSpec`]s into program text.
#[derive(Debug, Clone)]
pub struct ShaderSourceProvider {
    fetch_timeout: Duration,
    tuning: Option<ProgramTuning>,
}

impl Default for ShaderSourceProvider {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            tuning: None,
        }
    }
}

impl ShaderSourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Replaces the preset's own parameters when a preset is requested.
    pub fn with_tuning(mut self, tuning: ProgramTuning) -> Self {
        self.tuning = Some(tuning);
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn request(&self, spec: &ShaderSourceSpec) -> SourceFuture {
        match spec {
            ShaderSourceSpec::Preset(preset) => {
                let tuning = self.tuning.clone().unwrap_or_else(|| preset.tuning());
                tracing::debug!(preset = preset.name(), "using built-in fragment program");
                SourceFuture::ready(Ok(FragmentProgram::new(tuning).glsl()))
            }
            ShaderSourceSpec::Inline(text) => {
                SourceFuture::ready(non_empty(text.clone(), "inline source"))
            }
            ShaderSourceSpec::File(path) => {
                let loaded = std::fs::read_to_string(path)
                    .map_err(|source| SourceError::Io {
                        path: path.clone(),
                        source,
                    })
                    .and_then(|text| non_empty(text, &path.display().to_string()));
                if loaded.is_ok() {
                    tracing::debug!(path = %path.display(), "loaded fragment program");
                }
                SourceFuture::ready(loaded)
            }
            ShaderSourceSpec::Remote(url) => remote::spawn_fetch(url.clone(), self.fetch_timeout),
        }
    }
}

pub(crate) fn non_empty(text: String, origin: &str) -> Result<String, SourceError> {
    if text.trim().is_empty() {
        Err(SourceError::Empty(origin.to_string()))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use renderer::ProgramPreset;

    use super::*;

    #[test]
    fn presets_render_their_own_program() {
        let provider = ShaderSourceProvider::new();
        let source = provider
            .request(&ShaderSourceSpec::Preset(ProgramPreset::Ambient))
            .wait()
            .unwrap();
        assert_eq!(
            source,
            FragmentProgram::preset(ProgramPreset::Ambient).glsl()
        );
    }

    #[test]
    fn tuning_overrides_preset_parameters() {
        let mut tuning = ProgramPreset::Landing.tuning();
        tuning.fog_opacity = 0.9;
        let provider = ShaderSourceProvider::new().with_tuning(tuning.clone());
        let source = provider
            .request(&ShaderSourceSpec::Preset(ProgramPreset::Landing))
            .wait()
            .unwrap();
        assert_eq!(source, FragmentProgram::new(tuning).glsl());
        assert_ne!(source, FragmentProgram::preset(ProgramPreset::Landing).glsl());
    }

    #[test]
    fn reads_programs_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("background.frag");
        fs::write(&path, "void main() { gl_FragColor = vec4(1.0); }").unwrap();

        let source = ShaderSourceProvider::new()
            .request(&ShaderSourceSpec::File(path))
            .wait()
            .unwrap();
        assert!(source.contains("gl_FragColor"));
    }

    #[test]
    fn missing_and_empty_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ShaderSourceProvider::new();

        let missing = provider
            .request(&ShaderSourceSpec::File(dir.path().join("missing.frag")))
            .wait();
        assert!(matches!(missing, Err(SourceError::Io { .. })));

        let empty = dir.path().join("empty.frag");
        fs::write(&empty, "  \n").unwrap();
        let result = provider.request(&ShaderSourceSpec::File(empty)).wait();
        assert!(matches!(result, Err(SourceError::Empty(_))));
    }
}
