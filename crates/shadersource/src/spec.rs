use std::fmt;
use std::path::PathBuf;

use directories_next::BaseDirs;
use reqwest::Url;
use renderer::ProgramPreset;

use crate::SourceError;

const PRESET_SCHEME: &str = "preset:";

/// Where a fragment program should be loaded from.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderSourceSpec {
    Preset(ProgramPreset),
    Inline(String),
    File(PathBuf),
    Remote(Url),
}

impl Default for ShaderSourceSpec {
    fn default() -> Self {
        Self::Preset(ProgramPreset::default())
    }
}

impl ShaderSourceSpec {
    /// Parses CLI/config input.
    ///
    /// `preset:<name>` selects a built-in program, `http(s)://` URLs are
    /// fetched, text that looks like GLSL is used inline and anything else is
    /// a path (with `~` expanded).
    pub fn from_input(input: &str) -> Result<Self, SourceError> {
        let trimmed = input.trim();

        if let Some(name) = trimmed.strip_prefix(PRESET_SCHEME) {
            let name = name.trim();
            if name.is_empty() {
                return Ok(Self::default());
            }
            return ProgramPreset::from_name(name)
                .map(Self::Preset)
                .ok_or_else(|| SourceError::UnknownPreset(name.to_string()));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Url::parse(trimmed)
                .map(Self::Remote)
                .map_err(|err| SourceError::InvalidUrl {
                    input: trimmed.to_string(),
                    message: err.to_string(),
                });
        }

        if looks_like_glsl(input) {
            return Ok(Self::Inline(input.to_string()));
        }

        Ok(Self::File(expand_home(trimmed)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for ShaderSourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preset(preset) => write!(f, "{PRESET_SCHEME}{}", preset.name()),
            Self::Inline(text) => write!(f, "inline ({} bytes)", text.len()),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

fn looks_like_glsl(input: &str) -> bool {
    input.contains('\n') || input.contains("void main")
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(input: &str) -> PathBuf {
    let rest = match input.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return PathBuf::from(input),
    };
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest.trim_start_matches('/')),
        None => {
            tracing::warn!(path = input, "home directory unknown; leaving path unexpanded");
            PathBuf::from(input)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_presets() {
        assert_eq!(
            ShaderSourceSpec::from_input("preset:ambient").unwrap(),
            ShaderSourceSpec::Preset(ProgramPreset::Ambient)
        );
        assert_eq!(
            ShaderSourceSpec::from_input("preset:").unwrap(),
            ShaderSourceSpec::default()
        );
        assert!(matches!(
            ShaderSourceSpec::from_input("preset:neon"),
            Err(SourceError::UnknownPreset(name)) if name == "neon"
        ));
    }

    #[test]
    fn parses_urls_and_paths() {
        let remote = ShaderSourceSpec::from_input("https://example.com/bg.frag").unwrap();
        assert!(remote.is_remote());
        assert_eq!(remote.to_string(), "https://example.com/bg.frag");

        assert_eq!(
            ShaderSourceSpec::from_input("shaders/bg.frag").unwrap(),
            ShaderSourceSpec::File(PathBuf::from("shaders/bg.frag"))
        );
        assert!(matches!(
            ShaderSourceSpec::from_input("http://exa mple.com"),
            Err(SourceError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn glsl_text_is_inline() {
        let spec = ShaderSourceSpec::from_input("void main() { gl_FragColor = vec4(1.0); }").unwrap();
        assert!(matches!(spec, ShaderSourceSpec::Inline(_)));
    }

    #[test]
    fn expands_home_prefix_only() {
        assert_eq!(expand_home("~user/x"), PathBuf::from("~user/x"));
        assert_eq!(expand_home("relative/x"), PathBuf::from("relative/x"));
        if let Some(dirs) = BaseDirs::new() {
            assert_eq!(expand_home("~/bg.frag"), dirs.home_dir().join("bg.frag"));
        }
    }
}
