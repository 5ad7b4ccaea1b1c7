use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of `backdrop.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackdropConfig {
    pub version: u32,
    #[serde(default)]
    pub surface: SurfaceSection,
    #[serde(default)]
    pub shader: ShaderSection,
    #[serde(default)]
    pub program: ProgramSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SurfaceSection {
    /// Monitor output hosting the background.
    pub container: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size_opt")]
    pub size: Option<SurfaceSize>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShaderSection {
    /// `preset:<name>`, a path, inline GLSL or an `http(s)` URL.
    pub source: Option<String>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub fetch_timeout: Option<Duration>,
}

/// Parameter overrides for the built-in fragment program.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramSection {
    pub preset: Option<String>,
    pub time_rate: Option<f32>,
    pub waves: Option<Vec<WaveSetting>>,
    pub color_a: Option<[f32; 3]>,
    pub color_b: Option<[f32; 3]>,
    pub fog_color: Option<[f32; 3]>,
    pub fog_opacity: Option<f32>,
    pub blobs: Option<Vec<BlobSetting>>,
    pub grain: Option<GrainSetting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WaveSetting {
    pub frequency: f32,
    pub speed: f32,
    pub amplitude: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlobSetting {
    pub center: [f32; 2],
    pub size: f32,
    pub edge: f32,
    #[serde(default)]
    pub wobble: f32,
    pub speed: f32,
    #[serde(default)]
    pub time_offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GrainSetting {
    pub scale: f32,
    pub speed: f32,
    pub amplitude: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses `WIDTHxHEIGHT`.
pub fn parse_size(raw: &str) -> Result<SurfaceSize, String> {
    let (width, height) = raw
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{raw}'; expected WIDTHxHEIGHT"))?;
    let parse = |value: &str| {
        value
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid size '{raw}'; expected WIDTHxHEIGHT"))
    };
    Ok(SurfaceSize {
        width: parse(width)?,
        height: parse(height)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 => Some(Self::Samples2),
            4 => Some(Self::Samples4),
            8 => Some(Self::Samples8),
            16 => Some(Self::Samples16),
            _ => None,
        }
    }

    /// MSAA sample count, `None` for `auto`.
    pub fn samples(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Off => Some(1),
            Self::Samples2 => Some(2),
            Self::Samples4 => Some(4),
            Self::Samples8 => Some(8),
            Self::Samples16 => Some(16),
        }
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_size_opt<'de, D>(deserializer: D) -> Result<Option<SurfaceSize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Pair([u32; 2]),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    match helper {
        None => Ok(None),
        Some(Helper::Str(raw)) => parse_size(&raw).map(Some).map_err(de::Error::custom),
        Some(Helper::Pair([width, height])) => Ok(Some(SurfaceSize { width, height })),
    }
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            let raw = value.to_string();
            Some(parse_antialias(&raw).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

/// Accepts `auto`, `off` and the sample counts 2, 4, 8 and 16.
pub fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

impl BackdropConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: BackdropConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(container) = &self.surface.container {
            if container.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "surface.container may not be empty".into(),
                ));
            }
        }

        if let Some(size) = self.surface.size {
            if size.width == 0 || size.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "surface.size {size} must be non-zero"
                )));
            }
        }

        if let Some(source) = &self.shader.source {
            if source.trim().is_empty() {
                return Err(ConfigError::Invalid("shader.source may not be empty".into()));
            }
        }

        if let Some(timeout) = self.shader.fetch_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "shader.fetch_timeout must be greater than zero".into(),
                ));
            }
        }

        self.program.validate()
    }
}

impl ProgramSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(preset) = &self.preset {
            if preset.trim().is_empty() {
                return Err(ConfigError::Invalid("program.preset may not be empty".into()));
            }
        }

        if let Some(rate) = self.time_rate {
            check_finite("program.time_rate", rate)?;
            if rate < 0.0 {
                return Err(ConfigError::Invalid("program.time_rate must be >= 0".into()));
            }
        }

        if let Some(waves) = &self.waves {
            if waves.len() != 3 {
                return Err(ConfigError::Invalid(format!(
                    "program.waves must list exactly 3 terms, found {}",
                    waves.len()
                )));
            }
            for (index, wave) in waves.iter().enumerate() {
                let field = format!("program.waves[{index}]");
                check_finite(&field, wave.frequency)?;
                check_finite(&field, wave.speed)?;
                check_finite(&field, wave.amplitude)?;
            }
        }

        for (name, color) in [
            ("program.color_a", self.color_a),
            ("program.color_b", self.color_b),
            ("program.fog_color", self.fog_color),
        ] {
            if let Some(color) = color {
                if color.iter().any(|channel| !(0.0..=1.0).contains(channel)) {
                    return Err(ConfigError::Invalid(format!(
                        "{name} channels must be within 0..=1"
                    )));
                }
            }
        }

        if let Some(opacity) = self.fog_opacity {
            if !(0.0..=1.0).contains(&opacity) {
                return Err(ConfigError::Invalid(
                    "program.fog_opacity must be within 0..=1".into(),
                ));
            }
        }

        if let Some(blobs) = &self.blobs {
            for (index, blob) in blobs.iter().enumerate() {
                let field = format!("program.blobs[{index}]");
                for value in blob.center {
                    check_finite(&field, value)?;
                }
                check_finite(&field, blob.size)?;
                check_finite(&field, blob.edge)?;
                check_finite(&field, blob.wobble)?;
                check_finite(&field, blob.speed)?;
                check_finite(&field, blob.time_offset)?;
                if blob.size <= 0.0 {
                    return Err(ConfigError::Invalid(format!("{field} size must be > 0")));
                }
                if blob.edge < 0.0 {
                    return Err(ConfigError::Invalid(format!("{field} edge must be >= 0")));
                }
            }
        }

        if let Some(grain) = &self.grain {
            check_finite("program.grain", grain.scale)?;
            check_finite("program.grain", grain.speed)?;
            check_finite("program.grain", grain.amplitude)?;
            if grain.scale < 0.0 || grain.amplitude < 0.0 {
                return Err(ConfigError::Invalid(
                    "program.grain scale and amplitude must be >= 0".into(),
                ));
            }
        }

        Ok(())
    }
}

fn check_finite(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be a finite number")))
    }
}
