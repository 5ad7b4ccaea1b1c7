use std::fmt;
use std::str::FromStr;

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

impl fmt::Display for Antialiasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Antialiasing::Auto => f.write_str("auto"),
            Antialiasing::Off => f.write_str("off"),
            Antialiasing::Samples(count) => write!(f, "{count}"),
        }
    }
}

impl FromStr for Antialiasing {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "auto" | "max" | "default" => Ok(Antialiasing::Auto),
            "off" | "none" | "0" | "1" => Ok(Antialiasing::Off),
            other => {
                let samples: u32 = other
                    .parse()
                    .map_err(|_| format!("invalid antialiasing value '{trimmed}'"))?;
                if !matches!(samples, 2 | 4 | 8 | 16) {
                    return Err(format!(
                        "unsupported MSAA sample count {samples}; use 2, 4, 8, or 16"
                    ));
                }
                Ok(Antialiasing::Samples(samples))
            }
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// Mirrors the CLI flags and config file: which monitor hosts the background,
/// an optional explicit size and the MSAA policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Monitor name the surface is attached to. `None` picks the primary monitor.
    pub container: Option<String>,
    /// Logical window size overriding the monitor size.
    pub requested_size: Option<(u32, u32)>,
    pub antialiasing: Antialiasing,
    pub title: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            container: None,
            requested_size: None,
            antialiasing: Antialiasing::default(),
            title: "backdrop".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_antialiasing_values() {
        assert_eq!("auto".parse::<Antialiasing>(), Ok(Antialiasing::Auto));
        assert_eq!("OFF".parse::<Antialiasing>(), Ok(Antialiasing::Off));
        assert_eq!("1".parse::<Antialiasing>(), Ok(Antialiasing::Off));
        assert_eq!("4".parse::<Antialiasing>(), Ok(Antialiasing::Samples(4)));
        assert!("3".parse::<Antialiasing>().is_err());
        assert!("lots".parse::<Antialiasing>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for aa in [Antialiasing::Auto, Antialiasing::Off, Antialiasing::Samples(8)] {
            assert_eq!(aa.to_string().parse::<Antialiasing>(), Ok(aa));
        }
    }
}
