use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use backdropconfig::{AntialiasSetting, BackdropConfig, ProgramSection};
use renderer::{Antialiasing, Blob, Grain, ProgramPreset, ProgramTuning, RendererConfig, WaveTerm};
use shadersource::{ShaderSourceProvider, ShaderSourceSpec, DEFAULT_FETCH_TIMEOUT};

use crate::cli::RunArgs;
use crate::paths::AppPaths;

/// Everything `backdrop` needs to start rendering.
#[derive(Debug)]
pub struct LaunchPlan {
    pub renderer: RendererConfig,
    pub source: ShaderSourceSpec,
    pub provider: ShaderSourceProvider,
}

/// Loads `explicit`, or the discovered config file when it exists.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<BackdropConfig>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let paths = AppPaths::discover()?;
            let discovered = paths.config_file();
            if !discovered.exists() {
                tracing::debug!(
                    config = %paths.config_dir().display(),
                    "no backdrop.toml found; using defaults"
                );
                return Ok(None);
            }
            discovered
        }
    };

    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = BackdropConfig::from_toml_str(&text)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(Some(config))
}

/// Merges CLI flags over the config file. Flags win.
pub fn plan_launch(args: &RunArgs, config: Option<&BackdropConfig>) -> Result<LaunchPlan> {
    let surface = config.map(|config| &config.surface);
    let shader = config.map(|config| &config.shader);
    let program = config.map(|config| &config.program);

    let renderer = RendererConfig {
        container: args
            .container
            .clone()
            .or_else(|| surface.and_then(|surface| surface.container.clone())),
        requested_size: args.size.or_else(|| {
            surface
                .and_then(|surface| surface.size)
                .map(|size| (size.width, size.height))
        }),
        antialiasing: args
            .antialias
            .or_else(|| surface.and_then(|surface| surface.antialias).map(map_antialias))
            .unwrap_or_default(),
        ..RendererConfig::default()
    };

    let source = if let Some(input) = &args.shader {
        ShaderSourceSpec::from_input(input)?
    } else if let Some(preset) = args.preset {
        ShaderSourceSpec::Preset(preset)
    } else if let Some(input) = shader.and_then(|shader| shader.source.as_deref()) {
        ShaderSourceSpec::from_input(input)?
    } else {
        ShaderSourceSpec::Preset(resolve_preset(None, program)?)
    };

    let fetch_timeout = match args.fetch_timeout {
        Some(seconds) if seconds.is_finite() && seconds > 0.0 => Duration::from_secs_f64(seconds),
        Some(seconds) => anyhow::bail!("--fetch-timeout must be positive, got {seconds}"),
        None => shader
            .and_then(|shader| shader.fetch_timeout)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT),
    };

    let mut provider = ShaderSourceProvider::new().with_fetch_timeout(fetch_timeout);
    match (&source, program) {
        (ShaderSourceSpec::Preset(preset), Some(program)) => {
            provider = provider.with_tuning(tune(*preset, program));
        }
        (_, Some(program)) if has_overrides(program) => {
            tracing::warn!(source = %source, "[program] overrides only apply to built-in presets");
        }
        _ => {}
    }

    Ok(LaunchPlan {
        renderer,
        source,
        provider,
    })
}

/// Tuning for a still export: `--preset`, then `[program].preset`, then the default.
pub fn still_tuning(
    preset: Option<ProgramPreset>,
    config: Option<&BackdropConfig>,
) -> Result<ProgramTuning> {
    let program = config.map(|config| &config.program);
    let preset = resolve_preset(preset, program)?;
    Ok(match program {
        Some(program) => tune(preset, program),
        None => preset.tuning(),
    })
}

fn resolve_preset(
    explicit: Option<ProgramPreset>,
    program: Option<&ProgramSection>,
) -> Result<ProgramPreset> {
    if let Some(preset) = explicit {
        return Ok(preset);
    }
    match program.and_then(|program| program.preset.as_deref()) {
        Some(name) => ProgramPreset::from_name(name)
            .with_context(|| format!("unknown program.preset '{name}'")),
        None => Ok(ProgramPreset::default()),
    }
}

fn has_overrides(program: &ProgramSection) -> bool {
    program.time_rate.is_some()
        || program.waves.is_some()
        || program.color_a.is_some()
        || program.color_b.is_some()
        || program.fog_color.is_some()
        || program.fog_opacity.is_some()
        || program.blobs.is_some()
        || program.grain.is_some()
}

/// Applies `[program]` overrides on top of a preset.
fn tune(preset: ProgramPreset, program: &ProgramSection) -> ProgramTuning {
    let mut tuning = preset.tuning();
    if let Some(rate) = program.time_rate {
        tuning.time_rate = rate;
    }
    if let Some(waves) = &program.waves {
        for (slot, wave) in tuning.waves.iter_mut().zip(waves) {
            *slot = WaveTerm::new(wave.frequency, wave.speed, wave.amplitude);
        }
    }
    if let Some(color) = program.color_a {
        tuning.color_a = color;
    }
    if let Some(color) = program.color_b {
        tuning.color_b = color;
    }
    if let Some(color) = program.fog_color {
        tuning.fog_color = color;
    }
    if let Some(opacity) = program.fog_opacity {
        tuning.fog_opacity = opacity;
    }
    if let Some(blobs) = &program.blobs {
        tuning.blobs = blobs
            .iter()
            .map(|blob| Blob {
                center: blob.center,
                size: blob.size,
                edge: blob.edge,
                wobble: blob.wobble,
                speed: blob.speed,
                time_offset: blob.time_offset,
            })
            .collect();
    }
    if let Some(grain) = program.grain {
        tuning.grain = Grain {
            scale: grain.scale,
            speed: grain.speed,
            amplitude: grain.amplitude,
        };
    }
    tuning
}

fn map_antialias(setting: AntialiasSetting) -> Antialiasing {
    match setting.samples() {
        None => Antialiasing::Auto,
        Some(1) => Antialiasing::Off,
        Some(samples) => Antialiasing::Samples(samples),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
version = 1

[surface]
container = "HDMI-A-1"
size = "1280x720"
antialias = "off"

[shader]
fetch_timeout = "3s"

[program]
preset = "ambient"
fog_opacity = 0.8

[[program.blobs]]
center = [0.5, 0.5]
size = 0.4
edge = 0.1
speed = 0.2
"#;

    fn config() -> BackdropConfig {
        BackdropConfig::from_toml_str(CONFIG).unwrap()
    }

    #[test]
    fn config_fills_unset_flags() {
        let plan = plan_launch(&RunArgs::default(), Some(&config())).unwrap();
        assert_eq!(plan.renderer.container.as_deref(), Some("HDMI-A-1"));
        assert_eq!(plan.renderer.requested_size, Some((1280, 720)));
        assert_eq!(plan.renderer.antialiasing, Antialiasing::Off);
        assert_eq!(plan.source, ShaderSourceSpec::Preset(ProgramPreset::Ambient));
        assert_eq!(plan.provider.fetch_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn flags_override_config() {
        let args = RunArgs {
            container: Some("DP-2".into()),
            size: Some((640, 480)),
            antialias: Some(Antialiasing::Samples(4)),
            shader: Some("preset:landing".into()),
            fetch_timeout: Some(1.5),
            ..RunArgs::default()
        };
        let plan = plan_launch(&args, Some(&config())).unwrap();
        assert_eq!(plan.renderer.container.as_deref(), Some("DP-2"));
        assert_eq!(plan.renderer.requested_size, Some((640, 480)));
        assert_eq!(plan.renderer.antialiasing, Antialiasing::Samples(4));
        assert_eq!(plan.source, ShaderSourceSpec::Preset(ProgramPreset::Landing));
        assert_eq!(plan.provider.fetch_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn defaults_without_config() {
        let plan = plan_launch(&RunArgs::default(), None).unwrap();
        assert_eq!(plan.renderer, RendererConfig::default());
        assert_eq!(plan.source, ShaderSourceSpec::default());
        assert_eq!(plan.provider.fetch_timeout(), DEFAULT_FETCH_TIMEOUT);
    }

    #[test]
    fn rejects_non_positive_fetch_timeout() {
        let args = RunArgs {
            fetch_timeout: Some(0.0),
            ..RunArgs::default()
        };
        assert!(plan_launch(&args, None).is_err());
    }

    #[test]
    fn overrides_apply_to_the_selected_preset() {
        let tuning = still_tuning(None, Some(&config())).unwrap();
        let base = ProgramPreset::Ambient.tuning();
        assert_eq!(tuning.fog_opacity, 0.8);
        assert_eq!(tuning.color_a, base.color_a);
        assert_eq!(tuning.blobs.len(), 1);
        assert_eq!(tuning.blobs[0].size, 0.4);
        assert_eq!(tuning.blobs[0].wobble, 0.0);

        let landing = still_tuning(Some(ProgramPreset::Landing), Some(&config())).unwrap();
        assert_eq!(landing.color_a, ProgramPreset::Landing.tuning().color_a);
        assert_eq!(landing.fog_opacity, 0.8);
    }

    #[test]
    fn unknown_config_preset_is_an_error() {
        let config =
            BackdropConfig::from_toml_str("version = 1\n[program]\npreset = \"neon\"\n").unwrap();
        assert!(still_tuning(None, Some(&config)).is_err());
    }

    #[test]
    fn loads_explicit_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, CONFIG).unwrap();
        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.surface.container.as_deref(), Some("HDMI-A-1"));

        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn maps_antialias_settings() {
        assert_eq!(map_antialias(AntialiasSetting::Auto), Antialiasing::Auto);
        assert_eq!(map_antialias(AntialiasSetting::Off), Antialiasing::Off);
        assert_eq!(
            map_antialias(AntialiasSetting::Samples8),
            Antialiasing::Samples(8)
        );
    }
}
