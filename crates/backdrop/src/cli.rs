use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::{Antialiasing, ProgramPreset};

#[derive(Parser, Debug)]
#[command(
    name = "backdrop",
    author,
    version,
    about = "Animated shader background",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Configuration file (defaults to `<config dir>/backdrop.toml` when present).
    #[arg(long, global = true, value_name = "FILE", env = "BACKDROP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Fragment program: `preset:<name>`, a file path, inline GLSL or an http(s) URL.
    #[arg(long, value_name = "SPEC")]
    pub shader: Option<String>,

    /// Built-in program to render when no `--shader` is given.
    #[arg(long, value_name = "NAME", value_parser = parse_preset)]
    pub preset: Option<ProgramPreset>,

    /// Monitor output hosting the background (see `backdrop outputs`).
    #[arg(long, value_name = "OUTPUT")]
    pub container: Option<String>,

    /// Render into a window of this logical size instead of fullscreen.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_dimensions)]
    pub size: Option<(u32, u32)>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<Antialiasing>,

    /// Upper bound on how long a remote shader download may take (seconds).
    #[arg(long, value_name = "SECONDS")]
    pub fetch_timeout: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one frame of a built-in program to a PNG without a GPU.
    Still(StillArgs),
    /// List monitor outputs usable with `--container`.
    Outputs,
}

#[derive(Parser, Debug)]
pub struct StillArgs {
    /// Elapsed time in seconds to evaluate.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    pub time: f64,

    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_dimensions, default_value = "1920x1080")]
    pub size: (u32, u32),

    /// Destination PNG path.
    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    #[arg(long, value_name = "NAME", value_parser = parse_preset)]
    pub preset: Option<ProgramPreset>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    if value.trim().is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }
    value.parse()
}

pub fn parse_preset(value: &str) -> Result<ProgramPreset, String> {
    ProgramPreset::from_name(value).ok_or_else(|| {
        let known: Vec<_> = ProgramPreset::ALL.iter().map(|preset| preset.name()).collect();
        format!("unknown preset '{}'; expected one of {}", value.trim(), known.join(", "))
    })
}

pub fn parse_dimensions(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width in dimensions".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height in dimensions".to_string())?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dimensions() {
        assert_eq!(parse_dimensions("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_dimensions(" 800 X 600 "), Ok((800, 600)));
        assert!(parse_dimensions("0x600").is_err());
        assert!(parse_dimensions("wide").is_err());
    }

    #[test]
    fn parses_presets_case_insensitively() {
        assert_eq!(parse_preset("Ambient"), Ok(ProgramPreset::Ambient));
        let err = parse_preset("neon").unwrap_err();
        assert!(err.contains("landing"));
    }

    #[test]
    fn still_subcommand_parses() {
        let cli = Cli::try_parse_from([
            "backdrop", "still", "--time", "2.5", "--size", "64x32", "--output", "frame.png",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Still(args)) => {
                assert_eq!(args.time, 2.5);
                assert_eq!(args.size, (64, 32));
                assert_eq!(args.output, PathBuf::from("frame.png"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "backdrop",
            "--container",
            "DP-1",
            "--antialias",
            "off",
            "--shader",
            "preset:ambient",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.container.as_deref(), Some("DP-1"));
        assert_eq!(cli.run.antialias, Some(Antialiasing::Off));
        assert!(Cli::try_parse_from(["backdrop", "--antialias", "3"]).is_err());
    }
}
