use anyhow::{Context, Result};
use renderer::{export_png, list_outputs, render_still, FragmentProgram, Renderer};
use tracing_subscriber::EnvFilter;

use crate::bindings::{load_config, plan_launch, still_tuning};
use crate::cli::{Cli, RunArgs, StillArgs};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let plan = plan_launch(args, config.as_ref())?;
    tracing::info!(
        source = %plan.source,
        container = ?plan.renderer.container,
        size = ?plan.renderer.requested_size,
        antialias = %plan.renderer.antialiasing,
        "starting backdrop"
    );

    // Remote programs download while the surface is being attached.
    let pending = plan.provider.request(&plan.source);
    let origin = plan.source.to_string();
    Renderer::new(plan.renderer).run(move || {
        pending
            .wait()
            .with_context(|| format!("failed to load fragment program from {origin}"))
    })
}

pub fn still(cli: &Cli, args: &StillArgs) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let tuning = still_tuning(args.preset, config.as_ref())?;
    let program = FragmentProgram::new(tuning);
    let image = render_still(&program, args.size, args.time).context("failed to render still frame")?;
    export_png(&image, &args.output)?;
    println!("{}", args.output.display());
    Ok(())
}

pub fn outputs() -> Result<()> {
    let outputs = list_outputs()?;
    if outputs.is_empty() {
        println!("No monitor outputs were reported.");
        return Ok(());
    }

    println!("Monitor outputs:");
    for output in outputs {
        let refresh = output
            .refresh_millihertz
            .map(|mhz| format!("{:.2}Hz", f64::from(mhz) / 1000.0))
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  {:<16} {}x{} scale={:.2} refresh={}{}",
            output.name,
            output.size.width,
            output.size.height,
            output.scale_factor,
            refresh,
            if output.primary { " (primary)" } else { "" }
        );
    }
    Ok(())
}
