use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "reelflow", version)]
struct Cli {
    /// Log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a session script and write every displayed frame as a PNG.
    Preview(PreviewArgs),
    /// Print the default settings as JSON.
    Defaults,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Input session script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Output directory for `frame_NNNNNN.png` files.
    #[arg(long)]
    out: PathBuf,

    /// Settings JSON replacing the script's own settings.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Stop after this many ticks (overrides the script).
    #[arg(long)]
    ticks: Option<u64>,

    /// Tick as fast as frames are produced instead of at the output fps.
    #[arg(long)]
    full_speed: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Preview(args) => cmd_preview(args),
        Command::Defaults => cmd_defaults(),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let mut script = reelflow::SessionScript::from_path(&args.script)
        .with_context(|| format!("load script '{}'", args.script.display()))?;
    if let Some(path) = &args.settings {
        script.settings = reelflow::Settings::from_path(path)
            .with_context(|| format!("load settings '{}'", path.display()))?;
        script.validate()?;
    }

    let factory = Arc::new(reelflow::SchemeDecoderFactory::new());
    let main = reelflow::MainWorkflow::new(script.settings.clone(), factory)?;
    let surface = reelflow::ClockedSurface::new(
        reelflow::PngSequenceSink::new(&args.out),
        reelflow::ClockedOpts {
            full_speed: args.full_speed,
            max_ticks: args.ticks.or(script.ticks),
        },
    );
    let mut renderer = reelflow::WorkflowRenderer::new(main, surface);
    script.load_into(&renderer)?;
    if renderer.length_ms() == 0 {
        anyhow::bail!("script '{}' has no clips", args.script.display());
    }

    renderer.start_preview()?;
    renderer
        .wait_for_end()
        .with_context(|| format!("preview '{}'", args.script.display()))?;

    let written = renderer.surface().sink().written();
    eprintln!("wrote {written} frames to {}", args.out.display());
    Ok(())
}

fn cmd_defaults() -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&reelflow::Settings::default())
        .context("serialize default settings")?;
    println!("{json}");
    Ok(())
}
