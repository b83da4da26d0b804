use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pagefit::snapshot::MeasuredElement;
use pagefit::{AvoidBreakCheck, PageFitChecker, PageFitConfig, PrintPipeline, Viewport};
use tracing_subscriber::EnvFilter;

/// Check that print templates fit on a page before PDF conversion
#[derive(Parser)]
#[command(name = "pagefit", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a template (or a measurement snapshot) against the page budget
    Check(CheckArgs),
    /// Lay out a template and print its measurements as a JSON snapshot
    Measure(MeasureArgs),
}

#[derive(Args)]
struct CheckArgs {
    /// Template path or http(s) URL; a JSON file with --snapshot
    source: String,
    /// Treat SOURCE as a JSON measurement snapshot instead of HTML
    #[arg(long)]
    snapshot: bool,
    /// JSON file with pageWidthPx / pageHeightPx / pageName / avoidBreak
    #[arg(long)]
    config: Option<PathBuf>,
    /// Maximum element width in pixels
    #[arg(long)]
    page_width: Option<f64>,
    /// Maximum body and unsplittable element height in pixels
    #[arg(long)]
    page_height: Option<f64>,
    /// Page name used in messages
    #[arg(long)]
    page_name: Option<String>,
    /// Which height `break-inside: avoid` elements are checked against
    #[arg(long, value_enum)]
    avoid_break: Option<AvoidBreakArg>,
    #[command(flatten)]
    viewport: ViewportArgs,
}

#[derive(Args)]
struct MeasureArgs {
    /// Template path or http(s) URL
    source: String,
    #[command(flatten)]
    viewport: ViewportArgs,
}

#[derive(Args)]
struct ViewportArgs {
    /// Layout viewport width in pixels
    #[arg(long, default_value_t = Viewport::default().width)]
    viewport_width: u32,
    /// Layout viewport height in pixels
    #[arg(long, default_value_t = Viewport::default().height)]
    viewport_height: u32,
}

impl From<&ViewportArgs> for Viewport {
    fn from(args: &ViewportArgs) -> Self {
        Viewport {
            width: args.viewport_width,
            height: args.viewport_height,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AvoidBreakArg {
    /// Re-check the document body's height
    Document,
    /// Check the element's own height
    Element,
}

impl From<AvoidBreakArg> for AvoidBreakCheck {
    fn from(arg: AvoidBreakArg) -> Self {
        match arg {
            AvoidBreakArg::Document => AvoidBreakCheck::DocumentHeight,
            AvoidBreakArg::Element => AvoidBreakCheck::ElementHeight,
        }
    }
}

fn page_config(args: &CheckArgs) -> anyhow::Result<PageFitConfig> {
    let mut cfg = match &args.config {
        Some(path) => PageFitConfig::from_path(path)?,
        None => PageFitConfig::default(),
    };
    if let Some(w) = args.page_width {
        cfg.page_width_px = w;
    }
    if let Some(h) = args.page_height {
        cfg.page_height_px = h;
    }
    if let Some(name) = &args.page_name {
        cfg.page_name = name.clone();
    }
    if let Some(mode) = args.avoid_break {
        cfg.avoid_break = mode.into();
    }
    Ok(cfg)
}

#[cfg(feature = "html")]
fn render(source: &str, viewport: Viewport) -> anyhow::Result<pagefit::rendering::RenderedDocument> {
    use pagefit::loader::{LoaderConfig, TemplateLoader};

    let loader = TemplateLoader::new(LoaderConfig::default())?;
    let template = loader
        .load(source)
        .with_context(|| format!("loading {}", source))?;
    let doc = pagefit::rendering::render_html(&template.html, &template.linked_styles, viewport)
        .with_context(|| format!("rendering {}", source))?;
    Ok(doc)
}

#[cfg(not(feature = "html"))]
fn render(_source: &str, _viewport: Viewport) -> anyhow::Result<std::convert::Infallible> {
    anyhow::bail!("HTML templates need the `html` feature; pass --snapshot to check a JSON snapshot")
}

#[cfg(feature = "html")]
fn check_html(pipeline: &PrintPipeline, args: &CheckArgs) -> anyhow::Result<pagefit::Result<()>> {
    let doc = render(&args.source, Viewport::from(&args.viewport))?;
    Ok(pipeline.document_ready(&doc.body, |_| Ok(())))
}

#[cfg(not(feature = "html"))]
fn check_html(_pipeline: &PrintPipeline, args: &CheckArgs) -> anyhow::Result<pagefit::Result<()>> {
    match render(&args.source, Viewport::from(&args.viewport))? {}
}

fn check(args: &CheckArgs) -> anyhow::Result<ExitCode> {
    let cfg = page_config(args)?;
    let pipeline = PrintPipeline::new(PageFitChecker::new(cfg)?);

    let outcome = if args.snapshot {
        let body = MeasuredElement::from_path(&args.source)
            .with_context(|| format!("reading snapshot {}", args.source))?;
        pipeline.document_ready(&body, |_| Ok(()))
    } else {
        check_html(&pipeline, args)?
    };

    match outcome {
        Ok(()) => {
            println!("{}: fits on {} page", args.source, pipeline.checker().config().page_name);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_overflow() => {
            eprintln!("{}: {}", args.source, e);
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(feature = "html")]
fn measure(args: &MeasureArgs) -> anyhow::Result<ExitCode> {
    let doc = render(&args.source, Viewport::from(&args.viewport))?;
    println!("{}", MeasuredElement::from(&doc.body).to_json_pretty()?);
    Ok(ExitCode::SUCCESS)
}

#[cfg(not(feature = "html"))]
fn measure(args: &MeasureArgs) -> anyhow::Result<ExitCode> {
    match render(&args.source, Viewport::from(&args.viewport))? {}
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Check(args) => check(args),
        Command::Measure(args) => measure(args),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("pagefit: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
