use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};
use simplelog::{Config, WriteLogger};

use altoview::context::{ContextSummary, LogReporter};
use altoview::loader::PageLoader;
use altoview::loader::fs::FsPageLoader;
use altoview::loader::http::{HttpPageLoader, is_remote};
use altoview::panic_handler::initialize_panic_handler;
use altoview::settings::Settings;
use altoview::viewer::{
    PageOverlay, Point, ScaleLimits, SessionEvent, Size, ViewerData, ViewerSession, fit_to_canvas,
};

const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "altoview")]
#[command(about = "Show how a transcribed document page is laid out on the viewer canvas")]
#[command(version)]
struct Cli {
    /// Viewer JSON file: {"pages": [{"image": ..., "textLayer": ...}], ...}
    viewer: PathBuf,

    /// Page to show (1-based)
    #[arg(short, long, default_value_t = 1)]
    page: usize,

    /// Search the loaded pages for this text
    #[arg(short, long)]
    search: Option<String>,

    /// Canvas size in CSS pixels
    #[arg(long, default_value = "1024x768", value_parser = parse_size)]
    canvas: Size,

    /// Hit-test a canvas point "x,y" and select the line under it
    #[arg(long, value_parser = parse_point)]
    point: Option<Point>,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "altoview.log")]
    log_file: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s:?}"))?;
    let width: f64 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let height: f64 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    if width <= 0.0 || height <= 0.0 {
        return Err("canvas size must be positive".to_string());
    }
    Ok(Size::new(width, height))
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y, got {s:?}"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("x: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("y: {e}"))?;
    Ok(Point::new(x, y))
}

/// HTTP(S) documents go over the network, everything else is read from
/// disk relative to the viewer file
fn loader_for(data: &ViewerData, viewer: &Path) -> Result<Arc<dyn PageLoader>> {
    let remote = data.pages.iter().any(|page| is_remote(&page.image));
    if remote {
        info!("Using HTTP loader");
        return Ok(Arc::new(HttpPageLoader::new()?));
    }
    let base_dir = viewer.parent().map(PathBuf::from).unwrap_or_default();
    info!("Using filesystem loader rooted at {}", base_dir.display());
    Ok(Arc::new(FsPageLoader::new(base_dir)))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(cli.log_level, Config::default(), File::create(&cli.log_file)?)?;
    initialize_panic_handler();
    info!("Starting altoview");

    let settings = match &cli.config {
        Some(path) => Settings::load_from_path(path)?,
        None => Settings::load(),
    };

    let raw = std::fs::read_to_string(&cli.viewer)
        .with_context(|| format!("reading {}", cli.viewer.display()))?;
    let data: ViewerData = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", cli.viewer.display()))?;
    if data.pages.is_empty() {
        bail!("{} lists no pages", cli.viewer.display());
    }
    if cli.page == 0 || cli.page > data.page_count() {
        bail!("page {} out of range 1..={}", cli.page, data.page_count());
    }

    let loader = loader_for(&data, &cli.viewer)?;
    let mut session = ViewerSession::with_settings(data, loader, LogReporter, &settings);

    let index = cli.page - 1;
    let mut events = session.go_to_page(index);
    let deadline = Instant::now() + LOAD_TIMEOUT;
    while session.shown_page().is_none_or(|page| page.index != index) {
        if events
            .iter()
            .any(|e| matches!(e, SessionEvent::PageFailed { index: i, .. } if *i == index))
        {
            break;
        }
        if Instant::now() >= deadline {
            bail!("timed out loading page {}", cli.page);
        }
        events = session.wait(Duration::from_millis(100));
    }
    let Some(page) = session.shown_page().cloned() else {
        bail!(
            "page {} could not be loaded, see {}",
            cli.page,
            cli.log_file.display()
        );
    };

    let label = session
        .data()
        .label(index)
        .map(|l| format!(" ({l})"))
        .unwrap_or_default();
    println!("Page {} of {}{label}", cli.page, session.page_count());

    let image_size = page
        .image_size
        .map(|(w, h)| Size::new(f64::from(w), f64::from(h)))
        .unwrap_or(Size::new(
            f64::from(page.text_layer.page_width),
            f64::from(page.text_layer.page_height),
        ));
    let limits = ScaleLimits {
        min: settings.view.min_scale,
        max: settings.view.max_scale,
    };
    let transform = fit_to_canvas(image_size, cli.canvas, settings.view.fit_padding, limits);
    println!(
        "Image {}x{}, fitted to {}x{}: scale {:.4}, offset ({:.1}, {:.1})",
        image_size.width,
        image_size.height,
        cli.canvas.width,
        cli.canvas.height,
        transform.scale,
        transform.x,
        transform.y
    );

    let mut overlay = PageOverlay::new();
    overlay.set_page(Arc::clone(&page));
    println!(
        "{} text lines, {} hit-testable",
        page.text_layer.text_lines.len(),
        overlay.hits().len()
    );

    if let Some(point) = cli.point {
        let image = transform.screen_to_image(point.x, point.y);
        match overlay.hit_at(image).map(|hit| hit.line_id.clone()) {
            Some(line_id) => {
                let text = page
                    .text_layer
                    .line(&line_id)
                    .map(|line| line.transcription.as_str())
                    .unwrap_or_default();
                println!(
                    "({}, {}) -> image ({:.1}, {:.1}): line {line_id} \"{text}\"",
                    point.x, point.y, image.x, image.y
                );
                session.select_line(&line_id);
            }
            None => println!(
                "({}, {}) -> image ({:.1}, {:.1}): no line",
                point.x, point.y, image.x, image.y
            ),
        }
    }

    if let Some(query) = &cli.search {
        let count = session.set_search(query);
        println!(
            "Search {query:?} over loaded pages: {count} matches {}",
            session.search().get_match_info()
        );
        for found in session.search().matches() {
            println!("  page {} line {}", found.page + 1, found.line_id);
        }
    }

    let summary = ContextSummary::for_page(
        &page,
        session.page_count(),
        session.data().label(index),
        session.selected_line(),
    );
    println!("---\n{}", summary.render(settings.context.max_transcription_chars));

    session.close();
    info!("Shutting down altoview");
    Ok(())
}
