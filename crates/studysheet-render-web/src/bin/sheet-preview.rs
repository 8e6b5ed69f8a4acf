use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use studysheet::{
    validate_location, FilePreferenceStore, MemoryPreferenceStore, Mode, ModeController,
    PreferenceStore, StaticResources, MODE_QUERY_PARAM,
};
use studysheet_render::{
    FlowMetrics, ManualView, MetricsConfig, PaginationConfig, PaginationDiagnostic, PrintProfile,
};
use studysheet_render_web::{render_view_html, SheetSummary};
use url::Url;

const DEFAULT_INPUT_PATH: &str = "crates/studysheet-render/tests/fixtures/manual.xhtml";
const DEFAULT_OUT_PATH: &str = "target/sheet-preview/index.html";

#[derive(Clone, Debug, Default)]
struct Args {
    input_path: String,
    out_path: String,
    config_path: Option<String>,
    summary_path: Option<String>,
    prefs_path: Option<String>,
    location: Option<String>,
    mode: Option<Mode>,
    profile: Option<PrintProfile>,
    width: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct PreviewConfig {
    viewport_width_px: u32,
    pagination: PaginationConfig,
    body_size_px: f32,
    line_height: f32,
    avg_glyph_em: f32,
    px_per_inch: f32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        let metrics = MetricsConfig::default();
        Self {
            viewport_width_px: 1280,
            pagination: PaginationConfig::default(),
            body_size_px: metrics.body_size_px,
            line_height: metrics.body_line_height,
            avg_glyph_em: metrics.avg_glyph_em,
            px_per_inch: metrics.px_per_inch,
        }
    }
}

impl PreviewConfig {
    fn load(path: Option<&str>) -> Result<Self, String> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read(path).map_err(|e| format!("read {}: {}", path, e))?;
        serde_json::from_slice(&raw).map_err(|e| format!("parse {}: {}", path, e))
    }

    fn metrics(&self) -> MetricsConfig {
        MetricsConfig {
            body_size_px: self.body_size_px,
            body_line_height: self.line_height,
            avg_glyph_em: self.avg_glyph_em,
            px_per_inch: self.px_per_inch,
            ..MetricsConfig::default()
        }
    }
}

fn main() -> ExitCode {
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("{}", help_text());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let cli = parse_args(args)?;
    let mut cfg = PreviewConfig::load(cli.config_path.as_deref())?;
    if let Some(width) = cli.width {
        cfg.viewport_width_px = width;
    }
    cfg.pagination.validate().map_err(|e| e.to_string())?;

    if cli.out_path.is_empty() {
        return Err("--out must not be empty".to_string());
    }
    ensure_parent(&cli.out_path)?;

    let location = document_location(&cli.input_path, cli.location.as_deref(), cli.mode)?;
    match cli.prefs_path.as_deref() {
        Some(path) => render(
            &cli,
            &cfg,
            ModeController::new(FilePreferenceStore::new(path), location, cfg.viewport_width_px),
        ),
        None => render(
            &cli,
            &cfg,
            ModeController::new(MemoryPreferenceStore::new(), location, cfg.viewport_width_px),
        ),
    }
}

fn render<S: PreferenceStore>(
    cli: &Args,
    cfg: &PreviewConfig,
    controller: ModeController<S>,
) -> Result<(), String> {
    let measurer = FlowMetrics::new(cfg.metrics());
    let mut view = ManualView::open(
        &cli.input_path,
        StaticResources::new(),
        measurer,
        cfg.pagination,
    )
    .map_err(|e| e.to_string())?;

    let warnings = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&warnings);
    view.set_diagnostic_sink(move |diagnostic| {
        if let PaginationDiagnostic::Unsplittable {
            label,
            page,
            overflow_px,
            ..
        } = diagnostic
        {
            if let Ok(mut seen) = sink.lock() {
                seen.push(format!(
                    "block '{}' overflows page {} by {:.1}px",
                    label, page, overflow_px
                ));
            }
        }
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| e.to_string())?;
    let mode = runtime.block_on(async {
        let mode = view.boot(&controller).await;
        if let Some(profile) = cli.profile {
            view.prepare_for_print(profile).await;
        }
        mode
    });

    let html = render_view_html(&view).map_err(|e| e.to_string())?;
    std::fs::write(&cli.out_path, html).map_err(|e| e.to_string())?;

    if let Some(path) = cli.summary_path.as_deref() {
        ensure_parent(path)?;
        let summary = SheetSummary::from_view(&view);
        let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
        std::fs::write(path, json).map_err(|e| e.to_string())?;
    }

    if let Ok(seen) = warnings.lock() {
        for warning in seen.iter() {
            eprintln!("warning: {}", warning);
        }
    }
    println!(
        "wrote sheet preview to {} (mode={}, profile={}, pages={}, blocks={})",
        cli.out_path,
        mode,
        view.session()
            .print_profile
            .map(PrintProfile::as_str)
            .unwrap_or("none"),
        view.pages().len(),
        view.placements().len(),
    );
    Ok(())
}

fn ensure_parent(path: &str) -> Result<(), String> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

fn document_location(
    input_path: &str,
    served_at: Option<&str>,
    mode: Option<Mode>,
) -> Result<Url, String> {
    let mut url = match served_at {
        Some(location) => validate_location(location).map_err(|e| e.to_string())?,
        None => {
            let absolute = std::fs::canonicalize(input_path)
                .map_err(|e| format!("resolve {}: {}", input_path, e))?;
            Url::from_file_path(&absolute)
                .map_err(|()| format!("cannot express {} as a location", absolute.display()))?
        }
    };
    if let Some(mode) = mode {
        url.query_pairs_mut()
            .append_pair(MODE_QUERY_PARAM, mode.as_str());
    }
    Ok(url)
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        return Err("help requested".to_string());
    }

    let has_positional_input = args.get(1).is_some_and(|v| !v.starts_with("--"));
    let mut cfg = Args {
        input_path: if has_positional_input {
            args[1].clone()
        } else {
            DEFAULT_INPUT_PATH.to_string()
        },
        out_path: DEFAULT_OUT_PATH.to_string(),
        ..Args::default()
    };

    let mut i = if has_positional_input { 2usize } else { 1usize };
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| format!("{} requires a value", flag))
        };
        match flag {
            "--out" => cfg.out_path = value()?,
            "--config" => cfg.config_path = Some(value()?),
            "--summary" => cfg.summary_path = Some(value()?),
            "--prefs" => cfg.prefs_path = Some(value()?),
            "--location" => cfg.location = Some(value()?),
            "--mode" => {
                let v = value()?;
                cfg.mode = Some(
                    Mode::parse(&v).ok_or_else(|| format!("invalid --mode value '{}'", v))?,
                );
            }
            "--print" => {
                let v = value()?;
                cfg.profile = Some(
                    PrintProfile::parse(&v)
                        .ok_or_else(|| format!("invalid --print value '{}'", v))?,
                );
            }
            "--width" => {
                let v = value()?;
                cfg.width = Some(
                    v.parse::<u32>()
                        .map_err(|_| format!("invalid --width value '{}'", v))?,
                );
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
        i += 2;
    }
    Ok(cfg)
}

fn help_text() -> &'static str {
    r#"USAGE:
  sheet-preview [input.xhtml] [options]

OPTIONS:
  --out <path>        output HTML file (default: target/sheet-preview/index.html)
  --mode <mode>       a4|mobile, passed as the mode request parameter
  --print <profile>   a4|mobile, prepare a print run after boot
  --width <px>        viewport width used for the default mode (default: 1280)
  --config <path>     JSON preview config (pagination and metrics overrides)
  --summary <path>    also write the placement summary as JSON
  --prefs <path>      persist the mode preference in a JSON file
  --location <url>    location the sheet is served from (default: file URL of input)

DEFAULT INPUT:
  crates/studysheet-render/tests/fixtures/manual.xhtml
"#
}
