use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doc_model::{
    apply_reader_action, AnnotationId, AnnotationRecord, CanvasPreferences, Color, DocumentId,
    ReaderAction, ReaderState,
};
use pdf_engine::{EngineConfig, LopdfEngine, OpenSource, PageSize, PdfEngine, RenderRequest};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{AnnotationService, Storage};
use viewer_core::{AnnotationCanvas, AnnotationStore, RasterSurface};

pub mod session;

use session::{DrawSession, EnginePages, GestureScript};

#[derive(Debug, Parser)]
#[command(name = "lecturemark-cli")]
#[command(about = "Lecturemark annotation canvas CLI")]
pub struct Cli {
    /// Directory holding preferences and stored annotations.
    #[arg(long, global = true, env = "LECTUREMARK_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Replay a recorded gesture script through the annotation canvas.
    Draw {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        document: u64,
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
    },
    /// Print stored annotations for a document.
    List {
        #[arg(long)]
        document: u64,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Remove one stored annotation.
    Delete {
        #[arg(long)]
        document: u64,
        #[arg(long)]
        id: u64,
    },
    /// Render a page with its annotation overlay to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        document: u64,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show or change drawing preferences.
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum PrefsCommand {
    Show,
    Set(PrefsUpdate),
}

#[derive(Debug, Args)]
struct PrefsUpdate {
    #[arg(long)]
    pen_color: Option<Color>,
    #[arg(long)]
    highlight_color: Option<Color>,
    #[arg(long)]
    pen_width: Option<f32>,
    #[arg(long)]
    min_highlight_size: Option<f32>,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    document: u64,
    records: Vec<AnnotationRecord>,
    malformed: usize,
}

#[derive(Debug, Serialize)]
struct RenderOutput {
    path: String,
    page: u32,
    width: u32,
    height: u32,
    annotations: usize,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let data_dir = cli.data_dir;

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Draw { file, document, script } => {
            run_draw(&open_storage(data_dir)?, &file, DocumentId(document), &script)
        }
        Commands::List { document, page } => {
            run_list(&open_storage(data_dir)?, DocumentId(document), page)
        }
        Commands::Delete { document, id } => {
            run_delete(&open_storage(data_dir)?, DocumentId(document), AnnotationId(id))
        }
        Commands::Render { file, document, page, scale, output } => run_render(
            &open_storage(data_dir)?,
            &file,
            DocumentId(document),
            page,
            scale,
            output.as_deref(),
        ),
        Commands::Prefs { command } => run_prefs(&open_storage(data_dir)?, command),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_storage(data_dir: Option<PathBuf>) -> Result<Storage> {
    let storage = match data_dir {
        Some(root) => Storage::with_root(root),
        None => Storage::from_default_project().context("failed to locate data directory")?,
    };
    tracing::debug!(root = %storage.root().display(), "using data directory");
    Ok(storage)
}

fn run_info(file: &Path) -> Result<()> {
    let (mut engine, handle) = open_pdf(file)?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    engine.close(handle)?;

    Ok(())
}

fn run_draw(storage: &Storage, file: &Path, document: DocumentId, script: &Path) -> Result<()> {
    let script_text = fs::read_to_string(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;
    let script: GestureScript =
        serde_json::from_str(&script_text).context("failed to parse gesture script")?;

    let sizes = page_sizes(file)?;
    let pages = EnginePages::new(sizes);
    let page_count = pages.page_count();
    let prefs = storage.load_preferences().context("failed to load preferences")?;

    let canvas = AnnotationCanvas::new(document, prefs, pages, RasterSurface::new());
    let mut session =
        DrawSession::start(canvas, storage, page_count).context("failed to start canvas")?;
    session.run(&script).context("failed to replay gesture script")?;

    let (summary, _) = session.finish();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_list(storage: &Storage, document: DocumentId, page: Option<u32>) -> Result<()> {
    let mut records = storage.list(document).context("failed to list annotations")?;
    if let Some(page) = page {
        records.retain(|record| record.page_number == page);
    }

    let mut store = AnnotationStore::new();
    let summary = store.replace_from_records(&records);

    let output = ListOutput { document: document.0, records, malformed: summary.dropped };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_delete(storage: &Storage, document: DocumentId, id: AnnotationId) -> Result<()> {
    if !storage.delete(document, id).context("failed to delete annotation")? {
        anyhow::bail!("no annotation {} in document {document}", id.0);
    }

    println!("deleted:{}", id.0);
    Ok(())
}

fn run_render(
    storage: &Storage,
    file: &Path,
    document: DocumentId,
    page: u32,
    scale: f32,
    output: Option<&Path>,
) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let (mut engine, handle) = open_pdf(file)?;
    let page_count = engine.page_count(handle)?;
    if page > page_count {
        anyhow::bail!("page {page} out of range (page_count={page_count})");
    }

    let mut reader = ReaderState::with_page_count(page_count);
    apply_reader_action(&mut reader, ReaderAction::SetPage(page));
    apply_reader_action(&mut reader, ReaderAction::SetScale(scale));

    let mut page_image = engine
        .render_page(handle, RenderRequest { page_index: page - 1, scale: reader.scale })
        .context("failed to render page")?;

    let sizes = collect_page_sizes(&engine, handle, page_count)?;
    engine.close(handle)?;

    let prefs = storage.load_preferences().context("failed to load preferences")?;
    let records = storage.list(document).context("failed to list annotations")?;

    let mut canvas =
        AnnotationCanvas::new(document, prefs, EnginePages::new(sizes), RasterSurface::new());
    canvas.replace_annotations(&records);
    canvas.sync_reader(&reader).context("failed to apply reader state")?;
    canvas.redraw();

    let annotations = canvas.page_annotations().len();
    let overlay = canvas.into_surface().into_image();
    image::imageops::overlay(&mut page_image, &overlay, 0, 0);

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    page_image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    let payload = RenderOutput {
        path: output.display().to_string(),
        page,
        width: page_image.width(),
        height: page_image.height(),
        annotations,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn run_prefs(storage: &Storage, command: PrefsCommand) -> Result<()> {
    let mut prefs = storage.load_preferences().context("failed to load preferences")?;

    if let PrefsCommand::Set(update) = command {
        apply_prefs_update(&mut prefs, update)?;
        storage.save_preferences(&prefs).context("failed to save preferences")?;
    }

    println!("{}", serde_json::to_string_pretty(&prefs)?);
    Ok(())
}

fn apply_prefs_update(prefs: &mut CanvasPreferences, update: PrefsUpdate) -> Result<()> {
    if let Some(color) = update.pen_color {
        prefs.pen_color = color;
        prefs.active_color = color;
    }
    if let Some(color) = update.highlight_color {
        prefs.highlight_color = color;
    }
    if let Some(width) = update.pen_width {
        prefs.pen_width = width;
    }
    if let Some(size) = update.min_highlight_size {
        prefs.min_highlight_size = size;
    }
    prefs.validate().context("rejected preference update")?;
    Ok(())
}

fn open_pdf(file: &Path) -> Result<(LopdfEngine, pdf_engine::DocumentHandle)> {
    ensure_pdf_exists(file)?;

    let mut engine = pdf_engine::initialize(EngineConfig::default());
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;
    Ok((engine, handle))
}

fn page_sizes(file: &Path) -> Result<Vec<PageSize>> {
    let (mut engine, handle) = open_pdf(file)?;
    let page_count = engine.page_count(handle)?;
    let sizes = collect_page_sizes(&engine, handle, page_count)?;
    engine.close(handle)?;
    Ok(sizes)
}

fn collect_page_sizes(
    engine: &LopdfEngine,
    handle: pdf_engine::DocumentHandle,
    page_count: u32,
) -> Result<Vec<PageSize>> {
    (0..page_count)
        .map(|index| engine.page_size(handle, index).context("failed to read page size"))
        .collect()
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}-annotated.png"))
}
