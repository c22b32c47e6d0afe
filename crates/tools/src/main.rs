use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use formats::geojson::{VectorChunk, VectorGeometry};
use scene::shapes::DrawEvent;
use streaming::source::{HttpSource, TelemetrySource};
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewer::{
    ApplyResult, Download, DownloadSink, ExportFormat, ExportSource, MapSession, RecordingSidebar,
    ViewerConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Query and export collar telemetry")]
struct Cli {
    /// Telemetry API base URL (overrides TELEMETRY_API_BASE_URL)
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct WindowArgs {
    /// First day, YYYY-MM-DD (default: trailing window ending today)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day, YYYY-MM-DD (default: today)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// GeoJSON file whose polygons select pings; may be repeated
    #[arg(long)]
    shape: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the devices with pings inside the given shapes
    Select {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Write the selected pings (or all pings) to a file
    Export {
        #[command(flatten)]
        window: WindowArgs,

        /// kml or geojson (default: TELEMETRY_EXPORT_FORMAT, then kml)
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Ignore shapes and export every ping in the window
        #[arg(long)]
        all: bool,

        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Print the first and last day with recorded pings
    Extent,
}

/// Writes downloads into a directory under their own filename.
struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, download: Download) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&download.filename);
        fs::write(&path, download.content)?;
        self.written.push(path);
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = ViewerConfig::from_env().context("reading TELEMETRY_* environment")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    let mut source = HttpSource::new(config.api_base_url.clone());
    if let Some(token) = &config.api_token {
        source = source.with_token(token.clone());
    }
    let source: Arc<dyn TelemetrySource> = Arc::new(source);

    match cli.command {
        Command::Select { window } => {
            let session = load_session(config, source, &window).await?;
            for id in session.selected_device_ids() {
                println!("{id}");
            }
        }
        Command::Export {
            window,
            format,
            all,
            out_dir,
        } => {
            if let Some(format) = format {
                config.export_format = format;
            }
            let mut session = load_session(config, source, &window).await?;
            let export_source = if all {
                ExportSource::All
            } else {
                ExportSource::Selection
            };
            let mut sink = DirectorySink {
                dir: out_dir,
                written: Vec::new(),
            };
            session
                .export_to(&mut sink, export_source)
                .context("exporting pings")?;
            for path in &sink.written {
                println!("{}", path.display());
            }
        }
        Command::Extent => {
            let extent = source
                .fetch_ping_extent()
                .await
                .context("fetching ping extent")?;
            println!("{} {}", extent.min, extent.max);
        }
    }
    Ok(())
}

async fn load_session(
    config: ViewerConfig,
    source: Arc<dyn TelemetrySource>,
    args: &WindowArgs,
) -> anyhow::Result<MapSession> {
    let today = Utc::now().date_naive();
    let mut session = MapSession::new(config, source, today);
    session.initialize(&mut RecordingSidebar::default());

    let start = args.start.unwrap_or(session.window().start());
    let end = args.end.unwrap_or(session.window().end());
    session.set_window(start, end);

    match session.refresh().await {
        ApplyResult::Applied { pings, tracks } => {
            info!("{} loaded: {pings} pings, {tracks} tracks", session.window());
        }
        ApplyResult::Failed(err) => bail!("fetching telemetry for {}: {err}", session.window()),
        ApplyResult::Stale => bail!("window changed while fetching"),
    }

    for path in &args.shape {
        for geometry in read_shapes(path)? {
            session
                .dispatch_draw(&DrawEvent::ShapeCreated { geometry })
                .with_context(|| format!("shape in {}", path.display()))?;
        }
    }
    Ok(session)
}

/// Polygon geometries from a GeoJSON feature collection.
fn read_shapes(path: &Path) -> anyhow::Result<Vec<VectorGeometry>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let chunk = VectorChunk::from_geojson_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(chunk
        .features
        .into_iter()
        .map(|f| f.geometry)
        .filter(|g| matches!(g, VectorGeometry::Polygon(_) | VectorGeometry::MultiPolygon(_)))
        .collect())
}
