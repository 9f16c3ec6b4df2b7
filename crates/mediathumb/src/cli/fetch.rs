//! The `mediathumb fetch` command for loading a single thumbnail.

use clap::{Args, ValueEnum};
use mediathumb_core::pipeline::{ImageResource, ResourceDecoder};
use mediathumb_core::{
    BitmapPool, Config, DirectoryMediaIndex, LoadOutcome, LoadRequest, MediaIndex, NoopBitmapPool,
    Priority, StillImageDecoder, ThumbnailDecoder, ThumbnailPipeline, ThumbnailSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Arguments for the `fetch` command.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Content uri to load, e.g. content://media/42
    #[arg(required = true)]
    pub uri: String,

    /// Requested width in pixels (defaults to fetch.default_width)
    #[arg(long)]
    pub width: Option<u32>,

    /// Requested height in pixels (defaults to fetch.default_height)
    #[arg(long)]
    pub height: Option<u32>,

    /// Decoder variant
    #[arg(long, value_enum, default_value = "still")]
    pub variant: Variant,

    /// Scheduling priority
    #[arg(long, value_enum, default_value = "normal")]
    pub priority: PriorityArg,

    /// Media directory (overrides index.root_dir)
    #[arg(long, env = "MEDIATHUMB_ROOT")]
    pub root: Option<PathBuf>,

    /// Write the thumbnail to this file; format follows the extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Which decoder the pipeline is built with.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum Variant {
    /// Static image decoder
    #[default]
    Still,
    /// Animation-capable decoder (always a single frame)
    Animated,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PriorityArg {
    Immediate,
    High,
    Normal,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Immediate => Priority::Immediate,
            PriorityArg::High => Priority::High,
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::Low => Priority::Low,
        }
    }
}

/// Execute the fetch command.
pub async fn execute(args: FetchArgs, config: &Config) -> anyhow::Result<()> {
    let index: Arc<dyn MediaIndex> = match &args.root {
        Some(root) => Arc::new(DirectoryMediaIndex::new(
            root.clone(),
            config.index.extensions.clone(),
        )),
        None => Arc::new(DirectoryMediaIndex::from_config(config)),
    };
    let source = ThumbnailSource::new(index);
    // One load per process: nothing would ever take a buffer back out.
    let pool: Arc<dyn BitmapPool> = Arc::new(NoopBitmapPool);

    let width = args.width.unwrap_or(config.fetch.default_width);
    let height = args.height.unwrap_or(config.fetch.default_height);
    if width == 0 || height == 0 {
        anyhow::bail!("Thumbnail size must be non-zero, got {width}x{height}");
    }

    let cancel = CancellationToken::new();
    let request = LoadRequest::new(args.uri.clone(), width, height)
        .with_priority(args.priority.into())
        .with_cancellation(cancel.clone());

    // Ctrl-C cancels the load instead of killing the process mid-write.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling load");
            cancel.cancel();
        }
    });

    match args.variant {
        Variant::Still => {
            let pipeline = ThumbnailPipeline::new(source, StillImageDecoder::new(pool), config);
            run(pipeline, request, args.output.as_deref()).await
        }
        Variant::Animated => {
            let pipeline = ThumbnailPipeline::new(source, ThumbnailDecoder::new(pool), config);
            run(pipeline, request, args.output.as_deref()).await
        }
    }
}

async fn run<D: ResourceDecoder + 'static>(
    pipeline: ThumbnailPipeline<D>,
    request: LoadRequest,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let key = request.key();
    let start = std::time::Instant::now();

    let resource = match pipeline.load(request).await? {
        LoadOutcome::Loaded(resource) => resource,
        LoadOutcome::NoResult => anyhow::bail!("No thumbnail available for {key}"),
        LoadOutcome::Cancelled => anyhow::bail!("Load of {key} was cancelled"),
    };

    let image = resource.image();
    tracing::debug!("Loaded {} in {:?}", key, start.elapsed());

    match output {
        Some(path) => {
            image.save(path)?;
            println!(
                "Saved {}x{} thumbnail to {}",
                image.width(),
                image.height(),
                path.display()
            );
        }
        None => println!("{}: {}x{}", key, image.width(), image.height()),
    }

    Ok(())
}
