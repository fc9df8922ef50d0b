use device_frame_core::{
    config::Config,
    gallery::{self, GalleryFilter},
    geometry,
    init,
    AppError,
    FrameStatus,
    FrameStudio,
    SourceImage,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Screenshot to frame (PNG, JPEG or WebP)
    input: Option<PathBuf>,

    /// Device category, e.g. "iOS" or "android-phone"
    #[arg(long)]
    category: Option<String>,

    /// Device model within the category
    #[arg(short, long)]
    device: Option<String>,

    /// Color or finish of the device
    #[arg(long)]
    variation: Option<String>,

    /// Background color behind the device, e.g. "#1e1e1e" (default transparent)
    #[arg(short, long)]
    background: Option<String>,

    /// Where to write the framed PNG (defaults to "<device>-<variation>-<date>.png")
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print where the screenshot would sit inside the frame and exit
    #[arg(long)]
    preview: bool,

    /// List categories, devices and variations and exit
    #[arg(long)]
    list: bool,

    /// Print the frame gallery and exit
    #[arg(long)]
    gallery: bool,

    /// Only show gallery devices or variants containing this text
    #[arg(long, requires = "gallery")]
    search: Option<String>,

    /// Override the frame service URL defined in .env
    #[arg(long)]
    api_url: Option<String>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    init();
    let args = Args::parse();
    init_tracing(args.verbose);

    // Load config and override the service URL if specified via CLI
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = &args.api_url {
        config.api_base_url = url.parse().context("Invalid --api-url")?;
    }

    let mut studio = FrameStudio::new(config).context("Failed to initialize frame service client")?;
    if let Err(e) = studio.load_catalog().await {
        let message = match &e {
            AppError::CatalogLoad(load) => load.user_message(),
            _ => "Failed to load device list.",
        };
        return Err(anyhow::Error::new(e).context(message));
    }

    // Handle --list
    if args.list {
        print_devices(&studio);
        return Ok(());
    }

    // Handle --gallery
    if args.gallery {
        print_gallery(&studio, &args);
        return Ok(());
    }

    // Apply explicit selection top-down so each level cascades into the next
    if let Some(category) = &args.category {
        studio.set_category(category)?;
    }
    if let Some(device) = &args.device {
        studio.set_device(device)?;
    }
    if let Some(variation) = &args.variation {
        studio.set_variation(variation)?;
    }
    studio.set_background_color(args.background.as_deref());

    let selection = studio.selection().selection.clone();
    println!(
        "Frame: {} / {} / {}",
        gallery::category_label(&selection.category),
        selection.device,
        selection.variation
    );

    // Handle --preview
    if args.preview {
        print_preview(&studio);
        return Ok(());
    }

    let Some(input) = args.input.as_ref() else {
        bail!("No screenshot given. Pass a file path, or use --list / --gallery / --preview");
    };
    let source = SourceImage::from_path(input)
        .with_context(|| format!("Failed to read screenshot {}", input.display()))?;

    // Send to API
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.green} {msg}")?
    );
    spinner.set_message(format!("Framing {}...", source.file_name()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    if studio.submit_frame(source).is_none() {
        spinner.finish_and_clear();
        bail!("The selected device has no frame to apply");
    }
    studio.settle().await;
    spinner.finish_and_clear();

    match studio.request_status() {
        FrameStatus::Succeeded { .. } => {
            let output = match args.output {
                Some(path) => path,
                None => {
                    let today = chrono::Local::now().date_naive();
                    let name = studio
                        .download_file_name(today)
                        .context("Selection is incomplete")?;
                    PathBuf::from(name)
                }
            };
            studio
                .save_result(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Saved {}", output.display());
        }
        FrameStatus::Failed { error, .. } => bail!("Frame service error: {}", error),
        other => bail!("Frame request did not finish (status: {:?})", other),
    }

    Ok(())
}

/// Logs go to stderr; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default = if verbose { "device_frame_core=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_devices(studio: &FrameStudio) {
    let Some(catalog) = studio.catalog() else {
        return;
    };
    for category in catalog.categories() {
        println!("{} ({})", gallery::category_label(category), category);
        for device in catalog.devices_of(category).into_iter().flatten() {
            let variations: Vec<&str> = catalog
                .variations_of(category, device)
                .into_iter()
                .flatten()
                .collect();
            println!("  {}: {}", device, variations.join(", "));
        }
    }
}

fn print_gallery(studio: &FrameStudio, args: &Args) {
    let Some(catalog) = studio.catalog() else {
        return;
    };
    let listings = gallery::frame_listings(catalog, &studio.config().api_base_url);
    let filter = GalleryFilter {
        category: args.category.as_ref().map(|c| c.replace('-', " ")),
        search: args.search.clone().unwrap_or_default(),
    };
    let groups = gallery::device_groups(&listings, &filter);
    if groups.is_empty() {
        println!("No device frames found");
        println!(
            "Categories: {}",
            gallery::gallery_categories(&listings).join(", ")
        );
        return;
    }
    for group in groups {
        println!("{} [{}]", group.device, group.category);
        for variant in &group.variants {
            println!("  {:<20} {}", variant.variant, variant.frame_url);
            if let Some(mask) = &variant.mask_url {
                println!("  {:<20} {}", "", mask);
            }
        }
    }
}

fn print_preview(studio: &FrameStudio) {
    let (Some(entry), Some(rect)) = (studio.current_entry(), studio.preview()) else {
        println!("No frame selected");
        return;
    };
    println!(
        "Frame size: {}x{} (aspect {:.4})",
        entry.frame_size.width,
        entry.frame_size.height,
        geometry::aspect_ratio(entry)
    );
    println!(
        "Screen: x={:.4} y={:.4} width={:.4} height={:.4}",
        rect.x, rect.y, rect.width, rect.height
    );
    if let Some(url) = studio.frame_image_url() {
        println!("Frame image: {}", url);
    }
}
