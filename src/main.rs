#[macro_use]
extern crate tracing;

use std::{path::PathBuf, sync::Arc};

use color_eyre::eyre::{bail, WrapErr};
use structopt::StructOpt;
use tokio::{io::AsyncBufReadExt, runtime::Builder, signal};

use ambicam::{
    calibration::Calibrator,
    camera::{self, CameraFeed},
    device::Device,
    image::defish::Defisher,
    markers::{generate_markers, write_markers, MarkerSet},
    models::{CalibrationMapping, Config, Corners, PerimeterLayout, Point, ScreenSpec, ToZones},
    paths::Paths,
    session::SamplingSession,
    web::{self, Preview, Streams},
};

#[derive(Debug, StructOpt)]
struct Opts {
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    /// State directory, defaults to the user configuration directory
    #[structopt(long)]
    root: Option<PathBuf>,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Save the screen settings and render the calibration markers
    Init {
        width: u32,
        height: u32,
        leds_x: u32,
        leds_y: u32,
    },
    /// Locate every LED zone in the camera frame
    Calibrate {
        /// Screen corners in camera coordinates: top-left, top-right, bottom-right, bottom-left
        #[structopt(long, number_of_values = 4)]
        corners: Vec<Point>,
    },
    /// Drive the LEDs from the camera
    Run,
}

async fn init(paths: &Paths, screen: ScreenSpec) -> color_eyre::eyre::Result<()> {
    screen.check()?;

    let config_path = paths.config_file();
    let mut config = Config::load_file(&config_path).await?;
    config.screen = screen;
    config.save_file(&config_path).await?;
    info!(path = %config_path.display(), "saved configuration");

    let markers_dir = paths.reset_markers_dir().await?;

    let zones = PerimeterLayout {
        screen,
        depth: config.calibration.zone_depth,
    }
    .to_zones();
    let total = zones.len();

    let written = write_markers(
        paths,
        generate_markers(screen, zones, config.calibration.marker_quality),
    )
    .await;

    if written.len() < total {
        warn!(written = written.len(), total, "some markers could not be generated");
    }

    println!(
        "Wrote {}/{} markers to {}",
        written.len(),
        total,
        markers_dir.display()
    );

    Ok(())
}

/// Start the preview server if enabled, and print where to find it
async fn start_preview(config: &Config, streams: &Streams) -> color_eyre::eyre::Result<()> {
    if !config.preview.enable {
        return Ok(());
    }

    let server = web::bind(&config.preview, streams.clone())
        .await
        .wrap_err("failed to start the preview server")?;
    tokio::spawn(server);

    let port = config.preview.port;
    println!("Camera preview:      http://localhost:{}/camera", port);
    println!("Calibration preview: http://localhost:{}/calibration", port);
    println!("Corrected stream:    http://localhost:{}/stream", port);

    Ok(())
}

fn start_feed(config: &Config, paths: &Paths, streams: &Streams) -> CameraFeed {
    let preview: Arc<dyn Preview> = Arc::new(streams.camera.clone());

    CameraFeed::spawn(
        camera::from_config(&config.camera, paths),
        Some(preview),
        CameraFeed::RETRY_DELAY,
    )
}

async fn wait_for_enter() {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    if let Err(error) = lines.next_line().await {
        warn!(error = %error, "failed to read from stdin");
    }
}

async fn shutdown_signal() {
    if let Err(error) = signal::ctrl_c().await {
        error!(error = %error, "failed to listen for Ctrl-C");
    }
}

async fn calibrate(paths: &Paths, corners: Vec<Point>) -> color_eyre::eyre::Result<()> {
    let config = Config::load_file(&paths.config_file()).await?;
    let screen = config.screen;
    screen.check()?;

    let mapping_path = paths.mapping_file();

    if !corners.is_empty() {
        let corners = match corners[..] {
            [top_left, top_right, bottom_right, bottom_left] => Corners {
                top_left,
                top_right,
                bottom_right,
                bottom_left,
            },
            _ => bail!("expected exactly 4 corners, got {}", corners.len()),
        };

        let mapping =
            CalibrationMapping::from_corners(screen, corners, config.calibration.inset)?;
        mapping.save_file(&mapping_path).await?;
        println!("Saved mapping to {}", mapping_path.display());
        return Ok(());
    }

    let streams = Streams::default();
    let feed = start_feed(&config, paths, &streams);
    start_preview(&config, &streams).await?;

    let markers = MarkerSet::load(paths, screen, &config.calibration).await;
    let capture_preview: Arc<dyn Preview> = Arc::new(streams.corrected.clone());

    let calibrator = Calibrator::new(
        feed.subscribe(),
        streams.calibration.clone(),
        config.calibration.clone(),
    )
    .with_defisher(Defisher::from_config(&config.lens))
    .with_markers(markers)
    .with_capture_preview(capture_preview)
    .with_preview_quality(config.preview.quality);

    let ready = async {
        println!("Show the calibration preview full screen, point the camera at it and press Enter");
        wait_for_enter().await;
    };

    let mapping = tokio::select! {
        result = calibrator.run(screen, ready) => result?,
        _ = shutdown_signal() => bail!("calibration interrupted"),
    };

    mapping.save_file(&mapping_path).await?;
    println!(
        "Located {} zones, saved mapping to {}",
        mapping.zones.len(),
        mapping_path.display()
    );

    if config.preview.enable {
        println!("Press Ctrl-C to exit");
        shutdown_signal().await;
    }

    Ok(())
}

async fn run(paths: &Paths) -> color_eyre::eyre::Result<()> {
    let config = Config::load_file(&paths.config_file()).await?;
    let screen = config.screen;
    screen.check()?;

    let mapping_path = paths.mapping_file();
    let mapping = match CalibrationMapping::load_file(&mapping_path).await? {
        Some(mapping) => mapping,
        None => bail!(
            "no calibration mapping at {}, run `ambicam calibrate` first",
            mapping_path.display()
        ),
    };

    let session = SamplingSession::new(
        screen,
        mapping,
        Defisher::from_config(&config.lens),
        &config.layout,
    )?;

    let device = Device::new("ambicam", config.device.clone(), screen.zone_count()).await?;

    let streams = Streams::default();
    let feed = start_feed(&config, paths, &streams);
    start_preview(&config, &streams).await?;

    let streams = if config.preview.enable {
        Some(streams)
    } else {
        None
    };

    let session = session
        .run(
            feed.subscribe(),
            device,
            streams,
            config.preview.quality,
            shutdown_signal(),
        )
        .await;

    info!(cycles = session.cycle(), "stopped");
    Ok(())
}

async fn dispatch(opts: Opts) -> color_eyre::eyre::Result<()> {
    let paths = Paths::new(opts.root);
    debug!(root = %paths.root().display(), "state directory");

    match opts.command {
        Command::Init {
            width,
            height,
            leds_x,
            leds_y,
        } => init(&paths, ScreenSpec::new(width, height, leds_x, leds_y)).await,
        Command::Calibrate { corners } => calibrate(&paths, corners).await,
        Command::Run => run(&paths).await,
    }
}

fn install_tracing(opts: &Opts) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fmt_layer = fmt::layer();

    let filter_layer = EnvFilter::try_from_env("AMBICAM_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match opts.verbose {
            0 => "ambicam=warn",
            1 => "ambicam=info",
            2 => "ambicam=debug",
            _ => "ambicam=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

#[paw::main]
fn main(opts: Opts) -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    install_tracing(&opts)?;

    let thd_count = match num_cpus::get() {
        1 => 2,
        other => other.min(4),
    };

    let rt = Builder::new_multi_thread()
        .worker_threads(thd_count)
        .enable_all()
        .build()?;
    rt.block_on(dispatch(opts))
}
