// THEORY:
// `parking_tester` drives the occupancy estimator from the command line and
// talks to a remote detection backend. Local commands work on an image file
// plus the regions kept in the region store. Remote commands are thin
// wrappers over the backend client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use futures::stream;
use log::{info, warn};
use parking_vision::config::CONFIG_PATH_ENV;
use parking_vision::{AppConfig, Session};
use parking_vision_client::{BackendClient, EventChannel, ResultBus, ResultPoller};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about = "Mark parking spaces and estimate their occupancy")]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify the stored (and any extra) regions on an image.
    Analyze {
        image: PathBuf,
        /// Where to write the annotated image.
        #[arg(long, default_value = "annotated.png")]
        out: PathBuf,
        /// Extra region centre as `x,y`; may be repeated.
        #[arg(long = "region", value_parser = parse_point)]
        regions: Vec<(f64, f64)>,
        /// Print the result as the backend's JSON payload.
        #[arg(long)]
        payload: bool,
        /// Also save the extra regions and verdicts back to the store.
        #[arg(long)]
        save: bool,
    },
    /// Append a region centred at (x, y) to the store.
    Mark {
        #[arg(value_parser = parse_coordinate, allow_negative_numbers = true)]
        x: f64,
        #[arg(value_parser = parse_coordinate, allow_negative_numbers = true)]
        y: f64,
    },
    /// List stored regions.
    Regions,
    #[command(subcommand)]
    Remote(RemoteCommand),
}

#[derive(Subcommand, Debug)]
enum RemoteCommand {
    /// Upload a video to the backend.
    Upload { video: PathBuf },
    Start,
    Stop,
    /// Start detection and print results as they arrive.
    Watch {
        /// Stop after this many results.
        #[arg(long, default_value_t = 10)]
        frames: usize,
    },
    /// Read pushed event frames (one JSON object per line) from stdin.
    Listen,
    Spaces,
    Add {
        #[arg(value_parser = parse_coordinate, allow_negative_numbers = true)]
        x: f64,
        #[arg(value_parser = parse_coordinate, allow_negative_numbers = true)]
        y: f64,
    },
    Remove { index: usize },
    /// Send one image to the backend for analysis.
    Frame {
        image: PathBuf,
        /// Write the returned annotated frame here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// A finite pixel coordinate; `nan` and `inf` parse as floats but name no pixel.
fn parse_coordinate(text: &str) -> Result<f64, String> {
    let value = text.trim().parse::<f64>().map_err(|e| e.to_string())?;
    if !value.is_finite() {
        return Err(format!("{text:?} is not a finite coordinate"));
    }
    Ok(value)
}

fn parse_point(text: &str) -> Result<(f64, f64), String> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {text:?}"))?;
    let x = parse_coordinate(x).map_err(|e| format!("bad x: {e}"))?;
    let y = parse_coordinate(y).map_err(|e| format!("bad y: {e}"))?;
    Ok((x, y))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = AppConfig::load_from(args.config.as_deref()).context("loading configuration")?;

    match args.command {
        Command::Analyze {
            image,
            out,
            regions,
            payload,
            save,
        } => analyze(&config, &image, &out, &regions, payload, save),
        Command::Mark { x, y } => {
            let mut session = Session::new(&config);
            session.restore_regions()?;
            let total = session.mark_region(x, y)?;
            session.save_regions()?;
            println!("{total} parking spaces stored");
            Ok(())
        }
        Command::Regions => {
            let mut session = Session::new(&config);
            session.restore_regions()?;
            for (index, region) in session.regions().iter().enumerate() {
                let state = if region.occupied { "occupied" } else { "free" };
                println!("#{} ({}, {}) {state}", index + 1, region.x, region.y);
            }
            Ok(())
        }
        Command::Remote(command) => remote(&config, command).await,
    }
}

fn analyze(
    config: &AppConfig,
    image: &Path,
    out: &Path,
    extra: &[(f64, f64)],
    print_payload: bool,
    save: bool,
) -> Result<()> {
    let mut session = Session::new(config);
    let restored = session.restore_regions()?;
    info!("restored {restored} parking spaces");
    session.load_image_file(image)?;
    for &(x, y) in extra {
        session.mark_region(x, y)?;
    }

    let analysis = session.analyze()?;
    analysis
        .annotated
        .save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    if save {
        session.save_regions()?;
    }

    if print_payload {
        let payload = analysis.to_payload(config.jpeg_quality)?;
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        println!(
            "free: {}  occupied: {}  total: {}  -> {}",
            analysis.free,
            analysis.occupied,
            analysis.total(),
            out.display()
        );
    }
    Ok(())
}

async fn remote(config: &AppConfig, command: RemoteCommand) -> Result<()> {
    let client = BackendClient::from_settings(&config.backend)?;

    match command {
        RemoteCommand::Upload { video } => {
            let upload = client.upload_video(&video).await?;
            let duration = upload
                .duration_secs()
                .map(|s| format!("{s}s"))
                .unwrap_or_else(|| "unknown length".into());
            println!(
                "{} ({}: {} frames @ {:.1} fps, {duration})",
                upload.message, upload.filename, upload.total_frames, upload.fps
            );
        }
        RemoteCommand::Start => println!("{}", client.start_detection().await?.message),
        RemoteCommand::Stop => println!("{}", client.stop_detection().await?.message),
        RemoteCommand::Watch { frames } => watch(config, client, frames).await?,
        RemoteCommand::Listen => listen().await?,
        RemoteCommand::Spaces => {
            let spaces = client.parking_spaces().await?;
            println!("{} parking spaces", spaces.total_spaces);
            for (index, (x, y)) in spaces.positions.iter().enumerate() {
                println!("#{} ({x}, {y})", index + 1);
            }
        }
        RemoteCommand::Add { x, y } => {
            let added = client.add_parking_space(x, y).await?;
            println!("{} ({} total)", added.message, added.total_spaces);
        }
        RemoteCommand::Remove { index } => {
            let removed = client.remove_parking_space(index).await?;
            println!("{} ({} total)", removed.message, removed.total_spaces);
        }
        RemoteCommand::Frame { image, out } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("reading {}", image.display()))?;
            let payload = client.process_frame(&bytes).await?;
            println!(
                "free: {}  occupied: {}  total: {}",
                payload.free_spaces, payload.occupied_spaces, payload.total_spaces
            );
            if let Some(out) = out {
                tokio::fs::write(&out, payload.jpeg_bytes()?)
                    .await
                    .with_context(|| format!("writing {}", out.display()))?;
            }
        }
    }
    Ok(())
}

async fn watch(config: &AppConfig, client: BackendClient, frames: usize) -> Result<()> {
    if frames == 0 {
        bail!("--frames must be at least 1");
    }
    let mut session = Session::new(config);
    let started = client.start_detection().await?.message;
    println!("{started}");
    session.notices_mut().success(started);
    session.set_running(true);

    let bus = ResultBus::default();
    let mut updates = bus.subscribe();
    let handle = ResultPoller::spawn(client.clone(), config.backend.poll_interval, bus);

    let mut seen = 0;
    while session.is_running() && seen < frames {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    seen += 1;
                    let p = update.payload;
                    println!(
                        "[{seen}/{frames}] free: {}  occupied: {}  total: {}",
                        p.free_spaces, p.occupied_spaces, p.total_spaces
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("skipped {skipped} results");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    session.set_running(false);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                session.set_running(false);
            }
        }
    }

    let stats = handle.stats();
    info!(
        "{} requests, {} results, {} empty, {} failed",
        stats.requests(),
        stats.results(),
        stats.empty(),
        stats.failures()
    );
    handle.stop().await;
    session.set_running(false);
    let stopped = client.stop_detection().await?.message;
    println!("{stopped}");
    session.notices_mut().success(stopped);
    Ok(())
}

async fn listen() -> Result<()> {
    let bus = ResultBus::default();
    let mut updates = bus.subscribe();
    let channel = EventChannel::new(bus);

    let printer = tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            let p = update.payload;
            println!(
                "free: {}  occupied: {}  total: {}",
                p.free_spaces, p.occupied_spaces, p.total_spaces
            );
        }
    });

    let lines = BufReader::new(tokio::io::stdin()).lines();
    let frames = stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line, lines)),
            Ok(None) => None,
            Err(err) => {
                warn!("stdin read failed: {err}");
                None
            }
        }
    });
    let summary = channel.run(frames).await;
    drop(channel);
    printer
        .await
        .map_err(|err| anyhow!("result printer failed: {err}"))?;
    info!(
        "{} frames, {} results, {} ignored, {} malformed",
        summary.frames, summary.results, summary.ignored, summary.malformed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_parse_with_optional_spaces() {
        assert_eq!(parse_point("10,20.5"), Ok((10.0, 20.5)));
        assert_eq!(parse_point(" 3 , 4 "), Ok((3.0, 4.0)));
        assert!(parse_point("10").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn non_finite_points_are_refused() {
        assert!(parse_point("nan,1").is_err());
        assert!(parse_point("1,inf").is_err());
        assert!(parse_point("-inf,-inf").is_err());
        assert_eq!(parse_point("-5,1e3"), Ok((-5.0, 1000.0)));
    }

    #[test]
    fn mark_and_add_require_finite_coordinates() {
        assert!(Args::try_parse_from(["parking_tester", "mark", "nan", "1"]).is_err());
        assert!(Args::try_parse_from(["parking_tester", "remote", "add", "1", "inf"]).is_err());

        let args = Args::try_parse_from(["parking_tester", "mark", "-3", "4.5"]).unwrap();
        assert!(matches!(args.command, Command::Mark { x, y } if x == -3.0 && y == 4.5));
    }

    #[test]
    fn remote_watch_parses() {
        let args = Args::try_parse_from(["parking_tester", "remote", "watch", "--frames", "3"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Remote(RemoteCommand::Watch { frames: 3 })
        ));
    }

    #[test]
    fn analyze_collects_repeated_regions() {
        let args = Args::try_parse_from([
            "parking_tester",
            "analyze",
            "lot.png",
            "--region",
            "1,2",
            "--region",
            "3,4",
        ])
        .unwrap();
        match args.command {
            Command::Analyze { regions, out, .. } => {
                assert_eq!(regions, vec![(1.0, 2.0), (3.0, 4.0)]);
                assert_eq!(out, PathBuf::from("annotated.png"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
