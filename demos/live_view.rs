//! Stream a few frames from the first connected camera and save the last one.
//!
//! Run with `RUST_LOG=debug cargo run --example live_view -- [output.png] [frames]`.

use std::time::{Duration, Instant};

use amscope::{Result, SessionConfig, Toupcam};

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| "frame.png".to_string());
    let count: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(30);

    let config = SessionConfig::from_env()?;
    println!("Loading Toupcam SDK from {}", config.library_path()?.display());
    let mut cam = Toupcam::with_config(config)?;
    if !cam.is_open() {
        println!("No camera connected (state: {:?})", cam.state());
        return Ok(());
    }

    cam.start_live()?;
    if !cam.is_streaming() {
        println!("Camera did not start streaming, see log for details");
        return Ok(());
    }
    if let Some((width, height)) = cam.frame_size() {
        println!("Streaming {width}x{height}");
    }

    let start = Instant::now();
    let mut last = None;
    let mut received = 0;
    for _ in 0..count {
        match cam.buffer().get_timeout(Duration::from_secs(2)) {
            Ok(frame) => {
                println!("{}", frame.describe());
                received += 1;
                last = Some(frame);
            }
            Err(err) if err.is_empty() => {
                println!("No frame within 2s");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    let elapsed = start.elapsed().as_secs_f64();
    cam.stop_live()?;

    println!(
        "Received {received} frames in {elapsed:.2}s, {} dropped by the buffer",
        cam.buffer().dropped()
    );
    if let Some(frame) = last {
        frame.save(&output)?;
        println!("Saved {output}");
    }
    cam.close()
}
