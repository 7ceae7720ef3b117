mod args;
mod files;

use std::{
    path::Path,
    time::Duration,
};

use clap::Parser;
use color_eyre::eyre::{
    Error,
    bail,
};
use image::{
    RgbImage,
    imageops::FilterType,
};
use pigeon70::{
    CancellationToken,
    DecodeReport,
    Decoded,
    Decoder,
    Encoder,
    Progress,
    ProtocolConfig,
    Waveform,
    analysis::Analysis,
    detect::Window,
    frame::{
        mean_absolute_error,
        test_pattern,
    },
    sink::file::write_wav,
    source::file::read_wav,
};
use tracing_subscriber::EnvFilter;

use crate::args::{
    Args,
    Command,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::debug!(?args);

    let config = files::protocol_config(args.config.as_deref())?;

    let result = match args.command {
        Command::Encode { input, output } => {
            let waveform = encode_image(&input, &config)?;
            write_wav(&output, &waveform)?;
            tracing::info!(path = %output.display(), duration = waveform.duration(), "Wrote waveform");
            Ok(())
        }
        Command::Decode {
            input,
            output,
            window,
        } => {
            let waveform = read_wav(&input)?;
            decode_to_file(waveform, &config, window, &output).await
        }
        Command::Transmit { input } => {
            let waveform = encode_image(&input, &config)?;
            tracing::info!(duration = waveform.duration(), "Transmitting");
            tokio::task::spawn_blocking(move || pigeon70::audio::play(&waveform)).await??;
            Ok(())
        }
        Command::Receive {
            duration,
            output,
            save_audio,
            window,
        } => {
            let duration = recording_duration(duration)?;

            tracing::info!(?duration, "Recording, press Ctrl-C to stop early");
            let sample_rate = config.sample_rate;
            let waveform = cancellable(move |cancel| {
                pigeon70::audio::record(duration, sample_rate, cancel)
            })
            .await??;
            tracing::info!(duration = waveform.duration(), "Recording finished");

            if let Some(path) = save_audio {
                write_wav(&path, &waveform)?;
                tracing::info!(path = %path.display(), "Saved recording");
            }

            decode_to_file(waveform, &config, window, &output).await
        }
        Command::TestPattern { output } => {
            save_image(&test_pattern(config.width, config.height), &output)
        }
        Command::Loopback { output, window } => loopback(&config, window, output.as_deref()).await,
        Command::Analyze { input, segments } => {
            let waveform = read_wav(&input)?;
            let recorded_rate = waveform.sample_rate();
            let decoder = Decoder::new(config)?;
            let analysis =
                tokio::task::spawn_blocking(move || decoder.analyze(&waveform, segments)).await?;
            print!("{}", format_analysis(&analysis, recorded_rate));
            Ok(())
        }
        Command::Info => {
            print_info(&config);
            Ok(())
        }
    };

    if let Err(error) = &result {
        tracing::error!(?error);
    }

    result
}

fn encode_image(path: &Path, config: &ProtocolConfig) -> Result<Waveform, Error> {
    let mut image = image::open(path)?.to_rgb8();

    let (width, height) = (config.width as u32, config.height as u32);
    if image.dimensions() != (width, height) {
        tracing::info!(
            from = ?image.dimensions(),
            to = ?(width, height),
            "Resizing image"
        );
        image = image::imageops::resize(&image, width, height, FilterType::Lanczos3);
    }

    let encoder = Encoder::new(*config)?;
    Ok(encoder.encode_with_progress(&image, &mut LogProgress::default())?)
}

async fn decode_to_file(
    waveform: Waveform,
    config: &ProtocolConfig,
    window: Window,
    output: &Path,
) -> Result<(), Error> {
    let decoder = Decoder::new(*config)?.with_window(window);

    tracing::info!(
        duration = waveform.duration(),
        expected = config.duration(),
        "Decoding, press Ctrl-C to stop early"
    );
    let Decoded { image, report } = cancellable(move |cancel| {
        decoder.decode_with(&waveform, &mut LogProgress::default(), cancel)
    })
    .await?;

    log_report(&report);
    save_image(&image, output)
}

/// Encodes the test pattern and decodes it again.
async fn loopback(
    config: &ProtocolConfig,
    window: Window,
    output: Option<&Path>,
) -> Result<(), Error> {
    let image = test_pattern(config.width, config.height);
    let waveform = Encoder::new(*config)?.encode_with_progress(&image, &mut LogProgress::default())?;
    let decoder = Decoder::new(*config)?.with_window(window);

    let Decoded {
        image: decoded,
        report,
    } = cancellable(move |cancel| {
        decoder.decode_with(&waveform, &mut LogProgress::default(), cancel)
    })
    .await?;
    log_report(&report);

    let Some(error) = mean_absolute_error(&image, &decoded)
    else {
        bail!("Decoded image has the wrong size");
    };
    println!("Mean absolute error: {error:.2} of 255");

    if let Some(path) = output {
        save_image(&decoded, path)?;
    }

    Ok(())
}

fn log_report(report: &DecodeReport) {
    tracing::info!(
        anchor = ?report.anchor,
        lines_decoded = report.lines_decoded,
        lines_synced = report.lines_synced,
        lines_without_sync = report.lines_without_sync.len(),
        truncated = report.truncated,
        cancelled = report.cancelled,
        "Decoded"
    );
}

fn recording_duration(seconds: f32) -> Result<Duration, Error> {
    match Duration::try_from_secs_f32(seconds) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => bail!("Duration must be a positive number of seconds, got {seconds}"),
    }
}

fn save_image(image: &RgbImage, path: &Path) -> Result<(), Error> {
    image.save(path)?;
    tracing::info!(path = %path.display(), "Wrote image");
    Ok(())
}

/// Runs `task` on the blocking thread pool. Ctrl-C triggers the cancellation
/// token passed to it, and the task's result is still returned.
async fn cancellable<F, T>(task: F) -> Result<T, Error>
where
    F: FnOnce(&CancellationToken) -> T + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let mut handle = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || task(&cancel)
    });

    tokio::select! {
        result = &mut handle => Ok(result?),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            cancel.cancel();
            Ok(handle.await?)
        }
    }
}

fn print_info(config: &ProtocolConfig) {
    let milliseconds = |seconds: f32| seconds * 1000.0;

    println!("Image:      {}x{}", config.width, config.height);
    println!("Sample rate: {} Hz", config.sample_rate);
    println!(
        "VIS:        {} Hz, {:.1} ms ({} samples)",
        config.vis_tone,
        milliseconds(config.vis_time),
        config.vis_len()
    );
    println!(
        "Sync:       {} Hz, {:.1} ms ({} samples)",
        config.sync_tone,
        milliseconds(config.sync_time),
        config.sync_len()
    );
    println!(
        "Separator:  {} Hz, {:.1} ms ({} samples)",
        config.separator_tone,
        milliseconds(config.separator_time),
        config.separator_len()
    );
    println!(
        "Pixel:      {}-{} Hz, {:.3} ms ({} samples)",
        config.pixel_band.low,
        config.pixel_band.high,
        milliseconds(config.pixel_time),
        config.pixel_len()
    );
    println!(
        "Line:       {:.1} ms ({} samples)",
        milliseconds(config.line_len() as f32 / config.sample_rate),
        config.line_len()
    );
    println!(
        "Total:      {:.2} s ({} samples)",
        config.duration(),
        config.waveform_len()
    );

    let resolution = config.pixel_resolution();
    println!(
        "Resolution: {:.1} Hz per bin, {} bins in pixel band, {} intensity levels",
        resolution.bin_width, resolution.bins_in_band, resolution.levels
    );
    if resolution.is_marginal() {
        println!("            marginal: pixel tones are too short to resolve 256 levels");
    }
}

fn format_analysis(analysis: &Analysis, recorded_rate: f32) -> String {
    use std::fmt::Write;

    let seconds = |position: usize| position as f32 / analysis.sample_rate;
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Length:     {} samples, {:.2} s at {} Hz",
        analysis.num_samples,
        analysis.duration(),
        analysis.sample_rate
    );
    if recorded_rate != analysis.sample_rate {
        let _ = writeln!(output, "            resampled from {recorded_rate} Hz");
    }

    match analysis.vis {
        Some(position) => {
            let _ = writeln!(
                output,
                "VIS:        at {:.3} s (sample {position})",
                seconds(position)
            );
        }
        None => {
            let _ = writeln!(output, "VIS:        not found");
        }
    }

    let _ = write!(output, "Sync tones: {}", analysis.syncs.len());
    if let (Some(first), Some(last)) = (analysis.syncs.first(), analysis.syncs.last()) {
        let _ = write!(output, ", {:.3} s to {:.3} s", seconds(*first), seconds(*last));
    }
    let _ = writeln!(output);

    for (i, segment) in analysis.segments.iter().enumerate() {
        let _ = write!(
            output,
            "  {i:>3}  {:>7.2} s  {:>7.1} Hz",
            seconds(segment.start),
            segment.frequency
        );
        if let Some(marker) = segment.marker {
            let _ = write!(output, "  [{marker}]");
        }
        let _ = writeln!(output);
    }

    output
}

/// Logs progress in 10% steps.
#[derive(Debug, Default)]
struct LogProgress {
    next: f32,
}

impl Progress for LogProgress {
    fn report(&mut self, fraction: f32, status: &str) {
        if fraction >= self.next {
            tracing::info!(progress = %format!("{:.0}%", fraction * 100.0), "{status}");
            self.next = (fraction * 10.0).floor() / 10.0 + 0.1;
        }
    }
}
