use std::path::PathBuf;

use clap::{
    Parser,
    Subcommand,
};
use pigeon70::detect::Window;

#[derive(Debug, Parser)]
#[clap(version, about = "Send images over audio")]
pub struct Args {
    /// Protocol configuration (TOML). Missing fields fall back to the
    /// Pigeon70 preset. If not specified, `protocol.toml` from the config
    /// directory is used if it exists.
    #[clap(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Encode an image into a WAV file.
    Encode {
        /// Any image format. It's resized to the protocol dimensions.
        input: PathBuf,
        output: PathBuf,
    },

    /// Decode a WAV file into an image.
    Decode {
        input: PathBuf,
        output: PathBuf,

        #[clap(long, default_value = "hann")]
        window: Window,
    },

    /// Encode an image and play it on the default audio output.
    Transmit { input: PathBuf },

    /// Record from the default audio input and decode the recording.
    Receive {
        /// Recording duration in seconds.
        #[clap(short, long, default_value = "75")]
        duration: f32,

        #[clap(short, long, default_value = "received.png")]
        output: PathBuf,

        /// Also write the recording to this WAV file.
        #[clap(long)]
        save_audio: Option<PathBuf>,

        #[clap(long, default_value = "hann")]
        window: Window,
    },

    /// Write the gradient test pattern to an image file.
    TestPattern { output: PathBuf },

    /// Encode the test pattern, decode it again and report the error.
    Loopback {
        /// Also write the decoded image to this file.
        #[clap(short, long)]
        output: Option<PathBuf>,

        #[clap(long, default_value = "hann")]
        window: Window,
    },

    /// Report VIS position, sync tones and dominant frequencies of a WAV
    /// file.
    Analyze {
        input: PathBuf,

        /// Number of equally sized segments to report.
        #[clap(short, long, default_value = "20")]
        segments: usize,
    },

    /// Print timing and resolution of the protocol configuration.
    Info,
}
