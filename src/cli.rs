//! Command line argument surface.
//!
//! Arguments are parsed and validated once at startup into a [`Config`] that
//! stays read-only for the rest of the run, or into one of the informational
//! commands that print and exit.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use crate::config;
use crate::note::Note;
use crate::synth::SynthKind;

#[derive(Parser, Debug)]
#[command(
    name = "digistring",
    version,
    about = "Real-time monophonic pitch estimation for instrument audio"
)]
struct Cli {
    /// List the audio driver and devices, then exit.
    #[arg(long = "audio")]
    list_audio: bool,

    /// Record from the input device with this exact name.
    #[arg(long = "audio_in", value_name = "NAME")]
    audio_in: Option<String>,

    /// Play through the output device with this exact name.
    #[arg(long = "audio_out", value_name = "NAME")]
    audio_out: Option<String>,

    /// Start fullscreen.
    #[arg(short = 'f')]
    fullscreen: bool,

    /// Play a WAV file as the input source.
    #[arg(long = "file", value_name = "PATH", conflicts_with_all = ["note", "sine"])]
    file: Option<PathBuf>,

    /// Synthesize a note as the input source (default A4).
    #[arg(short = 'n', value_name = "NOTE", num_args = 0..=1, default_missing_value = "A4", conflicts_with = "sine")]
    note: Option<String>,

    /// Synthesize a sine as the input source at the given frequency in Hz
    /// (default 1000, minimum 1).
    #[arg(short = 's', value_name = "FREQ", num_args = 0..=1, default_missing_value = "1000")]
    sine: Option<f64>,

    /// Monitor the input at the output, optionally routed to the left or
    /// right channel with the synth on the other.
    #[arg(short = 'p', value_name = "CHANNEL", num_args = 0..=1, default_missing_value = "")]
    playback: Option<String>,

    /// Synthesize the estimated notes (default sine at volume 1.0).
    #[arg(long = "synth", value_names = ["NAME", "VOLUME"], num_args = 0..=2)]
    synth: Option<Vec<String>>,

    /// Write estimation results to a JSON file.
    #[arg(short = 'o', value_name = "PATH", num_args = 0..=1, default_missing_value = config::DEFAULT_OUTPUT_FILENAME)]
    output: Option<PathBuf>,

    /// Print per-frame performance measurements, optionally to a file.
    #[arg(long = "perf", value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    perf: Option<String>,

    /// Start resolution.
    #[arg(short = 'r', value_names = ["W", "H"], num_args = 2)]
    resolution: Option<Vec<u32>>,

    /// Resource directory.
    #[arg(long = "rsc", value_name = "PATH", default_value = "rsc")]
    rsc_dir: PathBuf,

    /// Spread every analysis frame over this many times the real-time
    /// interval (must be greater than 1).
    #[arg(long = "slow", value_name = "FACTOR")]
    slowdown: Option<f64>,

    /// Sync the loop to the audio rate without playing anything back.
    #[arg(long = "sync")]
    sync: bool,

    /// Print overtones of a note, then exit.
    #[arg(long = "over", value_names = ["NOTE", "N", "MIDI"], num_args = 1..=3)]
    overtones: Option<Vec<String>>,

    /// Emit MIDI events.
    #[arg(long = "midi")]
    midi: bool,

    /// Run the named experiment, then exit.
    #[arg(long = "experiment", value_name = "NAME")]
    experiment: Option<String>,

    /// List the available experiments, then exit.
    #[arg(long = "experiments")]
    list_experiments: bool,
}

/// Output channel carrying the monitored input in stereo-split mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// Where the samples come from.
#[derive(Clone, Debug)]
pub enum InputSource {
    AudioIn,
    File(PathBuf),
    Note(Note),
    Sine(f64),
}

/// The validated launch configuration. Written once during startup and
/// read-only afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    pub rsc_dir: PathBuf,
    pub fullscreen: bool,
    pub resolution: Option<(u32, u32)>,
    pub audio_in_device: Option<String>,
    pub audio_out_device: Option<String>,
    pub input: InputSource,
    /// Monitor the input at the output.
    pub playback: bool,
    /// Input on one output channel, synth on the other.
    pub stereo_split: Option<Channel>,
    pub synth: Option<(SynthKind, f64)>,
    pub output_file: Option<PathBuf>,
    /// `Some(None)` prints to standard output.
    pub perf_output: Option<Option<PathBuf>>,
    pub midi: bool,
    pub slowdown: Option<f64>,
    pub sync_with_audio: bool,
}

/// What the process should do.
pub enum Command {
    Run(Box<Config>),
    ListAudio,
    Overtones {
        note: Note,
        n_overtones: usize,
        print_midi: bool,
    },
    Experiment(String),
    ListExperiments,
}

/// Parse and validate the process arguments.
pub fn parse() -> anyhow::Result<Command> {
    from_cli(Cli::parse())
}

/// Parse and validate an explicit argument list, for tests.
pub fn parse_from<I, T>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    from_cli(Cli::try_parse_from(args)?)
}

fn from_cli(cli: Cli) -> anyhow::Result<Command> {
    if cli.list_audio {
        return Ok(Command::ListAudio);
    }

    if let Some(over) = &cli.overtones {
        let note: Note = over[0]
            .parse()
            .with_context(|| format!("invalid note '{}' for --over", over[0]))?;
        let n_overtones = match over.get(1) {
            Some(n) => n
                .parse()
                .with_context(|| format!("invalid overtone count '{}'", n))?,
            None => 5,
        };
        let print_midi = match over.get(2).map(String::as_str) {
            Some("midi_on") => true,
            Some("midi_off") | None => false,
            Some(other) => bail!("expected 'midi_on' or 'midi_off', got '{}'", other),
        };
        return Ok(Command::Overtones {
            note,
            n_overtones,
            print_midi,
        });
    }

    if cli.list_experiments {
        return Ok(Command::ListExperiments);
    }
    if let Some(name) = cli.experiment {
        return Ok(Command::Experiment(name));
    }

    let input = if let Some(path) = cli.file {
        InputSource::File(path)
    } else if let Some(note) = &cli.note {
        InputSource::Note(note.parse::<Note>()?)
    } else if let Some(freq) = cli.sine {
        if freq < 1.0 {
            bail!("sine frequency has to be at least 1 Hz");
        }
        InputSource::Sine(freq)
    } else {
        InputSource::AudioIn
    };

    let (playback, stereo_split) = match cli.playback.as_deref() {
        None => (false, None),
        Some("") => (true, None),
        Some("left") => (true, Some(Channel::Left)),
        Some("right") => (true, Some(Channel::Right)),
        Some(other) => bail!("expected 'left' or 'right' for -p, got '{}'", other),
    };

    let synth = match &cli.synth {
        None => None,
        Some(args) => {
            let kind = match args.first() {
                Some(name) => name.parse::<SynthKind>()?,
                None => SynthKind::Sine,
            };
            let volume = match args.get(1) {
                Some(v) => v
                    .parse::<f64>()
                    .with_context(|| format!("invalid synth volume '{}'", v))?,
                None => 1.0,
            };
            if !(0.0..=1.0).contains(&volume) {
                bail!("synth volume has to be between 0.0 and 1.0");
            }
            Some((kind, volume))
        }
    };

    if playback && stereo_split.is_none() && synth.is_some() {
        bail!("can't monitor the input and synthesize at the same time; use -p left|right to split them over the stereo channels");
    }
    if stereo_split.is_some() && synth.is_none() {
        bail!("stereo-split playback needs synthesis; add --synth");
    }

    if let Some(factor) = cli.slowdown {
        if factor <= 1.0 {
            bail!("slowdown factor has to be greater than 1");
        }
    }

    let resolution = match &cli.resolution {
        None => None,
        Some(res) => {
            let (w, h) = (res[0], res[1]);
            if w < config::MIN_RES_W || h < config::MIN_RES_H {
                bail!(
                    "resolution has to be at least {}x{}",
                    config::MIN_RES_W,
                    config::MIN_RES_H
                );
            }
            Some((w, h))
        }
    };

    let perf_output = cli.perf.map(|path| {
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    });

    Ok(Command::Run(Box::new(Config {
        rsc_dir: cli.rsc_dir,
        fullscreen: cli.fullscreen,
        resolution,
        audio_in_device: cli.audio_in,
        audio_out_device: cli.audio_out,
        input,
        playback,
        stereo_split,
        synth,
        output_file: cli.output,
        perf_output,
        midi: cli.midi,
        slowdown: cli.slowdown,
        sync_with_audio: cli.sync,
    })))
}
