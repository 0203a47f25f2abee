use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use log::info;

use digistring::audio::{AudioInput, AudioOutput};
#[cfg(feature = "files")]
use digistring::audio_file::AudioFile;
use digistring::audio_in::AudioIn;
use digistring::basic_fourier::BasicFourier;
use digistring::cli::{self, Command, Config, InputSource};
use digistring::config;
use digistring::estimator::{Estimator, EstimatorKind};
use digistring::highres::HighRes;
use digistring::midi::MidiOut;
use digistring::note::print_overtones;
use digistring::program::Program;
use digistring::results::ResultsFile;
use digistring::source::{NoteGenerator, OverlapPolicy, SampleSource, WaveGenerator};
use digistring::synth;
use digistring::tuned::Tuned;
use digistring::{audio, cache, experiments, quit};

fn main() {
    pretty_env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    quit::install_signal_handlers()
        .context("failed to install signal handlers")?;

    let command = cli::parse()?;
    let mut config = match command {
        Command::ListAudio => {
            audio::print_devices()?;
            return Ok(());
        }
        Command::Overtones {
            note,
            n_overtones,
            print_midi,
        } => {
            print_overtones(&note, n_overtones, print_midi);
            return Ok(());
        }
        Command::ListExperiments => {
            println!("Available experiments:");
            for (name, description) in experiments::list() {
                println!("  {}: {}", name, description);
            }
            return Ok(());
        }
        Command::Experiment(name) => {
            experiments::run(&name)?;
            return Ok(());
        }
        Command::Run(config) => *config,
    };

    verify_rsc_dir(&mut config)?;
    cache::init(&config.rsc_dir.join(config::CACHE_DIR_FROM_RSC_DIR))
        .context("failed to initialize the window cache")?;

    print_transcription_config();

    let playing_back = config.playback || config.synth.is_some();
    let recording = matches!(config.input, InputSource::AudioIn);
    let sample_rate = config::SAMPLE_RATE;

    let estimator: Box<dyn Estimator> = match config::ESTIMATOR {
        EstimatorKind::HighRes => Box::new(HighRes::new(sample_rate as f64)),
        EstimatorKind::Tuned => Box::new(Tuned::new(sample_rate as f64)),
        EstimatorKind::BasicFourier => Box::new(BasicFourier::new(sample_rate as f64)),
    };
    let frame_size = estimator.frame_size();

    let output = if playing_back {
        let channels: u16 = if config.stereo_split.is_some() { 2 } else { 1 };
        // Enough queue for a few frames even under slowdown.
        let capacity = frame_size * 4 * channels as usize;
        Some(AudioOutput::open(
            config.audio_out_device.as_deref(),
            sample_rate,
            channels,
            capacity,
        )?)
    } else {
        None
    };

    let policy = OverlapPolicy::from_config();
    let mut _input_stream: Option<AudioInput> = None;
    let source: Box<dyn SampleSource> = match &config.input {
        InputSource::Sine(freq) => Box::new(WaveGenerator::new(
            sample_rate as f64,
            frame_size,
            *freq,
            policy,
        )),
        InputSource::Note(note) => Box::new(NoteGenerator::new(
            sample_rate as f64,
            frame_size,
            *note,
            policy,
        )),
        #[cfg(feature = "files")]
        InputSource::File(path) => Box::new(AudioFile::open(
            path,
            sample_rate,
            frame_size,
            policy,
        )?),
        #[cfg(not(feature = "files"))]
        InputSource::File(_) => bail!("this build has no audio file support"),
        InputSource::AudioIn => {
            let capacity = (frame_size * 4).max(sample_rate as usize);
            let (stream, consumer) = AudioInput::open(
                config.audio_in_device.as_deref(),
                sample_rate,
                capacity,
            )?;
            _input_stream = Some(stream);
            Box::new(AudioIn::new(consumer, sample_rate, frame_size, policy))
        }
    };
    if recording {
        info!("listening on the audio input device");
    }

    let synth = config
        .synth
        .map(|(kind, _)| synth::create(kind, sample_rate as f64));

    let results = match &config.output_file {
        Some(path) => Some(ResultsFile::create(path)?),
        None => None,
    };

    let midi = if config.midi { Some(MidiOut::new()?) } else { None };

    let mut program = Program::new(
        &config, estimator, source, synth, output, results, midi, None,
    )?;
    program.run()?;

    Ok(())
}

/// The resource directory must exist and contain the verification file.
fn verify_rsc_dir(config: &mut Config) -> anyhow::Result<()> {
    if !config.rsc_dir.exists() {
        bail!(
            "resource path '{}' doesn't exist; point to the resource directory with '--rsc <path>'",
            config.rsc_dir.display()
        );
    }
    if !config.rsc_dir.is_dir() {
        bail!("resource path '{}' is not a directory", config.rsc_dir.display());
    }

    // Clean the path for printing and for deriving the cache directory.
    config.rsc_dir = normalize_path(&config.rsc_dir);

    let verify_file = config.rsc_dir.join("verify");
    let content = fs::read_to_string(&verify_file)
        .with_context(|| "resource directory verification file not present")?;
    match content.split_whitespace().next() {
        Some(token) if token == config::RSC_VERIFY_TOKEN => Ok(()),
        _ => bail!("resource directory verification failed"),
    }
}

// Lexically resolve '.' and '..' path components.
fn normalize_path(path: &std::path::Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn print_transcription_config() {
    let rate = config::SAMPLE_RATE as f64;
    let frame = config::FRAME_SIZE as f64;
    let padded = (config::FRAME_SIZE * (1 + config::ZERO_PAD_FACTOR)) as f64;

    let mut banner = String::from("--- Transcription config ---\n");
    banner.push_str(&format!("  - Frame size: {} samples\n", config::FRAME_SIZE));
    banner.push_str(&format!("  - Frame time: {:.3} ms\n", frame * 1000.0 / rate));
    banner.push_str(&format!("  - Fourier bin size: {:.3} Hz\n", rate / frame));
    if config::ZERO_PAD_FACTOR > 0 {
        banner.push_str(&format!("  - Frame size with zero padding: {} samples\n", padded));
        banner.push_str(&format!("  - Interpolated bin size: {:.3} Hz\n", rate / padded));
    }
    if config::DO_OVERLAP {
        let overlap = ((frame * config::OVERLAP_RATIO) as usize).clamp(1, config::FRAME_SIZE - 1);
        banner.push_str(&format!(
            "  - Overlap ratio: {}  ({} overlapping samples)\n",
            config::OVERLAP_RATIO,
            overlap
        ));
        banner.push_str(&format!(
            "  - Frame time without overlap: {:.3} ms\n",
            (frame - overlap as f64) * 1000.0 / rate
        ));
    }
    if config::DO_OVERLAP_NONBLOCK {
        banner.push_str(&format!(
            "  - New samples per frame between {} and {}\n",
            (frame * config::MIN_NEW_RATIO) as usize,
            (frame * config::MAX_NEW_RATIO) as usize
        ));
    }
    info!("{}", banner.trim_end());
}
