//! midiplay - plays a compressed MIDI asset through a SoundFont.
//!
//! # Usage
//!
//! ```bash
//! midiplay                              # default asset and SoundFont
//! midiplay scape_main SCC1_Florestan.sf2
//! midiplay harmony --wav harmony.wav    # render to a file instead
//! ```
//!
//! Press `q`, `Esc` or `Ctrl-C` to stop playback early.
//! Set `RUST_LOG=info` to see what is being loaded.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use midiplay::audio::{play_until_finished, render_to_wav, SinkConfig};
use midiplay::{AssetLocator, AudioSink, Loader, Playback, PlayerConfig, SoundFontEngine};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line options for the player.
struct CliOptions {
    /// Asset name to play (file stem inside the cache directories).
    asset: Option<String>,
    /// Path to a SoundFont file, overriding the config.
    soundfont: Option<PathBuf>,
    /// Path to a JSON config file.
    config: Option<PathBuf>,
    /// Render to this WAV file instead of the audio device.
    wav: Option<PathBuf>,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `ASSET` and `SOUNDFONT` as optional positionals, in that order
    /// - `--config <path>` or `-c <path>`: Load options from a JSON file
    /// - `--wav <path>` or `-w <path>`: Export to WAV instead of playing
    /// - `--help` or `-h`: Print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut options = Self {
            asset: None,
            soundfont: None,
            config: None,
            wav: None,
        };
        let mut positionals = Vec::new();
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    let path = args.get(i).context("--config requires a path argument")?;
                    options.config = Some(PathBuf::from(path));
                }
                "--wav" | "-w" => {
                    i += 1;
                    let path = args.get(i).context("--wav requires a path argument")?;
                    options.wav = Some(PathBuf::from(path));
                }
                "--help" | "-h" => {
                    let program = args.first().map(String::as_str).unwrap_or("midiplay");
                    eprintln!("midiplay - MIDI asset player");
                    eprintln!();
                    eprintln!("Usage: {} [OPTIONS] [ASSET] [SOUNDFONT]", program);
                    eprintln!();
                    eprintln!("Options:");
                    eprintln!("  -c, --config PATH  Load player options from a JSON file");
                    eprintln!("  -w, --wav PATH     Render to a WAV file instead of playing");
                    eprintln!("  -h, --help         Print this help message");
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    anyhow::bail!("Unknown option: {} (use --help for usage)", other);
                }
                other => positionals.push(other.to_string()),
            }
            i += 1;
        }

        if positionals.len() > 2 {
            anyhow::bail!("Expected at most two positional arguments (ASSET, SOUNDFONT)");
        }
        let mut positionals = positionals.into_iter();
        options.asset = positionals.next();
        options.soundfont = positionals.next().map(PathBuf::from);
        Ok(options)
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut config = match cli.config {
        Some(ref path) => PlayerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if let Some(soundfont) = cli.soundfont {
        config.soundfont = soundfont;
    }
    let asset = cli.asset.unwrap_or_else(|| config.default_asset.clone());

    let mut playback = Playback::new(config.sample_rate);

    let loader = Loader::new(AssetLocator::from_config(&config));
    let events = match loader.load(&asset, None) {
        Ok(events) => events,
        Err(e) => {
            let e = playback.fail(e);
            return Err(e).with_context(|| format!("Could not load MIDI asset '{}'", asset));
        }
    };

    let mut engine = match SoundFontEngine::from_file(&config.soundfont, config.sample_rate) {
        Ok(engine) => engine,
        Err(e) => return Err(playback.fail(e)).context("Could not load SoundFont"),
    };
    engine.prime_percussion();

    playback.load(events, engine, config.sample_format)?;

    if let Some(wav_path) = cli.wav {
        let session = playback.start()?;
        render_to_wav(
            session,
            &wav_path,
            config.buffer_size,
            config.release_tail_ms,
            None::<fn(f32)>,
        )
        .with_context(|| format!("Failed to export {}", wav_path.display()))?;
        eprintln!("Wrote {}", wav_path.display());
        return Ok(());
    }

    let sink = match AudioSink::open(SinkConfig::from_config(&config)) {
        Ok(sink) => sink,
        Err(e) => {
            return Err(playback.fail(e))
                .context("Could not open the audio hardware or the desired audio output format")
        }
    };

    let handle = playback.handle();
    sink.start(playback.start()?)?;

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let release_tail = Duration::from_millis(config.release_tail_ms);
    match enable_raw_mode() {
        Ok(()) => {
            eprint!("Playing '{}', press q to stop\r\n", asset);
            play_until_finished(&handle, &sink, poll_interval, release_tail, quit_key_pressed);
            disable_raw_mode().context("Failed to disable raw mode")?;
        }
        Err(e) => {
            // No terminal to read keys from; play to the end
            tracing::warn!("Keyboard input unavailable: {}", e);
            play_until_finished(&handle, &sink, poll_interval, release_tail, |timeout| {
                std::thread::sleep(timeout);
                false
            });
        }
    }

    Ok(())
}

/// Waits up to `timeout` for a key press and reports whether it asks to quit.
///
/// Raw mode swallows the interrupt signal, so `Ctrl-C` arrives as a key.
fn quit_key_pressed(timeout: Duration) -> bool {
    match event::poll(timeout) {
        Ok(true) => match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => true,
                KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
                _ => false,
            },
            Ok(_) => false,
            Err(e) => {
                tracing::warn!("Failed to read terminal event: {}", e);
                false
            }
        },
        Ok(false) => false,
        Err(e) => {
            tracing::warn!("Failed to poll terminal events: {}", e);
            std::thread::sleep(timeout);
            false
        }
    }
}
