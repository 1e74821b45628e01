//! Command-line soundscape renderer
//!
//! Renders an ambiance soundscape to a WAV file, or plays it live with the
//! `streaming` feature. A second scene can be given to hear the cross-fade.

use anyhow::{bail, Context};
use std::env;
use std::path::PathBuf;
use tale_audio::{AmbianceEngine, AmbianceTag, AudioConfig, SfxKind, WeatherTag};

const USAGE: &str = "Usage:
  tale-audio [options] <AMBIANCE> [WEATHER]

Options:
  -o, --output <file.wav>   Output file (default: soundscape.wav)
  -s, --seconds <n>         Length in seconds (default: 10)
  --to <AMBIANCE[/WEATHER]> Cross-fade to a second scene halfway through
  --sfx                     Fire the SELECT cue at the start
  --stereo                  Write two channels
  --config <file.json>      Engine configuration
  --play                    Play through the default output device (streaming feature)
  -h, --help                Show this help

Ambiance: DUNGEON, NATURE, BATTLE, TOWN, MYSTICAL
Weather:  CLEAR, RAIN, STORM, WINDY, FOG

Examples:
  tale-audio DUNGEON RAIN -s 20 -o dungeon.wav
  tale-audio NATURE --to BATTLE/STORM --stereo
";

struct Options {
    scene: (AmbianceTag, WeatherTag),
    next_scene: Option<(AmbianceTag, WeatherTag)>,
    output: PathBuf,
    seconds: f64,
    channels: u16,
    sfx: bool,
    play: bool,
    config: AudioConfig,
}

fn parse_scene(value: &str) -> (AmbianceTag, WeatherTag) {
    match value.split_once('/') {
        Some((ambiance, weather)) => (AmbianceTag::from(ambiance), WeatherTag::from(weather)),
        None => (AmbianceTag::from(value), WeatherTag::Clear),
    }
}

fn parse_args() -> anyhow::Result<Option<Options>> {
    let mut positional = Vec::new();
    let mut next_scene = None;
    let mut output = PathBuf::from("soundscape.wav");
    let mut seconds = 10.0;
    let mut channels = 1;
    let mut sfx = false;
    let mut play = false;
    let mut config = AudioConfig::default();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--output" | "-o" => {
                let value = args.next().context("--output requires a file name")?;
                output = PathBuf::from(value);
            }
            "--seconds" | "-s" => {
                let value = args.next().context("--seconds requires a number")?;
                seconds = value
                    .parse()
                    .with_context(|| format!("invalid duration '{}'", value))?;
            }
            "--to" => {
                let value = args.next().context("--to requires a scene")?;
                next_scene = Some(parse_scene(&value));
            }
            "--config" => {
                let value = args.next().context("--config requires a file name")?;
                config = AudioConfig::from_file(&value)
                    .with_context(|| format!("failed to load config '{}'", value))?;
            }
            "--sfx" => sfx = true,
            "--stereo" => channels = 2,
            "--play" => play = true,
            _ if arg.starts_with('-') => bail!("unknown flag: {}", arg),
            _ => positional.push(arg),
        }
    }

    let Some(ambiance) = positional.first() else {
        return Ok(None);
    };
    let weather = positional
        .get(1)
        .map_or(WeatherTag::Clear, |w| WeatherTag::from(w.as_str()));

    Ok(Some(Options {
        scene: (AmbianceTag::from(ambiance.as_str()), weather),
        next_scene,
        output,
        seconds,
        channels,
        sfx,
        play,
        config,
    }))
}

fn start_scene(engine: &mut AmbianceEngine, options: &Options) {
    let (ambiance, weather) = options.scene;
    engine.set_ambiance(ambiance, weather);
    if options.sfx {
        engine.play_sfx(SfxKind::Select);
    }
}

#[cfg(feature = "export")]
fn render(options: &Options) -> anyhow::Result<()> {
    use tale_audio::export::{render_engine_with, ExportConfig};

    let mut engine = AmbianceEngine::offline(options.config.ambiance);
    start_scene(&mut engine, options);
    let export = ExportConfig {
        channels: options.channels,
        ..ExportConfig::default()
    }
    .fade_out(1.0);

    let switch_at = options.seconds / 2.0;
    let mut next_scene = options.next_scene;
    let frames = render_engine_with(
        &mut engine,
        options.seconds,
        export,
        &options.output,
        |engine, elapsed| {
            if elapsed >= switch_at {
                if let Some((ambiance, weather)) = next_scene.take() {
                    engine.set_ambiance(ambiance, weather);
                }
            }
        },
    )
    .with_context(|| format!("failed to write {}", options.output.display()))?;

    println!(
        "Wrote {} frames ({:.1}s) to {}",
        frames,
        options.seconds,
        options.output.display()
    );
    Ok(())
}

#[cfg(not(feature = "export"))]
fn render(_options: &Options) -> anyhow::Result<()> {
    bail!("WAV output requires the \"export\" feature")
}

#[cfg(feature = "streaming")]
fn play(options: &Options) -> anyhow::Result<()> {
    use std::time::{Duration, Instant};
    use tale_audio::StreamingFactory;

    let mut engine = AmbianceEngine::new(
        options.config.ambiance,
        StreamingFactory::new(options.channels),
    );
    if !engine.ensure_ready() {
        bail!("no audio output device available");
    }
    start_scene(&mut engine, options);

    let total = Duration::from_secs_f64(options.seconds);
    let switch_at = total / 2;
    let mut next_scene = options.next_scene;
    let started = Instant::now();
    while started.elapsed() < total {
        if started.elapsed() >= switch_at {
            if let Some((ambiance, weather)) = next_scene.take() {
                engine.set_ambiance(ambiance, weather);
            }
        }
        engine.process();
        std::thread::sleep(Duration::from_millis(20));
    }
    engine.stop_all();
    let fade_end = Instant::now() + Duration::from_secs_f64(options.config.ambiance.stop_grace_secs);
    while Instant::now() < fade_end {
        engine.process();
        std::thread::sleep(Duration::from_millis(20));
    }
    engine.shutdown();
    Ok(())
}

#[cfg(not(feature = "streaming"))]
fn play(_options: &Options) -> anyhow::Result<()> {
    bail!("live playback requires the \"streaming\" feature; rebuild with `--features streaming`")
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(options) = parse_args()? else {
        eprint!("{}", USAGE);
        return Ok(());
    };
    if !options.seconds.is_finite() || options.seconds <= 0.0 {
        bail!("duration must be a positive number of seconds");
    }

    if options.play {
        play(&options)
    } else {
        render(&options)
    }
}
