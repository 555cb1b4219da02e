//! morphsynth - play a patch on the default audio output
//!
//! Run with: cargo run -- --preset "Air Pad" --note C3

mod audio;

use std::{path::PathBuf, thread, time::Duration};

use clap::Parser;
use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use rtrb::{Producer, RingBuffer};

use audio::AudioOutput;
use morphsynth::{
    io::converter::IntoNote,
    patch::PresetLibrary,
    synth::{Lane, SynthMessage},
    EngineConfig, Synth,
};

/// Seconds left for release and FX tails after the note ends.
const TAIL_SECONDS: f32 = 2.5;

#[derive(Debug, Parser)]
#[command(name = "morphsynth", version, about = "Morphing wavetable synth player")]
struct Args {
    /// Factory preset to load
    #[arg(short, long)]
    preset: Option<String>,

    /// Patch JSON file to load
    #[arg(long, value_name = "FILE", conflicts_with = "preset")]
    patch: Option<PathBuf>,

    /// Randomize the patch with this seed after loading
    #[arg(long)]
    seed: Option<u32>,

    /// Note to hold, as a name (C2, F#3) or MIDI number
    #[arg(short, long, default_value = "C2")]
    note: String,

    #[arg(long, default_value_t = 0.9)]
    velocity: f32,

    /// Play the patch's drone instead of a held note
    #[arg(long)]
    drone: bool,

    /// Run the internal drum bus
    #[arg(long)]
    rhythm: bool,

    /// Transpose key (C, F#, Eb, ...)
    #[arg(short, long)]
    key: Option<String>,

    /// Print the factory preset names and exit
    #[arg(long)]
    list_presets: bool,

    /// Print the resulting patch JSON and exit
    #[arg(long)]
    dump_patch: bool,

    /// How long to hold the note
    #[arg(long, default_value_t = 8.0)]
    seconds: f32,
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_presets {
        for name in PresetLibrary::factory()?.names() {
            println!("{name}");
        }
        return Ok(());
    }

    if args.dump_patch {
        let synth = build_synth(&args, EngineConfig::default())?;
        println!("{}", synth.export_json()?);
        return Ok(());
    }

    let note = parse_note(&args.note)?;
    let output = AudioOutput::open()?;
    let config = EngineConfig::default().with_sample_rate(output.sample_rate());
    let synth = build_synth(&args, config)?;

    println!("=== morphsynth ===");
    println!("Patch: {}", synth.patch().meta.name);
    println!("Key: {}", synth.patch().global.key);
    println!("Sample rate: {} Hz", output.sample_rate());
    println!("Channels: {}", output.channels());
    println!();

    let (mut tx, rx) = RingBuffer::<SynthMessage>::new(64);
    let _stream = output.start(synth, rx)?;

    if args.drone {
        send(&mut tx, SynthMessage::StartPerformance)?;
    } else {
        send(
            &mut tx,
            SynthMessage::NoteOn {
                note,
                velocity: args.velocity,
                lane: Lane::Manual,
            },
        )?;
    }
    println!("Playing for {:.1}s...", args.seconds);
    thread::sleep(Duration::from_secs_f32(args.seconds.max(0.0)));

    let release = if args.drone {
        SynthMessage::StopPerformance
    } else {
        SynthMessage::NoteOff { note }
    };
    send(&mut tx, release)?;
    thread::sleep(Duration::from_secs_f32(TAIL_SECONDS));
    send(&mut tx, SynthMessage::Stop)?;
    thread::sleep(Duration::from_millis(100));
    Ok(())
}

fn build_synth(args: &Args, config: EngineConfig) -> EyreResult<Synth> {
    let mut synth = Synth::new(config)?;

    if let Some(name) = &args.preset {
        synth.load_preset(name)?;
    }
    if let Some(path) = &args.patch {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        synth.import_json(&text)?;
    }
    if let Some(seed) = args.seed {
        synth.randomize(seed);
    }
    if let Some(key) = &args.key {
        synth.set_key(key);
    }
    if args.rhythm {
        synth.set_rhythm(true);
    }
    Ok(synth)
}

fn parse_note(text: &str) -> EyreResult<u8> {
    let note = match text.trim().parse::<i32>() {
        Ok(number) => number.into_note()?,
        Err(_) => text.into_note()?,
    };
    Ok(note)
}

fn send(tx: &mut Producer<SynthMessage>, message: SynthMessage) -> EyreResult<()> {
    tx.push(message)
        .map_err(|_| eyre!("control queue is full"))
}
