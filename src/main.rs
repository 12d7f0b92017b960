//! sfxmix CLI: play sound files together or mix them down to WAV.
//!
//! Usage:
//!   sfxmix a.wav b.ogg
//!   sfxmix a.wav b.ogg --wav mix.wav
//!   sfxmix loop.ogg --loop --seconds 10

use std::path::Path;
use std::time::{Duration, Instant};
use std::{env, process};
use sx_master::{write_wav, AudioSession, SessionConfig, Sound};

/// Longest offline render when nothing stops on its own.
const MAX_RENDER_SECONDS: f32 = 300.0;

struct Args {
    files: Vec<String>,
    wav: Option<String>,
    looping: bool,
    seconds: Option<f32>,
}

fn usage() -> ! {
    eprintln!("Usage: sfxmix <file>... [--wav output.wav] [--loop] [--seconds N]");
    process::exit(1);
}

fn parse_args() -> Args {
    let mut args = Args { files: Vec::new(), wav: None, looping: false, seconds: None };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--wav" => args.wav = Some(iter.next().unwrap_or_else(|| usage())),
            "--loop" => args.looping = true,
            "--seconds" => {
                let value = iter.next().unwrap_or_else(|| usage());
                args.seconds = Some(value.parse().unwrap_or_else(|_| usage()));
            }
            "-h" | "--help" => usage(),
            _ => args.files.push(arg),
        }
    }
    if args.files.is_empty() {
        usage();
    }
    args
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = parse_args();

    let config = SessionConfig::default();
    let session = match args.wav {
        Some(_) => AudioSession::headless(config),
        None => AudioSession::init(config),
    };
    let session = session.unwrap_or_else(|e| {
        eprintln!("Failed to open audio: {}", e);
        process::exit(1);
    });

    let sounds: Vec<Sound> = args
        .files
        .iter()
        .map(|path| session.load_sound(path))
        .filter(|sound| !sound.is_empty())
        .collect();
    if sounds.is_empty() {
        eprintln!("Nothing to play.");
        process::exit(1);
    }

    for sound in &sounds {
        session.set_looping(sound, args.looping);
        session.play(sound);
    }

    match args.wav {
        Some(path) => render_to_wav(&session, &sounds, Path::new(&path), args.seconds),
        None => play_audio(&session, &sounds, args.seconds),
    }
}

fn any_playing(session: &AudioSession, sounds: &[Sound]) -> bool {
    sounds.iter().any(|sound| session.is_playing(sound))
}

fn play_audio(session: &AudioSession, sounds: &[Sound], seconds: Option<f32>) {
    println!("Playing {} sound(s)...", sounds.len());
    let started = Instant::now();
    let limit = seconds.map(Duration::from_secs_f32);

    while any_playing(session, sounds) {
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    println!("Done.");
}

fn render_to_wav(session: &AudioSession, sounds: &[Sound], path: &Path, seconds: Option<f32>) {
    let format = session.format();
    let limit = seconds.unwrap_or(MAX_RENDER_SECONDS);
    let max_frames = (limit * format.sample_rate as f32) as usize;
    let block_frames = 1024;
    println!("Rendering to {} at {} Hz...", path.display(), format.sample_rate);

    let mut samples = Vec::new();
    let mut block = vec![0.0f32; format.samples(block_frames)];
    let mut frames = 0;
    while frames < max_frames && any_playing(session, sounds) {
        let n = block_frames.min(max_frames - frames);
        let block = &mut block[..format.samples(n)];
        session.render(block);
        samples.extend_from_slice(block);
        frames += n;
    }

    if let Err(e) = write_wav(path, &samples, format.channels, format.sample_rate) {
        eprintln!("Failed to write {}: {}", path.display(), e);
        process::exit(1);
    }
    println!("Rendered {} frames.", frames);
}
