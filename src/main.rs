use std::env;
use std::fs;
use std::process;

use phasing::{
    Direction, PhasingSession, PlayerId, SessionConfig, TickClock, DEFAULT_TICKS_PER_WHOLE,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "Usage: phasing <phrase.phase> [--frames N] [--fps F] [--reverse] [--yaml]";

struct Options {
    input_path: String,
    frames: u64,
    fps: f64,
    reverse: bool,
    yaml: bool,
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn flag_value<'a>(args: &mut impl Iterator<Item = &'a String>, flag: &str) -> &'a String {
    match args.next() {
        Some(value) => value,
        None => usage_error(&format!("Missing value for {}", flag)),
    }
}

fn parse_args(args: &[String]) -> Options {
    let mut input_path = None;
    let mut frames = 600;
    let mut fps = 60.0;
    let mut reverse = false;
    let mut yaml = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--frames" => {
                let value = flag_value(&mut iter, "--frames");
                frames = value
                    .parse()
                    .unwrap_or_else(|_| usage_error(&format!("Invalid frame count '{}'", value)));
            }
            "--fps" => {
                let value = flag_value(&mut iter, "--fps");
                fps = match value.parse::<f64>() {
                    Ok(f) if f > 0.0 => f,
                    _ => usage_error(&format!("Invalid frame rate '{}'", value)),
                };
            }
            "--reverse" => reverse = true,
            "--yaml" => yaml = true,
            flag if flag.starts_with("--") => usage_error(&format!("Unknown option '{}'", flag)),
            path => {
                if input_path.replace(path.to_string()).is_some() {
                    usage_error("Only one phrase file can be played");
                }
            }
        }
    }

    let input_path = match input_path {
        Some(path) => path,
        None => usage_error("No phrase file given"),
    };
    Options {
        input_path,
        frames,
        fps,
        reverse,
        yaml,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args);

    // Read input file
    let source = match fs::read_to_string(&options.input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", options.input_path, e);
            process::exit(1);
        }
    };

    let file = match phasing::load(&source) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error in '{}': {}", options.input_path, e);
            process::exit(1);
        }
    };

    if options.yaml {
        match file.phrase.to_yaml() {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => {
                eprintln!("Error writing document: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let direction = if options.reverse {
        Direction::Backward
    } else {
        Direction::Forward
    };
    let config = SessionConfig {
        direction,
        ..SessionConfig::default()
    };
    let loop_duration = file.phrase.total_duration();
    let mut session = PhasingSession::new(file.phrase.clone(), config);
    let mut clock_a = TickClock::for_tempo(file.tempo, loop_duration, DEFAULT_TICKS_PER_WHOLE);
    let mut clock_b = TickClock::for_tempo(file.tempo_b(), loop_duration, DEFAULT_TICKS_PER_WHOLE);

    if let Some(title) = &file.title {
        println!("# {}", title);
    }
    println!(
        "# {} entries, loop {} whole notes, A at {} bpm, B at {:.2} bpm",
        session.performance().len(),
        loop_duration,
        file.tempo,
        file.tempo_b()
    );

    let frame_seconds = 1.0 / options.fps;
    let mut trigger_count = 0;
    for frame in 0..options.frames {
        clock_a.advance(frame_seconds);
        clock_b.advance(frame_seconds);
        session.tick_ticks(clock_a.position(), clock_b.position());

        for scheduled in session.drain_triggers() {
            trigger_count += 1;
            let player = match scheduled.player {
                PlayerId::A => "A",
                PlayerId::B => "B",
            };
            let trigger = scheduled.trigger;
            if trigger.is_audible() {
                println!(
                    "{:>6} {} {:>3} pitch={} dynamic={} duration={}",
                    frame, player, scheduled.index, trigger.pitch, trigger.dynamic, trigger.duration
                );
            } else {
                println!(
                    "{:>6} {} {:>3} rest duration={}",
                    frame, player, scheduled.index, trigger.duration
                );
            }
        }
    }

    eprintln!(
        "Played {} frames, {} triggers; B leads A by {:.4} whole notes",
        options.frames,
        trigger_count,
        session.phase_offset()
    );
}
