// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use anyhow::Result;
use std::env;

use studio::config::StudioConfig;
use studio::mixer::{AudioSink, NullSink, StemKind};
use studio::replace::{SaveMode, Variant};
use studio::sections::{SectionMap, TimedWord};
use studio::service::{
    InMemoryGeneration, InMemoryStemStore, InMemoryVersionStore, StaticLyricTiming,
};
use studio::studio::{SinkFactory, StudioSession, TrackInfo};
use studio::versions::{Version, VersionType};

fn print_usage() {
    println!("STUDIO - Playback & Section-Replacement Engine");
    println!();
    println!("Usage: studio [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --slice <SECONDS>       Show fallback sections for a track of the given duration");
    println!("  --derive <FILE>         Derive sections from a YAML word-timing file");
    println!("  --demo                  Run an in-memory section replacement end to end");
    println!("  --config <FILE>         Print the effective config loaded from FILE");
    println!("  --help                  Show this help message");
}

fn print_sections(map: &SectionMap) {
    for section in map.sections() {
        println!(
            "  {:>2}  {:>8.2}s - {:>8.2}s  {}",
            section.index + 1,
            section.start,
            section.end,
            section.label
        );
    }
}

fn show_fallback_sections(duration: f64) {
    let config = StudioConfig::default();
    let map = SectionMap::derive(None, duration, config.fallback_slice_seconds);
    println!(
        "Fallback sections for {duration:.1}s ({} slices):",
        map.sections().len()
    );
    print_sections(&map);
}

fn derive_sections(path: &str) -> Result<()> {
    let contents = std::fs::read_to_string(path)?;
    let words: Vec<TimedWord> = serde_yaml::from_str(&contents)?;
    let duration = words.iter().map(|w| w.end).fold(0.0, f64::max);
    let map = SectionMap::derive(Some(&words), duration, StudioConfig::default().fallback_slice_seconds);
    println!("Derived {} sections from {} words:", map.sections().len(), words.len());
    print_sections(&map);
    Ok(())
}

fn show_config(path: &str) -> Result<()> {
    let config = StudioConfig::load(path)?;
    println!("{}", config.to_yaml()?);
    Ok(())
}

/// Run the whole replacement lifecycle against the in-memory backends.
async fn run_demo() -> Result<()> {
    let track = TrackInfo {
        id: "demo-track".into(),
        title: "Demo Track".into(),
        duration: 180.0,
        audio_url: "demo://mix.mp3".into(),
        supports_replacement: true,
    };

    let mut version_store = InMemoryVersionStore::new();
    version_store.seed(Version {
        id: "v-original".into(),
        track_id: track.id.clone(),
        audio_url: track.audio_url.clone(),
        created_at: "2026-08-06T10:00:00Z".into(),
        is_primary: true,
        version_type: VersionType::Original,
    });

    let mut stem_store = InMemoryStemStore::new();
    stem_store.seed(&track.id, StemKind::Vocals, "demo://vocals.mp3");
    stem_store.seed(&track.id, StemKind::Instrumental, "demo://instrumental.mp3");

    let mut lyrics = StaticLyricTiming::new();
    lyrics.set(
        &track.id,
        vec![
            TimedWord::new("neon", 2.0, 3.0),
            TimedWord::new("rain", 3.0, 4.5),
            TimedWord::new("[Chorus]", 40.0, 40.0),
            TimedWord::new("falling", 40.5, 42.0),
            TimedWord::new("[Outro]", 150.0, 150.0),
            TimedWord::new("fade", 150.5, 158.0),
        ],
    );

    let factory: SinkFactory = Box::new(|| Box::new(NullSink::default()) as Box<dyn AudioSink>);
    let mut session = StudioSession::new(
        StudioConfig::default(),
        InMemoryGeneration::new(),
        version_store,
        stem_store,
        lyrics,
        factory,
    );

    session.attach(track).await?;
    println!("Attached. Sections:");
    for section in session.sections()? {
        println!("  [{}] {:.1}s-{:.1}s {}", section.index, section.start, section.end, section.label);
    }

    session.play()?;
    session.seek(40.0)?;
    println!(
        "Transport at {:.1}s, playing: {}",
        session.transport()?.current_time,
        session.transport()?.is_playing
    );

    session.begin_replacement()?;
    session.select_section(1)?;
    session.set_instructions("heavier chorus, double the drums")?;
    let job_id = session.confirm_replacement().await?;
    println!("Submitted replacement job {job_id}");

    session
        .generation_mut()
        .complete_job(&job_id, "demo://variant-a.mp3", Some("demo://variant-b.mp3"));
    session.pump();
    println!("Job complete, variants: {:?}", session.available_variants());

    session.audition(Variant::A)?;
    let version = session
        .apply_replacement(Variant::A, SaveMode::Replace)
        .await?
        .expect("replace mode creates a version");
    println!("Applied variant A as version {} (primary)", version.id);

    for v in session.versions_recent_first()? {
        let marker = if v.is_primary { "*" } else { " " };
        println!("  {marker} {}  {:?}  {}", v.id, v.version_type, v.audio_url);
    }

    session.detach();
    println!("Detached.");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("STUDIO - Playback & Section-Replacement Engine");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--slice" => {
            if args.len() < 3 {
                eprintln!("Error: --slice requires a duration in seconds");
                std::process::exit(1);
            }
            let duration: f64 = args[2]
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid duration: {}", args[2]))?;
            show_fallback_sections(duration);
        }
        "--derive" => {
            if args.len() < 3 {
                eprintln!("Error: --derive requires a YAML file of timed words");
                std::process::exit(1);
            }
            derive_sections(&args[2])?;
        }
        "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                std::process::exit(1);
            }
            show_config(&args[2])?;
        }
        "--demo" => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_demo())?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
