use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use lipsync_core::{
    CueLoader, EngineConfig, LipSyncEngine, SchedulerState, UtteranceRequest, VisemeId,
};
use tracing_subscriber::EnvFilter;

mod mesh;
mod playback;

use mesh::TerminalMesh;
use playback::WavTransportFactory;

#[tokio::main]
async fn main() -> lipsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Speak { audio, cues, fps } => run_speak(&audio, &cues, fps).await,
        Commands::Check { cues } => run_check(&cues),
    }
}

async fn run_speak(audio: &PathBuf, cues: &PathBuf, fps: Option<u32>) -> lipsync_core::Result<()> {
    let config = EngineConfig::default();
    let fps = fps.unwrap_or(config.frame.fps).max(1);
    tracing::info!(?audio, ?cues, fps, "starting utterance playback");

    let mut mesh = TerminalMesh::new();
    let mut engine = LipSyncEngine::new(config, WavTransportFactory, &mesh)?;

    let request = UtteranceRequest {
        audio_url: audio.display().to_string(),
        cues_url: cues.display().to_string(),
    };
    engine.speak(&request).await?;

    let dt = 1.0 / fps as f32;
    let frame = Duration::from_secs_f32(dt);
    loop {
        engine.tick(dt, &mut mesh);
        mesh.draw();

        let done = matches!(
            engine.scheduler_state(),
            SchedulerState::Finished | SchedulerState::Idle
        );
        if done && engine.blend_settled() {
            break;
        }
        tokio::time::sleep(frame).await;
    }

    println!();
    tracing::info!("utterance complete");
    Ok(())
}

fn run_check(cues: &PathBuf) -> lipsync_core::Result<()> {
    let loader = CueLoader::new();
    let track = loader.load_file(cues)?;

    println!("cues:     {}", track.len());
    println!("duration: {:.2}s", track.duration());

    let mut totals = [0.0_f32; VisemeId::COUNT];
    for cue in track.cues() {
        totals[cue.viseme.index()] += cue.end - cue.start;
    }
    for viseme in VisemeId::ALL {
        let total = totals[viseme.index()];
        if total > 0.0 {
            println!("  {}  {:>6.2}s  ({})", viseme.code(), total, viseme.morph_channel());
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Avatar lip-sync demo driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a WAV file and animate the mouth from its cue timeline.
    Speak {
        /// Path to the utterance audio (WAV).
        #[arg(short, long)]
        audio: PathBuf,
        /// Path to the mouth-cue JSON produced for that audio.
        #[arg(short, long)]
        cues: PathBuf,
        /// Frame rate of the terminal render loop.
        #[arg(long)]
        fps: Option<u32>,
    },
    /// Validate a cue file and print a summary.
    Check {
        /// Path to the mouth-cue JSON to inspect.
        cues: PathBuf,
    },
}
