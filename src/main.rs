use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use voice_tutor::pipeline::{
    AudioInput, Language, PipelineMode, PipelineOutcome, PipelineRequest, build_orchestrator,
};
use voice_tutor::{Config, MetricsDocument, Orchestrator};

/// Voice tutor - answer a spoken question about course content with speech
#[derive(Parser)]
#[command(name = "voice-tutor", version, about)]
struct Cli {
    /// Recorded question audio
    #[arg(long)]
    audio_file: PathBuf,

    /// Spoken language of the question (he, en or auto)
    #[arg(short, long, default_value = "he")]
    language: Language,

    /// Restrict retrieval to one video
    #[arg(long)]
    video_id: Option<String>,

    /// Write synthesized audio here
    #[arg(short, long)]
    output_audio: Option<PathBuf>,

    /// Synthesize chunks while the answer is still being generated
    #[arg(long)]
    stream: bool,

    /// Chunk length threshold in characters (streaming only)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Chunks synthesized at once (streaming only)
    #[arg(long)]
    synthesis_concurrency: Option<usize>,

    /// Voice identifier (defaults per language)
    #[arg(long)]
    voice_id: Option<String>,

    /// Write the metrics document (JSON) here
    #[arg(long)]
    metrics_output: Option<PathBuf>,

    /// Abort the whole run after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "VOICE_TUTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,voice_tutor=info",
        1 => "info,voice_tutor=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Pre-flight: nothing runs unless the input is readable
    let audio = AudioInput::from_path(&cli.audio_file, cli.language).await?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(chunk_size) = cli.chunk_size {
        config.pipeline.chunk_size = chunk_size;
    }
    if let Some(concurrency) = cli.synthesis_concurrency {
        config.pipeline.synthesis_concurrency = concurrency;
    }
    tracing::debug!(?config, "loaded configuration");

    let providers = config.providers()?;

    let mode = if cli.stream {
        PipelineMode::Streaming
    } else {
        PipelineMode::Simple
    };
    let orchestrator = build_orchestrator(
        mode,
        providers,
        config.pipeline,
        cli.deadline_secs.map(Duration::from_secs),
    );

    let voice_id = cli
        .voice_id
        .unwrap_or_else(|| config.voice.voice_for(cli.language).to_string());
    let request = PipelineRequest::new(audio, voice_id).with_scope(cli.video_id);

    tracing::info!(
        request_id = %request.id,
        mode = %mode,
        file = %cli.audio_file.display(),
        "processing voice question"
    );

    let (outcome, error, code) = match orchestrator.run(&request).await {
        Ok(outcome) => (outcome, None, ExitCode::SUCCESS),
        Err(failure) => {
            let message = failure.to_string();
            (*failure.partial, Some(message), ExitCode::FAILURE)
        }
    };

    print_summary(&outcome, error.as_deref());

    if let Some(path) = &cli.output_audio {
        if outcome.audio.is_empty() {
            tracing::warn!(path = %path.display(), "no audio synthesized, output not written");
        } else {
            tokio::fs::write(path, &outcome.audio).await?;
            tracing::info!(path = %path.display(), bytes = outcome.audio.len(), "audio saved");
        }
    }

    if let Some(path) = &cli.metrics_output {
        MetricsDocument::new(request.id, &outcome, error)
            .write_to(path)
            .await?;
    }

    Ok(code)
}

/// Print the run summary and latency table
fn print_summary(outcome: &PipelineOutcome, error: Option<&str>) {
    println!();
    println!("Transcript: {}", outcome.transcript_text());
    println!("Response:   {}", outcome.response);
    println!("Audio:      {} bytes", outcome.audio.len());
    for warning in &outcome.warnings {
        println!("Warning:    {warning}");
    }
    if let Some(error) = error {
        println!("Error:      {error}");
    }
    println!();
    println!("{}", outcome.report());
}
