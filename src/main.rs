use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tts_dub::config::DubConfig;
use tts_dub::job::{DubbingJob, JobOutcome, PodcastRequest, SpeechRequest};
use tts_dub::media::compose::{FfmpegComposer, OutputKind};
use tts_dub::notification::LogProgressObserver;
use tts_dub::utils::logger::init_logger;
use tts_dub::TtsDub;

/// Subtitle-timed multi-speaker dubbing
#[derive(Parser, Debug)]
#[command(name = "tts-dub", version, about)]
struct Cli {
    /// JSON configuration file; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the output root directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dub a media file from an SRT subtitle file
    Dub {
        #[arg(long)]
        srt: PathBuf,

        #[arg(long)]
        media: PathBuf,

        /// Model per speaker, in speaker order (repeat the flag)
        #[arg(long = "model", required = true)]
        models: Vec<String>,

        /// Reference voice per speaker, in speaker order; `-` leaves a speaker without one
        #[arg(long = "reference")]
        references: Vec<String>,

        /// Re-voice every speaker with its reference
        #[arg(long)]
        clone: bool,

        /// Audio or Video
        #[arg(long, default_value = "Audio")]
        output_type: OutputKind,

        #[arg(long)]
        original_volume: Option<f32>,

        #[arg(long)]
        dubbed_volume: Option<f32>,

        #[arg(long, default_value_t = 1.0)]
        speaking_rate: f32,
    },

    /// Synthesize a single utterance
    Tts {
        #[arg(long)]
        text: String,

        #[arg(long)]
        model: String,

        #[arg(long, default_value_t = 1.0)]
        speaking_rate: f32,

        /// Re-voice the speech with this reference recording
        #[arg(long)]
        reference: Option<PathBuf>,
    },

    /// Re-voice a recording with the timbre of a reference
    Clone {
        #[arg(long)]
        base: PathBuf,

        #[arg(long)]
        reference: PathBuf,
    },

    /// Render a `Speaker N: text` script
    Podcast {
        /// Script file
        #[arg(long)]
        script: PathBuf,

        #[arg(long = "model", required = true)]
        models: Vec<String>,

        #[arg(long, default_value_t = 1.0)]
        speaking_rate: f32,

        /// Re-voice the podcast with this reference recording
        #[arg(long)]
        reference: Option<PathBuf>,
    },

    /// List the installed speech models
    Models,
}

fn parse_references(raw: &[String]) -> Vec<Option<PathBuf>> {
    raw.iter()
        .map(|r| {
            let r = r.trim();
            if r.is_empty() || r == "-" {
                None
            } else {
                Some(PathBuf::from(r))
            }
        })
        .collect()
}

fn load_config(cli: &Cli) -> Result<DubConfig> {
    let mut config = match &cli.config {
        Some(path) => DubConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => DubConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

fn report(outcome: &JobOutcome) -> ExitCode {
    if let Some(path) = &outcome.output {
        println!("Output file: {}", path.display());
    }
    println!("Status: {}", outcome.status);

    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    let composer = FfmpegComposer::from_config(&config);
    let mut pipeline = TtsDub::from_config(config)?;
    pipeline.add_observer(Box::new(LogProgressObserver::new()));

    let outcome = match cli.command {
        Command::Dub {
            srt,
            media,
            models,
            references,
            clone,
            output_type,
            original_volume,
            dubbed_volume,
            speaking_rate,
        } => {
            composer.ensure_available()?;
            let defaults = pipeline.config();
            let job = DubbingJob::new(srt, media, models)
                .with_references(parse_references(&references))
                .with_cloning(clone)
                .with_output_kind(output_type)
                .with_volumes(
                    original_volume.unwrap_or(defaults.original_volume),
                    dubbed_volume.unwrap_or(defaults.dubbed_volume),
                )
                .with_speaking_rate(speaking_rate);
            pipeline.dub(&job).await
        }
        Command::Tts {
            text,
            model,
            speaking_rate,
            reference,
        } => {
            let mut request = SpeechRequest::new(text, model).with_speaking_rate(speaking_rate);
            if let Some(reference) = reference {
                request = request.with_reference(reference);
            }
            pipeline.synthesize_to_file(&request).await
        }
        Command::Clone { base, reference } => pipeline.clone_voice(&base, &reference).await,
        Command::Podcast {
            script,
            models,
            speaking_rate,
            reference,
        } => {
            let script = std::fs::read_to_string(&script)
                .with_context(|| format!("Failed to read script {}", script.display()))?;
            let mut request =
                PodcastRequest::new(script, models).with_speaking_rate(speaking_rate);
            if let Some(reference) = reference {
                request = request.with_references(vec![Some(reference)]);
            }
            pipeline.generate_podcast(&request).await
        }
        Command::Models => {
            for name in pipeline.list_models()? {
                println!("{}", name);
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    Ok(report(&outcome))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
