use animyst::config::Config;
use animyst::llm::{GenerationClient, GenerationRequest};
use animyst::media::FfmpegReconciler;
use animyst::pipeline::Pipeline;
use animyst::render::ManimRenderer;
use animyst::speech::ElevenLabsClient;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "animyst",
    about = "Turn an idea into a narrated animated video with AI",
    version
)]
struct Args {
    /// What you want to animate, e.g. "Explain the Pythagorean theorem"
    idea: Option<String>,

    /// Generate from a text/markdown document instead of an idea
    #[arg(long)]
    document: Option<PathBuf>,

    /// Working directory for generated artifacts (defaults to current directory)
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Maximum number of repair retries after a failed render (overrides config)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Skip narration audio even if a speech key is configured
    #[arg(long)]
    no_audio: bool,

    /// Print the generated scene code alongside the result
    #[arg(long)]
    show_code: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load();

    let request = GenerationRequest::from_parts(args.idea, args.document)?;
    let workdir = args.workdir.canonicalize()?;
    let max_retries = args.max_retries.unwrap_or(config.max_retries);

    let generator = GenerationClient::from_config(&config)?;

    let speech = if args.no_audio {
        None
    } else {
        match ElevenLabsClient::from_config(&config) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("audio disabled: {}", e);
                None
            }
        }
    };

    let pipeline = Pipeline::new(
        generator,
        speech,
        ManimRenderer::new(&workdir),
        FfmpegReconciler::new(&workdir),
        &workdir,
        max_retries,
    );

    match pipeline.run(&request).await {
        Ok(artifact) => {
            println!("Video generated successfully: {}", artifact.video_path.display());
            if !artifact.script.is_empty() {
                println!("\nNarration:\n{}", artifact.script);
            }
            if args.show_code {
                println!("\nScene code:\n{}", artifact.code);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Could not generate the video. {}", e);
            std::process::exit(1);
        }
    }
}
