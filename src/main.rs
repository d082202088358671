use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subtitle_translator::cli::{Cli, Commands};
use subtitle_translator::config::Config;
use subtitle_translator::task::{MemoryTaskStore, ProgressReporter, TaskReporter};
use subtitle_translator::translate::Translate;
use subtitle_translator::tts::{FfmpegEncoder, HttpSpeechBackend, TtsPipeline};
use subtitle_translator::{output, utils, JsonFileCache, SubtitleManager, TranslationEngine, YoutubeTranscriptFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "subtitle_translator=debug"
    } else {
        "subtitle_translator=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Get {
            video,
            language,
            tts,
            cookies,
            output,
            format,
        } => {
            if tts {
                let missing_deps = utils::check_dependencies(&config.app.ffmpeg_path).await;
                if !missing_deps.is_empty() {
                    eprintln!("{}", style("Dependency check warnings:").yellow());
                    for dep in missing_deps {
                        eprintln!("   • {}", dep);
                    }
                    eprintln!("   (Continuing anyway - audio generation may fail)");
                }
            }

            let language = language.unwrap_or_else(|| config.app.default_language.clone());
            let tasks = Arc::new(MemoryTaskStore::new());
            let task = tasks.create_task(&video, Some(&language), tts).await;
            let reporter = Arc::new(ProgressReporter::new(tasks.clone(), cli.quiet));

            let manager = build_manager(&config, reporter, tts)?
                .with_cookie_file(cookies.or_else(|| config.app.cookie_file.clone()));

            tracing::info!("Starting task {} for {}", task.id, video);
            let result = manager.process_task(&task).await?;

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, &format).await?;
                    println!("{} {}", style("Subtitles saved to:").green(), path.display());
                }
                None => output::print_to_console(&result, &format)?,
            }

            if tts {
                match &result.audio_path {
                    Some(audio_path) => println!("{} {}", style("Audio saved to:").green(), audio_path.display()),
                    None => eprintln!("{}", style("No audio was generated").yellow()),
                }
            }
        }
        Commands::Query {
            video,
            language,
            format,
        } => {
            let language = language.unwrap_or_else(|| config.app.default_language.clone());
            let manager = build_manager(&config, Arc::new(MemoryTaskStore::new()), false)?;

            match manager.query(&video, &language).await? {
                Some(result) => output::print_to_console(&result, &format)?,
                None => {
                    eprintln!(
                        "{} {} ({})",
                        style("No cached subtitles for").yellow(),
                        utils::preview(&video, 60),
                        language
                    );
                    std::process::exit(1);
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = Config::config_path()?;
                println!("Configuration file: {}", path.display());
                println!("Edit it, or set OPENAI_API_KEY / OPENAI_BASE_URL / OPENAI_MODEL / TTS_ENDPOINT.");
                println!("Run `subtrans config --show` to see the effective settings.");
            }
        }
    }

    Ok(())
}

/// Wire the configured backends into a manager.
///
/// A translator that cannot be built is kept as its error and only reported
/// when a request needs translating.
fn build_manager(config: &Config, reporter: Arc<dyn TaskReporter>, want_tts: bool) -> Result<SubtitleManager> {
    let timeout = config.request_timeout();

    let source = YoutubeTranscriptFetcher::with_timeout(timeout).context("Failed to create HTTP client")?;
    let store = JsonFileCache::new(config.cache_dir());

    let translator = TranslationEngine::from_config(&config.translator, timeout).map(|engine| {
        tracing::debug!("Translating with model {}", engine.model());
        Arc::new(engine) as Arc<dyn Translate>
    });
    if let Err(e) = &translator {
        tracing::debug!("Translation disabled: {}", e);
    }

    let mut manager =
        SubtitleManager::new(Arc::new(source), Arc::new(store), reporter).with_translator(translator);

    match HttpSpeechBackend::from_config(&config.speech, timeout) {
        Ok(backend) => {
            let encoder = FfmpegEncoder::new(config.app.ffmpeg_path.clone(), config.speech.sample_rate);
            let pipeline = TtsPipeline::new(Arc::new(backend), Arc::new(encoder), config.audio_dir());
            manager = manager.with_synthesizer(Arc::new(pipeline));
        }
        Err(e) if want_tts => tracing::warn!("Audio generation disabled: {:#}", e),
        Err(_) => {}
    }

    Ok(manager)
}
