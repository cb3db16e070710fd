use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail};
use base64::{engine::general_purpose, Engine as _};
use dotenvy::dotenv;
use tracing::info;

mod config;
mod editor;
mod error;
mod export;
mod genai;
mod media;
mod state;
mod utils;

use config::Config;
use export::ExportFormat;
use genai::{cancel_pair, GeminiClient, InlineImage, PollPolicy};
use state::{AspectRatio, EditorSession};
use utils::logging::init_logging;

fn usage() -> &'static str {
    "Usage:\n  \
     younan-studio edit --input <image> [--background <id>] [--uniform <id>] [--state-uniform <id>]\n                     \
     [--prompt <text>] [--unblur] [--auto] [--adjust <knob=value,...>] [--ratio <original|3x2|2x3|1x1>]\n                     \
     [--format <jpg|png>]\n  \
     younan-studio merge --subject <image> --scene <image> [--style <text>] [--keep-background]\n                     \
     [--format <jpg|png>]\n  \
     younan-studio video --input <image> [--prompt <text>]"
}

#[derive(Debug)]
struct EditArgs {
    input: PathBuf,
    background: String,
    uniform: String,
    state_uniform: String,
    prompt: Option<String>,
    unblur: bool,
    auto: bool,
    adjustments: Vec<(String, f32)>,
    ratio: Option<AspectRatio>,
    format: ExportFormat,
}

#[derive(Debug)]
struct MergeArgs {
    subject: PathBuf,
    scene: PathBuf,
    style: String,
    remove_background: bool,
    format: ExportFormat,
}

#[derive(Debug)]
struct VideoArgs {
    input: PathBuf,
    prompt: String,
}

fn expect_value<'a>(args: &'a [String], index: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .map(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_format(value: &str) -> anyhow::Result<ExportFormat> {
    ExportFormat::parse(value).ok_or_else(|| anyhow!("Unknown format '{value}' (use jpg or png)"))
}

fn parse_adjust_pairs(value: &str) -> anyhow::Result<Vec<(String, f32)>> {
    let mut pairs = Vec::new();
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (knob, raw) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected knob=value in --adjust, got '{entry}'"))?;
        let parsed = raw
            .trim()
            .parse::<f32>()
            .map_err(|_| anyhow!("Invalid number '{raw}' for adjustment '{knob}'"))?;
        pairs.push((knob.trim().to_string(), parsed));
    }
    Ok(pairs)
}

fn parse_edit_args(args: &[String]) -> anyhow::Result<EditArgs> {
    let mut input: Option<PathBuf> = None;
    let mut background = "white".to_string();
    let mut uniform = "none".to_string();
    let mut state_uniform = "none".to_string();
    let mut prompt = None;
    let mut unblur = false;
    let mut auto = false;
    let mut adjustments = Vec::new();
    let mut ratio = None;
    let mut format = ExportFormat::Jpg;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--input" => {
                index += 1;
                input = Some(PathBuf::from(expect_value(args, index, "--input")?));
            }
            "--background" => {
                index += 1;
                background = expect_value(args, index, "--background")?.to_string();
            }
            "--uniform" => {
                index += 1;
                uniform = expect_value(args, index, "--uniform")?.to_string();
            }
            "--state-uniform" => {
                index += 1;
                state_uniform = expect_value(args, index, "--state-uniform")?.to_string();
            }
            "--prompt" => {
                index += 1;
                prompt = Some(expect_value(args, index, "--prompt")?.to_string());
            }
            "--unblur" => unblur = true,
            "--auto" => auto = true,
            "--adjust" => {
                index += 1;
                adjustments.extend(parse_adjust_pairs(expect_value(args, index, "--adjust")?)?);
            }
            "--ratio" => {
                index += 1;
                let value = expect_value(args, index, "--ratio")?;
                ratio = Some(
                    AspectRatio::parse(value)
                        .ok_or_else(|| anyhow!("Unknown ratio '{value}'"))?,
                );
            }
            "--format" => {
                index += 1;
                format = parse_format(expect_value(args, index, "--format")?)?;
            }
            other => bail!("Unknown edit option '{other}'\n{}", usage()),
        }
        index += 1;
    }

    Ok(EditArgs {
        input: input.ok_or_else(|| anyhow!("--input is required\n{}", usage()))?,
        background,
        uniform,
        state_uniform,
        prompt,
        unblur,
        auto,
        adjustments,
        ratio,
        format,
    })
}

fn parse_merge_args(args: &[String]) -> anyhow::Result<MergeArgs> {
    let mut subject: Option<PathBuf> = None;
    let mut scene: Option<PathBuf> = None;
    let mut style = String::new();
    let mut remove_background = true;
    let mut format = ExportFormat::Jpg;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--subject" => {
                index += 1;
                subject = Some(PathBuf::from(expect_value(args, index, "--subject")?));
            }
            "--scene" => {
                index += 1;
                scene = Some(PathBuf::from(expect_value(args, index, "--scene")?));
            }
            "--style" => {
                index += 1;
                style = expect_value(args, index, "--style")?.to_string();
            }
            "--keep-background" => remove_background = false,
            "--format" => {
                index += 1;
                format = parse_format(expect_value(args, index, "--format")?)?;
            }
            other => bail!("Unknown merge option '{other}'\n{}", usage()),
        }
        index += 1;
    }

    Ok(MergeArgs {
        subject: subject.ok_or_else(|| anyhow!("--subject is required\n{}", usage()))?,
        scene: scene.ok_or_else(|| anyhow!("--scene is required\n{}", usage()))?,
        style,
        remove_background,
        format,
    })
}

fn parse_video_args(args: &[String]) -> anyhow::Result<VideoArgs> {
    let mut input: Option<PathBuf> = None;
    let mut prompt = String::new();

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--input" => {
                index += 1;
                input = Some(PathBuf::from(expect_value(args, index, "--input")?));
            }
            "--prompt" => {
                index += 1;
                prompt = expect_value(args, index, "--prompt")?.to_string();
            }
            other => bail!("Unknown video option '{other}'\n{}", usage()),
        }
        index += 1;
    }

    Ok(VideoArgs {
        input: input.ok_or_else(|| anyhow!("--input is required\n{}", usage()))?,
        prompt,
    })
}

async fn run_edit(config: &Config, args: EditArgs) -> anyhow::Result<()> {
    let client = GeminiClient::new(config);
    let mut session = EditorSession::new();

    let ticket = session.begin_upload();
    let image = media::ingest(&args.input).await?;
    info!(
        "Ingested {} ({}, natural ratio {})",
        image.file_name, image.mime_type, image.aspect_ratio
    );
    session.apply_upload(ticket, image);

    session.select_background(&args.background);
    session.select_uniform(&args.uniform);
    if args.state_uniform != "none" {
        session.select_state_uniform(&args.state_uniform);
    }
    if let Some(ratio) = args.ratio {
        session.set_aspect_ratio(ratio);
    }
    if let Some(prompt) = args.prompt {
        session.set_prompt_text(prompt);
    }
    info!("Composed prompt: {}", session.prompt_text());

    if args.unblur {
        session.unblur(&client).await;
    } else {
        session.generate(&client).await;
    }
    if let Some(message) = session.error_message() {
        bail!("{message}");
    }
    if let Some(message) = session.success_message() {
        info!("{message}");
    }

    // Darkroom pass on the generated result, the CLI stand-in for the
    // preview sliders.
    if args.auto {
        session.apply_auto_adjust();
    }
    for (knob, value) in &args.adjustments {
        session.set_adjustment(knob, *value)?;
    }

    let path = session.export(args.format, &config.output_dir)?;
    println!("{}", path.display());
    Ok(())
}

async fn run_merge(config: &Config, args: MergeArgs) -> anyhow::Result<()> {
    let client = GeminiClient::new(config);
    let subject = media::ingest(&args.subject).await?;
    let scene = media::ingest(&args.scene).await?;

    let result_base64 = client
        .generate_merge_image(
            &InlineImage::from_ingested(&subject),
            &InlineImage::from_ingested(&scene),
            &args.style,
            args.remove_background,
        )
        .await?;

    let bytes = general_purpose::STANDARD
        .decode(result_base64)
        .map_err(|err| anyhow!("Merged image payload was not valid base64: {err}"))?;
    let path = export::export_merge_image(&bytes, args.format, &config.output_dir)?;
    println!("{}", path.display());
    Ok(())
}

async fn run_video(config: &Config, args: VideoArgs) -> anyhow::Result<()> {
    let client = GeminiClient::new(config);
    let image = media::ingest(&args.input).await?;

    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received; cancelling the video operation.");
            handle.cancel();
        }
    });

    let bytes = client
        .generate_video(
            &InlineImage::from_ingested(&image),
            &args.prompt,
            PollPolicy::from_config(config),
            token,
        )
        .await?;

    let path = export::save_video(&bytes, &config.output_dir)?;
    println!("{}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Config::from_env();
    let _guards = init_logging(&config.log_level);

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1) else {
        eprintln!("{}", usage());
        return Ok(());
    };

    match command.as_str() {
        "edit" => run_edit(&config, parse_edit_args(&args[2..])?).await,
        "merge" => run_merge(&config, parse_merge_args(&args[2..])?).await,
        "video" => run_video(&config, parse_video_args(&args[2..])?).await,
        other => {
            eprintln!("Unknown command '{other}'\n{}", usage());
            Ok(())
        }
    }
}
