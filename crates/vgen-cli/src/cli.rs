//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use vgen_client::{VideoGenConfig, WaitOptions};
use vgen_models::{GenerationRequest, Quality, SizeSpec};

#[derive(Parser)]
#[command(name = "vgen")]
#[command(about = "Generate videos from text prompts with a hosted video model")]
#[command(long_about = "\
Generate videos from text prompts with a hosted video model

Connection settings are read from the environment (or a .env file):

  VGEN_ENDPOINT          Resource URL, e.g. https://my-resource.openai.azure.com
  VGEN_API_KEY           API key
  VGEN_DEPLOYMENT        Video model deployment (default: sora)
  VGEN_CHAT_DEPLOYMENT   Chat deployment for 'vgen enhance'

Set LOG_FORMAT=json for JSON logs and RUST_LOG to change verbosity.")]
#[command(version)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Submit a prompt, wait for the job and download the video
    Generate(GenerateArgs),
    /// Show the current state of a job
    Status {
        job_id: String,
    },
    /// Wait for a job to finish and print its result URL
    Wait {
        job_id: String,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Download a finished video
    Download {
        url: String,
        /// Destination file
        output: PathBuf,
    },
    /// Delete a job
    Delete {
        job_id: String,
    },
    /// Expand a short prompt using the chat deployment
    Enhance {
        prompt: String,
    },
    /// List preset output sizes for every aspect ratio and quality
    Dimensions,
    /// Print the JSON schema of a generation request
    Schema,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Text prompt describing the video
    pub prompt: String,

    /// Explicit width in pixels (requires --height)
    #[arg(long)]
    pub width: Option<u32>,

    /// Explicit height in pixels (requires --width)
    #[arg(long)]
    pub height: Option<u32>,

    /// Aspect ratio as W:H, used when no explicit size is given
    #[arg(long, default_value = "16:9")]
    pub aspect_ratio: String,

    /// Quality preset: low, medium, high or ultra
    #[arg(long, default_value = "medium")]
    pub quality: Quality,

    /// Video length in seconds
    #[arg(long, default_value_t = 5)]
    pub duration: u32,

    /// Frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of videos to generate
    #[arg(long, default_value_t = 1)]
    pub variants: u32,

    /// Style tag forwarded to the model
    #[arg(long)]
    pub style: Option<String>,

    /// Metadata to attach, as key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,

    /// Where to save the video
    #[arg(short, long, default_value = "video.mp4")]
    pub output: PathBuf,

    /// Only submit the job and print its id
    #[arg(long)]
    pub no_wait: bool,

    #[command(flatten)]
    pub wait: WaitArgs,
}

impl GenerateArgs {
    pub fn to_request(&self) -> anyhow::Result<GenerationRequest> {
        let size = match (self.width, self.height) {
            (Some(width), Some(height)) => SizeSpec::explicit(width, height),
            (None, None) => SizeSpec::aspect_ratio(self.aspect_ratio.clone(), self.quality),
            _ => bail!("--width and --height must be given together"),
        };

        let mut request = GenerationRequest::new(self.prompt.clone(), size)
            .with_duration(self.duration)
            .with_variants(self.variants);
        if let Some(fps) = self.fps {
            request = request.with_frame_rate(fps);
        }
        if let Some(seed) = self.seed {
            request = request.with_seed(seed);
        }
        if let Some(style) = &self.style {
            request = request.with_style(style.clone());
        }
        for (key, value) in &self.metadata {
            request = request.with_metadata(key.clone(), value.clone());
        }
        Ok(request)
    }
}

#[derive(Args, Clone, Copy)]
pub struct WaitArgs {
    /// Seconds between status checks
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Give up after this many seconds
    #[arg(long)]
    pub max_wait: Option<u64>,
}

impl WaitArgs {
    /// Override the configured intervals with any flags given.
    pub fn options(&self, config: &VideoGenConfig) -> WaitOptions {
        let defaults = WaitOptions::from_config(config);
        WaitOptions::new(
            self.poll_interval
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            self.max_wait
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_wait),
        )
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vgen").chain(args.iter().copied())).unwrap()
    }

    fn generate_args(args: &[&str]) -> GenerateArgs {
        match parse(args).command {
            Command::Generate(args) => args,
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_generate_defaults_to_aspect_ratio() {
        let request = generate_args(&["generate", "a red kite"]).to_request().unwrap();
        assert_eq!(request.size, SizeSpec::aspect_ratio("16:9", Quality::Medium));
        assert_eq!(request.duration_seconds, 5);
    }

    #[test]
    fn test_generate_explicit_size_and_metadata() {
        let request = generate_args(&[
            "generate",
            "a red kite",
            "--width",
            "1024",
            "--height",
            "576",
            "--seed",
            "7",
            "--meta",
            "project=kites",
        ])
        .to_request()
        .unwrap();

        assert_eq!(request.size, SizeSpec::explicit(1024, 576));
        assert_eq!(request.seed, Some(7));
        assert_eq!(request.metadata.get("project").map(String::as_str), Some("kites"));
    }

    #[test]
    fn test_generate_rejects_half_explicit_size() {
        let args = generate_args(&["generate", "a red kite", "--width", "1024"]);
        assert!(args.to_request().is_err());
    }

    #[test]
    fn test_quality_flag_is_parsed() {
        let args = generate_args(&["generate", "x", "--quality", "ultra", "--aspect-ratio", "9:16"]);
        assert_eq!(args.quality, Quality::Ultra);
        assert_eq!(args.aspect_ratio, "9:16");
    }

    #[test]
    fn test_bad_metadata_is_rejected() {
        let result = Cli::try_parse_from(["vgen", "generate", "x", "--meta", "novalue"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_wait_flags_override_config() {
        let config = VideoGenConfig::new("https://example.openai.azure.com", "key").unwrap();
        let wait = WaitArgs {
            poll_interval: Some(2),
            max_wait: None,
        };
        let options = wait.options(&config);
        assert_eq!(options.poll_interval, Duration::from_secs(2));
        assert_eq!(options.max_wait, config.max_wait);
    }
}
