//! Folio - content tools for the portfolio blog
//!
//! ## Usage
//!
//! ```bash
//! # Render stored content to HTML
//! folio render post.json --with-read-time
//!
//! # Check image blocks before saving
//! folio validate post.json
//!
//! # Rewrite legacy `file.url` images in canonical form
//! folio normalize post.json --out post.canonical.json
//!
//! # Fetch a published post
//! folio fetch hello-world --html
//!
//! # Upload an image for use in a post
//! FOLIO_API_TOKEN=... folio upload cover.png
//! ```

mod config;
mod input;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use folio_api::{FolioClient, SessionContext};
use folio_content::{
    BlockDocument, SaveOptions, estimate_read_time_at, render, render_value, render_with_read_time,
    validate_document,
};
use folio_editor::{DEFAULT_PICKER_PAGE_SIZE, UploadFile, format_file_size};
use folio_logging::FolioSubscriberBuilder;
use pulldown_cmark_escape::escape_html_body_text;
use tracing::{debug, info};

use config::CliConfig;

/// Folio - content tools for the portfolio blog
#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Render, check and publish Folio post content")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./folio.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API base URL, overrides config and FOLIO_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a document or post file to HTML
    Render {
        file: PathBuf,
        /// Write HTML here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Print the read time after the HTML
        #[arg(long)]
        with_read_time: bool,
    },
    /// Print the estimated read time
    ReadTime { file: PathBuf },
    /// Check that every image block is well formed
    Validate { file: PathBuf },
    /// Rewrite a document in canonical form
    Normalize {
        file: PathBuf,
        /// Also write the legacy `file.url` copy on image blocks
        #[arg(long)]
        legacy_mirror: bool,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Fetch a published post by slug
    Fetch {
        slug: String,
        /// Print rendered HTML instead of the stored JSON
        #[arg(long)]
        html: bool,
    },
    /// Upload an image to the media library
    Upload {
        path: PathBuf,
        /// Session token, overrides config and FOLIO_API_TOKEN
        #[arg(long)]
        token: Option<String>,
    },
    /// List images in the media library
    Media {
        #[arg(long, default_value_t = DEFAULT_PICKER_PAGE_SIZE)]
        per_page: u32,
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());
    config.apply_flags(cli.api_url.clone(), None);

    let mut log = config.log.clone();
    match cli.verbose {
        0 => {}
        1 => log.default_level = "debug".into(),
        _ => log.default_level = "trace".into(),
    }
    let _guard = FolioSubscriberBuilder::new().with_config(log).init()?;
    debug!(base_url = %config.api.base_url, "Configuration loaded");

    match cli.command {
        Commands::Render {
            file,
            out,
            with_read_time,
        } => cmd_render(&config, &file, out.as_deref(), with_read_time),
        Commands::ReadTime { file } => cmd_read_time(&config, &file),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Normalize {
            file,
            legacy_mirror,
            out,
        } => cmd_normalize(&file, legacy_mirror, out.as_deref()),
        Commands::Fetch { slug, html } => cmd_fetch(&config, &slug, html).await,
        Commands::Upload { path, token } => {
            config.apply_flags(None, token);
            cmd_upload(&config, &path).await
        }
        Commands::Media { per_page, token } => {
            config.apply_flags(None, token);
            cmd_media(&config, per_page).await
        }
    }
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = text.len(), "Output written");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn cmd_render(
    config: &CliConfig,
    file: &Path,
    out: Option<&Path>,
    with_read_time: bool,
) -> Result<()> {
    let raw = input::read_document_value(file)?;
    if !with_read_time {
        return write_output(out, &render_value(&raw));
    }

    let doc = BlockDocument::from_value(raw)?;
    let rendered = render_with_read_time(&doc, config.render.words_per_minute);
    write_output(out, &rendered.html)?;
    println!("{}", rendered.read_time);
    Ok(())
}

fn cmd_read_time(config: &CliConfig, file: &Path) -> Result<()> {
    let doc = input::read_document(file)?;
    println!("{}", estimate_read_time_at(&doc, config.render.words_per_minute));
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let raw = input::read_document_value(file)?;
    validate_document(&raw)?;
    let doc = BlockDocument::from_value(raw)?;
    println!("ok: {} blocks, {} images", doc.len(), doc.images().count());
    Ok(())
}

fn cmd_normalize(file: &Path, legacy_mirror: bool, out: Option<&Path>) -> Result<()> {
    let doc = input::read_document(file)?;
    let options = SaveOptions {
        legacy_file_mirror: legacy_mirror,
    };
    let text = serde_json::to_string_pretty(&doc.to_value_with(options))?;
    write_output(out, &text)
}

fn client(config: &CliConfig) -> Result<FolioClient> {
    Ok(FolioClient::new(config.api.clone())?)
}

fn authed_client(config: &CliConfig) -> Result<FolioClient> {
    let Some(token) = &config.token else {
        bail!("No session token: pass --token or set FOLIO_API_TOKEN");
    };
    Ok(client(config)?.with_session(SessionContext::new(token.clone())))
}

async fn cmd_fetch(config: &CliConfig, slug: &str, html: bool) -> Result<()> {
    let post = client(config)?.fetch_post(slug).await?;
    if html {
        let mut title = String::new();
        let _ = escape_html_body_text(&mut title, &post.title);
        println!("<h1>{title}</h1>");
        println!("{}", render(&post.content));
    } else {
        println!("{}", serde_json::to_string_pretty(&post)?);
    }
    Ok(())
}

async fn cmd_upload(config: &CliConfig, path: &Path) -> Result<()> {
    let file = UploadFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    config.upload.check(&file)?;

    let stored = authed_client(config)?.upload_image(file).await?;
    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}

async fn cmd_media(config: &CliConfig, per_page: u32) -> Result<()> {
    let assets = authed_client(config)?.list_media(per_page).await?;
    for asset in &assets {
        println!(
            "{:>6}  {:>10}  {}  {}",
            asset.id,
            format_file_size(asset.size_bytes),
            asset.url,
            asset.alt_text.as_deref().unwrap_or(&asset.original_name)
        );
    }
    info!(count = assets.len(), "Media listed");
    Ok(())
}
