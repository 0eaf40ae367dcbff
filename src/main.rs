use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "caption-compositor",
    version,
    about = "Render outlined captions onto template images"
)]
struct Cli {
    /// Template id from the catalog
    #[arg(short = 't', long = "template")]
    template: Option<String>,

    /// Caption for a region, as index=text (repeatable)
    #[arg(short = 'x', long = "text")]
    texts: Vec<String>,

    /// JSON array of {id, text} entries; "-" reads stdin
    #[arg(short = 'j', long = "texts-json")]
    texts_json: Option<String>,

    /// Use this image instead of the template's catalog image
    #[arg(short = 'i', long = "image")]
    image: Option<String>,

    /// Output PNG path (default: <template>.png)
    #[arg(short = 'o', long = "out")]
    out: Option<String>,

    /// List templates as JSON and exit
    #[arg(long = "list-templates")]
    list_templates: bool,

    /// Keyword filter for --list-templates
    #[arg(short = 'q', long = "query")]
    query: Option<String>,

    /// Print resolved text boxes as JSON instead of rendering
    #[arg(long = "show-boxes")]
    show_boxes: bool,

    /// Serve MCP over stdio
    #[arg(long = "mcp")]
    mcp: bool,

    /// Serve the HTTP API
    #[arg(long = "server")]
    server: bool,

    /// Address for --server (overrides settings)
    #[arg(long = "addr")]
    addr: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    caption_compositor::logging::init(cli.verbose)?;

    if cli.mcp || cli.server {
        let settings =
            caption_compositor::settings::load_settings(cli.read_settings.as_deref().map(Path::new))?;
        let addr = cli
            .addr
            .clone()
            .unwrap_or_else(|| settings.server_addr.clone());
        let captioner = Arc::new(caption_compositor::Captioner::new(settings)?);
        if cli.mcp {
            return caption_compositor::mcp::run_mcp(captioner).await;
        }
        return caption_compositor::server::run_server(captioner, addr).await;
    }

    let input = if cli.texts_json.as_deref() == Some("-") && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Some(buffer)
    } else {
        None
    };

    let output = caption_compositor::run(
        caption_compositor::Config {
            template: cli.template,
            texts: cli.texts,
            texts_json: cli.texts_json,
            image: cli.image,
            out: cli.out,
            list_templates: cli.list_templates,
            query: cli.query,
            show_boxes: cli.show_boxes,
            settings_path: cli.read_settings,
        },
        input,
    )
    .await?;

    println!("{}", output);
    Ok(())
}
