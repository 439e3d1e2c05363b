use std::path::PathBuf;

use clap::Parser;
use futures::Stream;
use hg_core::app;
use hg_core::config::Config;
use hg_core::logging;
use hg_core::palette::Palette;
use hg_core::render::{ContentRenderer, MarkdownRenderer, PlainRenderer};
use hg_core::session::Session;
use hg_core::stream::AnomalyPolicy;
use hg_gateway::mock::{fixtures, mock_stream};
use hg_gateway::{Emitter, HttpGateway, HttpOptions, MockEmitter, RawEvent};

#[derive(Parser)]
#[command(name = "hackgpt", version, about = "Terminal client for the HackGPT assistant")]
struct Cli {
    /// Assistant service URL (overrides the config file)
    #[arg(long)]
    server: Option<String>,

    /// Config file (defaults to ~/.config/hackgpt/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log file (defaults to ~/.local/share/hackgpt/client.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Leave a visible notice when a response is cut off by the next one
    #[arg(long)]
    strict: bool,

    /// Play a scripted conversation offline instead of connecting
    #[arg(long)]
    demo: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref());
    if let Some(server) = cli.server {
        config.server.url = server;
    }
    if cli.strict {
        config.stream.anomaly_policy = AnomalyPolicy::Strict;
    }

    if let Err(e) = logging::init(&config.logging, cli.log_file.as_deref()) {
        eprintln!("[hackgpt] warning: logging disabled: {e}");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("[hackgpt] error: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    };

    let renderer: Box<dyn ContentRenderer> = if config.render.markdown {
        Box::new(MarkdownRenderer::new(config.render.max_bytes))
    } else {
        Box::new(PlainRenderer::new(config.render.max_bytes))
    };
    let palette = Palette::with_colors(config.render.colors);

    let code = runtime.block_on(async {
        if cli.demo {
            tracing::info!("starting offline demo");
            let events = mock_stream(fixtures::demo_conversation());
            return run_session(MockEmitter::new(), events, renderer, &config, palette).await;
        }

        let options = HttpOptions::new(config.server.url.clone())
            .with_connect_timeout(config.server.connect_timeout());
        match HttpGateway::connect(options) {
            Ok((gateway, events)) => {
                tracing::info!(url = %config.server.url, client_id = gateway.client_id(), "connecting");
                run_session(gateway, events, renderer, &config, palette).await
            }
            Err(e) => {
                eprintln!("[hackgpt] error: {e}");
                1
            }
        }
    });
    std::process::exit(code);
}

async fn run_session<E, S>(
    emitter: E,
    events: S,
    renderer: Box<dyn ContentRenderer>,
    config: &Config,
    palette: Palette,
) -> i32
where
    E: Emitter,
    S: Stream<Item = RawEvent>,
{
    let mut session = Session::new(emitter, renderer).configure(&config.stream);
    match app::run(&mut session, events, palette).await {
        Ok(()) => {
            tracing::info!(messages = session.log().len(), "session closed");
            0
        }
        Err(e) => {
            tracing::error!(error = %e, "terminal failure");
            eprintln!("[hackgpt] error: {e}");
            1
        }
    }
}
