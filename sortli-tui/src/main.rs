//! Terminal UI for sortli: analyze a photo of your waste and find nearby recycling sites.

mod app;
mod cli;
mod input;
mod ui;

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use sortli_core::{
    CapturedImage, Providers, ToolRegistry, config::ApiKeys, service::SortliService,
};
use sortli_provider_groq as groq;
use sortli_provider_openai as openai;
use sortli_provider_websearch as websearch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::cli::Cli;
use crate::input::Action;

const DEFAULT_LOG_FILTER: &str = "warn,sortli=info,sortli_core=info,sortli_provider_openai=info,sortli_provider_groq=info,sortli_provider_websearch=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    let config = cli.app_config();

    // Credentials: secrets file, overridden by flags/env
    let keys = ApiKeys::load(&cli.secrets)
        .await?
        .merge(cli.api_key_overrides());
    let openai_key = keys.require_openai().inspect_err(|err| error!(%err))?;
    let groq_key = keys.require_groq().inspect_err(|err| error!(%err))?;

    // HTTP + service setup
    let client = Client::builder()
        .user_agent("sortli/0.1")
        .timeout(config.request_timeout)
        .build()?;

    let providers = Providers {
        classifier: openai::classifier(client.clone(), openai_key, config.classifier.clone()),
        generator: groq::generator(client.clone(), groq_key, config.generator.clone()),
        tools: ToolRegistry::new(vec![websearch::tool(client)]),
    };
    let service = SortliService::load(&config, providers)
        .await
        .inspect_err(|err| error!(%err, "Cannot start without recycling rules"))?;
    info!(rules = service.rules().len(), "Session ready");

    // App state
    let mut app = App::new(Arc::new(service), config.images_dir.clone());
    if let Some(image) = &cli.image {
        app.image_input = image.display().to_string();
    }

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::AnalyzeImage => {
                    let path_text = app.image_input.trim();
                    if path_text.is_empty() {
                        app.error_message =
                            Some("Type the path of a photo, then press Enter".into());
                        continue;
                    }
                    let path = PathBuf::from(path_text);

                    app.begin_capture();
                    let image = match CapturedImage::load(&path).await {
                        Ok(image) => image,
                        Err(err) => {
                            warn!(path = %path.display(), error = %err, "Cannot read image");
                            app.is_loading = false;
                            app.error_message =
                                Some(format!("Cannot read {}: {err}", path.display()));
                            continue;
                        }
                    };

                    let service = Arc::clone(&app.service);
                    let res = service
                        .analyze_image(image, |state| {
                            app.set_pipeline_state(state);
                            if let Err(err) = terminal.draw(|frame| ui::draw(frame, &app)) {
                                warn!(error = %err, "Redraw failed");
                            }
                        })
                        .await;

                    app.is_loading = false;
                    match res {
                        Ok(session) => app.show_session(session),
                        Err(err) => {
                            app.error_message = Some(err.to_string());
                        }
                    }
                }
                Action::FindSites => {
                    app.start_activity("Searching nearby sites");
                    app.error_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let res = app.service.find_nearby_sites().await;

                    app.is_loading = false;
                    match res {
                        Ok(answer) => app.show_sites(answer),
                        Err(err) => {
                            app.error_message = Some(err.to_string());
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
