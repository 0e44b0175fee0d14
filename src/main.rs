mod config;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use lokiscope_logs::{
    ApplyOutcome, FetchDispatcher, FetchKind, FetchRequest, FetchResponse, LabelFilter, LogSession,
    LogSource,
};
use lokiscope_query::{LokiClient, download_url};
use lokiscope_tui::{
    Action, AppState, Event, EventHandler, HelpOverlay, KeyBindings, KeyContext, LabelPanel,
    LogViewerScreen, PresetList, Tui,
};

use crate::config::{FileConfig, Settings};

/// Lokiscope - live tail for multi-stream log queries
#[derive(Parser, Debug)]
#[command(name = "lokiscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL (e.g. http://localhost:3100)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Namespace every query is scoped to
    #[arg(short, long)]
    namespace: Option<String>,

    /// Extra label matcher, repeatable
    #[arg(short = 'l', long = "label", value_name = "NAME=VALUE")]
    labels: Vec<String>,

    /// Regex applied to log lines
    #[arg(short, long)]
    search: Option<String>,

    /// Full selector, e.g. '{namespace="prod",app="api"} |~ "timeout"'
    #[arg(long, conflicts_with_all = ["namespace", "labels", "search"])]
    selector: Option<String>,

    /// Maximum entries per stream per page
    #[arg(long)]
    limit: Option<usize>,

    /// Live tail polling period in seconds
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// How far back each page looks, in minutes
    #[arg(long, value_name = "MINUTES")]
    lookback: Option<u64>,

    /// Bearer token for the backend
    #[arg(long, env = "LOKISCOPE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Tenant id sent as X-Scope-OrgID
    #[arg(long)]
    org_id: Option<String>,

    /// Config file (defaults to ~/.config/lokiscope/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write diagnostics to a file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.log_file.as_deref())?;

    let file = FileConfig::discover(args.config.as_deref())?;
    let settings = Settings::resolve(&args, file)?;

    // Run the application
    let result = run_app(settings).await;

    // Handle any errors
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

fn build_client(settings: &Settings) -> Result<LokiClient> {
    let mut client = LokiClient::new(&settings.endpoint)
        .with_context(|| format!("invalid endpoint '{}'", settings.endpoint))?
        .with_lookback(settings.lookback);
    if let Some(token) = &settings.token {
        client = client.with_token(token.clone());
    }
    if let Some(org_id) = &settings.org_id {
        client = client.with_org_id(org_id.clone());
    }
    Ok(client)
}

/// Everything the action handler mutates
struct Viewer<S: LogSource> {
    state: AppState,
    session: LogSession,
    dispatcher: FetchDispatcher<S>,
    lookback_minutes: u64,
}

async fn run_app(settings: Settings) -> Result<()> {
    // Create action channels
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel::<FetchResponse>();

    let client = build_client(&settings)?;
    let lookback_minutes = settings.lookback_minutes();

    let mut viewer = Viewer {
        state: AppState::new(settings.endpoint, settings.presets),
        session: LogSession::new(settings.filter, settings.session),
        dispatcher: FetchDispatcher::new(client, fetch_tx),
        lookback_minutes,
    };

    // Initialize TUI
    let mut tui = Tui::new()?;

    // Initialize event handler
    let mut events = EventHandler::new(Duration::from_millis(250));

    // Initialize keybindings
    let keybindings = KeyBindings::new();

    // Live tail timer; the first tick is one full period after the initial load
    let period = viewer.session.poll_interval();
    let mut poll = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let initial = viewer.session.start();
    viewer.submit(initial);

    // Initial render
    render(&mut tui, &mut viewer)?;

    // Main event loop
    loop {
        tokio::select! {
            // Handle terminal events
            Some(event) = events.next() => {
                match event {
                    Event::Key(key) => {
                        let context = KeyContext::from(viewer.state.focus());
                        if let Some(action) = keybindings.get_action(context, &key) {
                            let _ = action_tx.send(action);
                        }
                    }
                    Event::Mouse(mouse) => {
                        if let Some(action) = keybindings.get_mouse_action(&mouse) {
                            let _ = action_tx.send(action);
                        }
                    }
                    Event::Tick => {
                        // Just trigger a render so relative state stays fresh
                    }
                    Event::Resize(_, _) => {
                        let _ = action_tx.send(Action::Render);
                    }
                    Event::Error(e) => {
                        viewer.state.show_notice(e);
                    }
                }
            }

            // Handle completed fetches
            Some(response) = fetch_rx.recv() => {
                viewer.on_response(response);
            }

            // Live tail poll; the timer only fires while live
            _ = poll.tick(), if viewer.session.is_live() => {
                let request = viewer.session.poll_tick();
                viewer.submit(request);
            }

            // Handle user actions
            Some(action) = action_rx.recv() => {
                if action == Action::ReturnToTop {
                    poll.reset();
                }
                viewer.handle_action(action);
            }
        }

        if viewer.state.should_quit {
            break;
        }

        render(&mut tui, &mut viewer)?;
    }

    // Cleanup
    viewer.dispatcher.reset();
    events.shutdown();
    tui.restore()?;

    Ok(())
}

impl<S: LogSource> Viewer<S> {
    fn submit(&mut self, request: Option<FetchRequest>) {
        if let Some(request) = request {
            self.dispatcher.dispatch(request);
        }
    }

    /// Tell the session where the viewport is; may pause the tail or page older lines
    fn report_viewport(&mut self) {
        let viewport = self.state.viewport(self.session.len());
        let request = self.session.on_viewport(viewport);
        self.submit(request);
    }

    /// Drop in-flight work and start over with a new filter
    fn change_filter(&mut self, filter: LabelFilter) {
        self.dispatcher.reset();
        let request = self.session.set_filter(filter);
        self.dispatcher.dispatch(request);
        self.state.jump_to_top();
        self.state.ui_state.notice = None;
    }

    fn on_response(&mut self, response: FetchResponse) {
        match self.session.apply(response) {
            ApplyOutcome::Applied { kind, added } => {
                debug!(?kind, added, "fetch applied");
                if kind != FetchKind::Tail {
                    // Keep paging until the screen is full
                    self.report_viewport();
                }
            }
            ApplyOutcome::Exhausted => debug!("reached start of history"),
            ApplyOutcome::Failed(kind) => debug!(?kind, "fetch failed"),
            ApplyOutcome::Stale => {}
        }

        if self.session.take_scroll_to_top() {
            self.state.jump_to_top();
        }

        let pending = self.session.take_pending();
        self.submit(pending);
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => {
                self.state.should_quit = true;
            }
            Action::ToggleHelp => {
                self.state.ui_state.help_visible = !self.state.ui_state.help_visible;
            }
            Action::Dismiss => {
                if !self.state.dismiss() {
                    self.session.dismiss_error();
                }
            }

            // Log viewer navigation
            Action::ScrollUp(n) => {
                self.state.scroll_up(n);
                self.report_viewport();
            }
            Action::ScrollDown(n) => {
                self.state.scroll_down(n, self.session.len());
                self.report_viewport();
            }
            Action::PageUp => {
                self.state.page_up();
                self.report_viewport();
            }
            Action::PageDown => {
                self.state.page_down(self.session.len());
                self.report_viewport();
            }
            Action::ScrollToBottom => {
                self.state.scroll_to_bottom(self.session.len());
                self.report_viewport();
            }
            Action::ReturnToTop => {
                self.state.jump_to_top();
                let request = self.session.return_to_top();
                self.submit(request);
            }
            Action::Refresh => {
                self.dispatcher.reset();
                let request = self.session.refresh();
                self.dispatcher.dispatch(request);
                self.state.jump_to_top();
            }

            // Display
            Action::ToggleTimestamps => {
                self.state.ui_state.show_timestamps = !self.state.ui_state.show_timestamps;
            }
            Action::ToggleLocalTime => {
                self.state.ui_state.use_local_time = !self.state.ui_state.use_local_time;
            }
            Action::ToggleStreamNames => {
                self.state.ui_state.show_stream_names = !self.state.ui_state.show_stream_names;
            }
            Action::ToggleStats => {
                self.state.ui_state.stats_visible = !self.state.ui_state.stats_visible;
            }

            // Search
            Action::OpenSearch => {
                let current = self.session.filter().search().to_string();
                self.state.start_search(&current);
            }
            Action::CloseSearch => {
                self.state.cancel_search();
            }
            Action::SearchInput(c) => {
                self.state.search_input_char(c);
                self.state.ui_state.filter_error = None;
            }
            Action::SearchBackspace => {
                self.state.search_input_backspace();
                self.state.ui_state.filter_error = None;
            }
            Action::SearchClear => {
                self.state.ui_state.search_input.clear();
                self.state.ui_state.filter_error = None;
            }
            Action::ApplySearch => {
                let mut filter = self.session.filter().clone();
                filter.set_search(self.state.ui_state.search_input.as_str());
                match filter.search_regex() {
                    Ok(_) => {
                        self.state.cancel_search();
                        if filter != *self.session.filter() {
                            self.change_filter(filter);
                        }
                    }
                    Err(e) => {
                        self.state.ui_state.filter_error = Some(format!("Invalid regex: {}", e));
                    }
                }
            }
            Action::ClearSearch => {
                if self.session.filter().has_search() {
                    let mut filter = self.session.filter().clone();
                    filter.set_search("");
                    self.change_filter(filter);
                }
            }

            // Label panel
            Action::ToggleLabelPanel => {
                let ui = &mut self.state.ui_state;
                ui.label_panel_visible = !ui.label_panel_visible;
                ui.label_selection = 0;
            }
            Action::LabelUp => {
                self.state.label_up();
            }
            Action::LabelDown => {
                let count = self
                    .session
                    .lines()
                    .nth(self.state.ui_state.selected)
                    .map(|line| line.source_labels.len())
                    .unwrap_or(0);
                self.state.label_down(count);
            }
            Action::LabelToggle => {
                let selected = self.session.lines().nth(self.state.ui_state.selected).and_then(
                    |line| {
                        LabelPanel::label_at(line.source_labels, self.state.ui_state.label_selection)
                            .map(|(name, value)| (name.to_string(), value.to_string()))
                    },
                );

                if let Some((name, value)) = selected {
                    let mut filter = self.session.filter().clone();
                    if filter.label(&name) == Some(value.as_str()) {
                        filter.remove_label(&name);
                    } else {
                        filter.add_label(name, value);
                    }
                    if filter != *self.session.filter() {
                        self.change_filter(filter);
                    }
                }
            }
            Action::ClearLabels => {
                let mut filter = self.session.filter().clone();
                filter.clear();
                if filter != *self.session.filter() {
                    self.change_filter(filter);
                }
            }

            // Saved filters
            Action::TogglePresets => {
                self.state.ui_state.presets_visible = !self.state.ui_state.presets_visible;
            }
            Action::PresetUp => {
                self.state.preset_up();
            }
            Action::PresetDown => {
                self.state.preset_down();
            }
            Action::PresetSelect => {
                if let Some(preset) = self.state.selected_preset().cloned() {
                    self.state.ui_state.presets_visible = false;
                    let mut filter = self.session.filter().clone();
                    filter.toggle_preset(&preset);
                    if filter != *self.session.filter() {
                        self.change_filter(filter);
                    }
                }
            }

            Action::ShowDownloadUrl => {
                let message = match download_url(
                    &self.state.endpoint,
                    self.session.filter().namespace(),
                    self.session.query(),
                    self.lookback_minutes,
                ) {
                    Ok(url) => format!("Download: {}", url),
                    Err(e) => format!("Download link unavailable: {}", e),
                };
                self.state.show_notice(message);
            }

            Action::ShowNotice(msg) => {
                self.state.show_notice(msg);
            }
            Action::Render => {
                // Just trigger a render
            }
        }
    }
}

fn render<S: LogSource>(tui: &mut Tui, viewer: &mut Viewer<S>) -> Result<()> {
    let Viewer { state, session, .. } = viewer;

    tui.terminal().draw(|frame| {
        LogViewerScreen::render(frame, state, session);

        // Render saved filters popup if visible
        if state.ui_state.presets_visible {
            PresetList::new(&state.presets, session.filter())
                .render_popup(frame, &mut state.ui_state.preset_state);
        }

        // Render help overlay if visible
        if state.ui_state.help_visible {
            HelpOverlay::render(frame);
        }
    })?;

    Ok(())
}
