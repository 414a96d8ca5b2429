mod views;

use crate::cli::{self, Cli};
use crate::model::{Stage, WorkflowEvent};
use crate::service::{HttpMatchService, MatchService};
use crate::store::FileStore;
use crate::workflow::{self, Workflow, WorkflowCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Interest catalog shown in the profile form. Labels are presentational;
/// only the ids travel in the record.
pub(crate) const INTERESTS: &[(u32, &str)] = &[
    (1, "Hiking"),
    (2, "Cooking"),
    (3, "Music"),
    (4, "Movies"),
    (5, "Reading"),
    (6, "Travel"),
    (7, "Gaming"),
    (8, "Fitness"),
    (9, "Art"),
    (10, "Dancing"),
    (11, "Photography"),
    (12, "Cycling"),
];

/// Rows of the profile form, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProfileField {
    Age,
    Gender,
    Region,
    Interests,
    AgeMin,
    AgeMax,
    PrefGender,
}

pub(crate) const PROFILE_FIELDS: &[ProfileField] = &[
    ProfileField::Age,
    ProfileField::Gender,
    ProfileField::Region,
    ProfileField::Interests,
    ProfileField::AgeMin,
    ProfileField::AgeMax,
    ProfileField::PrefGender,
];

pub(crate) struct UiState {
    pub wf: Workflow<FileStore>,
    pub info: String,
    pub handle_editing: bool,
    pub field_cursor: usize,
    pub interest_cursor: usize,
}

impl UiState {
    fn new(wf: Workflow<FileStore>) -> Self {
        Self {
            wf,
            info: String::new(),
            handle_editing: false,
            field_cursor: 0,
            interest_cursor: 0,
        }
    }

    fn selected_field(&self) -> ProfileField {
        PROFILE_FIELDS[self.field_cursor.min(PROFILE_FIELDS.len() - 1)]
    }

    fn handle_event(&mut self, ev: WorkflowEvent) {
        let note = match &ev {
            WorkflowEvent::SharesGenerated { shares } => {
                Some(format!("Generated {} shares", shares.len()))
            }
            WorkflowEvent::GenerateFailed { message }
            | WorkflowEvent::UploadRejected { message }
            | WorkflowEvent::UploadFailed { message }
            | WorkflowEvent::MatchFetchFailed { message } => Some(message.clone()),
            WorkflowEvent::UploadAccepted { .. } => {
                Some("Upload accepted — session token stored".into())
            }
            WorkflowEvent::MatchesFetched { handles } => Some(if handles.is_empty() {
                "No matches yet".into()
            } else {
                format!("{} match(es) found", handles.len())
            }),
        };

        match self.wf.apply(ev) {
            Ok(()) => {
                if let Some(note) = note {
                    self.info = note;
                }
            }
            Err(e) => self.info = format!("State update failed: {e:#}"),
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the UI thread and the
    // controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WorkflowCommand>();

    let cfg = cli::build_config(&args);
    let service: Arc<dyn MatchService> = Arc::new(HttpMatchService::new(&cfg)?);

    let store = cli::open_store(&args)?;
    let mut wf = Workflow::load(store, cli::build_draft_profile(&args))?;
    if args.reset {
        wf.reset(cli::build_draft_profile(&args))?;
    }
    if let Some(handle) = args.handle.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
        wf.shares.handle = handle.to_string();
    }

    // TUI runs in a dedicated thread to keep all blocking terminal I/O out
    // of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(wf, event_rx, cmd_tx));

    let res = workflow::run_controller(service, cmd_rx, event_tx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread. The workflow machine and its
/// store are owned here; the controller only ever sees commands and events.
fn run_threaded(
    wf: Workflow<FileStore>,
    mut event_rx: UnboundedReceiver<WorkflowEvent>,
    cmd_tx: UnboundedSender<WorkflowCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::new(wf);

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.handle_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| views::draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k.modifiers, k.code, &cmd_tx) {
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(io::stdout(), LeaveAlternateScreen).ok();
    res
}

/// Returns true when the UI should shut down.
fn handle_key(
    state: &mut UiState,
    modifiers: KeyModifiers,
    code: KeyCode,
    cmd_tx: &UnboundedSender<WorkflowCommand>,
) -> bool {
    // Handle editing captures everything except its own exit keys.
    if state.handle_editing {
        match code {
            KeyCode::Enter | KeyCode::Esc => state.handle_editing = false,
            KeyCode::Backspace => state.wf.shares.pop_handle_char(),
            KeyCode::Char(c) => state.wf.shares.push_handle_char(c),
            _ => {}
        }
        return false;
    }

    if matches!(
        (modifiers, code),
        (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c'))
    ) {
        let _ = cmd_tx.send(WorkflowCommand::Quit);
        return true;
    }

    // While the read-only overlay is up, it swallows everything but its
    // own toggle.
    if state.wf.profile_visible() && state.wf.stage() != Stage::Profile {
        if code == KeyCode::Char('v') {
            state.wf.toggle_profile_view();
        }
        return false;
    }

    match state.wf.stage() {
        Stage::Profile => handle_profile_key(state, code),
        Stage::Shares => handle_shares_key(state, code, cmd_tx),
        Stage::Matches => handle_matches_key(state, code, cmd_tx),
    }
    false
}

fn handle_profile_key(state: &mut UiState, code: KeyCode) {
    match code {
        KeyCode::Up => {
            state.field_cursor = state.field_cursor.saturating_sub(1);
        }
        KeyCode::Down => {
            state.field_cursor = (state.field_cursor + 1).min(PROFILE_FIELDS.len() - 1);
        }
        KeyCode::Left | KeyCode::Right => {
            let delta: i64 = if code == KeyCode::Left { -1 } else { 1 };
            match state.selected_field() {
                ProfileField::Age => state.wf.profile.adjust_age(delta),
                ProfileField::Gender => state.wf.profile.cycle_gender(),
                ProfileField::Region => state.wf.profile.cycle_region(delta),
                ProfileField::Interests => {
                    let last = INTERESTS.len() - 1;
                    state.interest_cursor = if delta < 0 {
                        state.interest_cursor.saturating_sub(1)
                    } else {
                        (state.interest_cursor + 1).min(last)
                    };
                }
                ProfileField::AgeMin => state.wf.profile.adjust_age_min(delta),
                ProfileField::AgeMax => state.wf.profile.adjust_age_max(delta),
                ProfileField::PrefGender => state.wf.profile.cycle_pref_gender(),
            }
        }
        KeyCode::Char(' ') => {
            if state.selected_field() == ProfileField::Interests {
                let (id, _) = INTERESTS[state.interest_cursor];
                state.wf.profile.toggle_interest(id);
            }
        }
        KeyCode::Enter => {
            if state.wf.profile.can_submit() {
                match state.wf.submit_profile() {
                    Ok(true) => state.info = "Profile saved — it is now read-only".into(),
                    Ok(false) => {}
                    Err(e) => state.info = format!("Saving profile failed: {e:#}"),
                }
            } else {
                let remaining = state.wf.profile.interests_remaining();
                state.info = format!(
                    "Select {remaining} more interest{} to submit",
                    if remaining == 1 { "" } else { "s" }
                );
            }
        }
        _ => {}
    }
}

fn handle_shares_key(state: &mut UiState, code: KeyCode, cmd_tx: &UnboundedSender<WorkflowCommand>) {
    match code {
        KeyCode::Char('v') => state.wf.toggle_profile_view(),
        KeyCode::Char('h') => state.handle_editing = true,
        KeyCode::Char('g') => {
            if let Some(cmd) = state.wf.begin_generate() {
                let _ = cmd_tx.send(cmd);
                state.info = "Generating shares…".into();
            } else {
                state.info = generate_gate_message(&state.wf.shares).into();
            }
        }
        KeyCode::Char('u') => {
            if let Some(cmd) = state.wf.begin_upload() {
                let _ = cmd_tx.send(cmd);
                state.info = "Uploading shares…".into();
            } else {
                state.info = upload_gate_message(&state.wf.shares).into();
            }
        }
        _ => {}
    }
}

fn handle_matches_key(
    state: &mut UiState,
    code: KeyCode,
    cmd_tx: &UnboundedSender<WorkflowCommand>,
) {
    match code {
        KeyCode::Char('v') => state.wf.toggle_profile_view(),
        KeyCode::Char('r') => {
            if let Some(cmd) = state.wf.begin_match_fetch() {
                let _ = cmd_tx.send(cmd);
                state.info = "Checking for matches…".into();
            } else {
                state.info = "Still checking…".into();
            }
        }
        KeyCode::Char('c') => {
            let handles = state.wf.matches.matches.clone().unwrap_or_default();
            if handles.is_empty() {
                state.info = "Nothing to copy yet".into();
            } else {
                let text = handles
                    .iter()
                    .map(|h| format!("@{h}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                match copy_to_clipboard(&text) {
                    Ok(()) => state.info = "✓ Matches copied to clipboard".into(),
                    Err(e) => state.info = format!("Copy failed: {e:#}"),
                }
            }
        }
        _ => {}
    }
}

fn generate_gate_message(step: &crate::workflow::ShareStep) -> &'static str {
    if step.busy() {
        "Busy…"
    } else if step.shares.is_some() {
        "Shares already generated"
    } else {
        "Share generation unavailable"
    }
}

fn upload_gate_message(step: &crate::workflow::ShareStep) -> &'static str {
    if step.upload_complete {
        "Upload already complete"
    } else if step.busy() {
        "Busy…"
    } else if step.shares.as_ref().map_or(true, |s| s.is_empty()) {
        "Generate shares first (press g)"
    } else if step.handle.trim().is_empty() {
        "Set a public handle first (press h)"
    } else {
        "Upload unavailable"
    }
}

// Global clipboard manager channel, initialized once on first use.
static CLIPBOARD_TX: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Initialize the clipboard manager thread if not already initialized.
/// Clipboard operations run sequentially on a dedicated thread; each
/// instance is kept alive long enough for clipboard managers to read the
/// contents on Linux.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    if CLIPBOARD_TX.get().is_none() {
        let (tx, rx) = std_mpsc::channel::<String>();
        std::thread::spawn(move || {
            use arboard::Clipboard;
            while let Ok(text) = rx.recv() {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });
        let _ = CLIPBOARD_TX.set(tx);
    }
    CLIPBOARD_TX
        .get()
        .ok_or_else(|| anyhow::anyhow!("failed to initialize clipboard manager"))
}

/// Queue text for the clipboard without blocking the UI thread.
fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("clipboard manager thread unavailable"))
}
