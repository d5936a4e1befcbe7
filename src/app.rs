//! Interactive client: one loop owning the terminal, the socket and the session.

use crate::channel::{FrameSink, ServerAddress, WsChannel};
use crate::draw::{Overlay, Painter};
use crate::icon::{HttpIconProbe, IconProbe, NoIcons};
use crate::layout::Viewport;
use crate::protocol::Outbound;
use crate::render::MessageKind;
use crate::session::{AuthStatus, Session, SessionOptions};
use crate::terminal::Terminal;
use anyhow::Context;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const HELP_TEXT: &str = "\
MACRODECK
─────────────────
Mouse  Press a button
1-9    Pick a config
p      Back to config picker
r      Reconnect
?      Close help
q/Esc  Quit
─────────────────";

/// Per-request timeout for icon lookups
const ICON_TIMEOUT: Duration = Duration::from_secs(3);

pub struct ClientConfig {
    pub address: ServerAddress,
    pub session: SessionOptions,
    pub icons: bool,
    pub frame_time: f32,
}

/// Sink used while no connection is open
struct Offline;

impl FrameSink for Offline {
    fn send(&mut self, frame: Outbound) {
        warn!("Not connected; dropped {}", frame);
    }
}

enum Flow {
    Continue,
    Quit,
}

struct App {
    address: ServerAddress,
    session: Session,
    channel: Option<WsChannel>,
    show_help: bool,
}

impl App {
    fn connect(&mut self) {
        self.channel = None;
        match WsChannel::connect(&self.address) {
            Ok(channel) => {
                info!("Session open on {}", channel.url());
                self.channel = Some(channel);
                self.session.show_message(MessageKind::Info, "Connected, waiting for server...");
            }
            Err(e) => {
                warn!("{}", e);
                self.session.channel_lost(&e.to_string());
            }
        }
    }

    fn poll_channel(&mut self) {
        let Some(channel) = self.channel.as_mut() else { return };
        let (frames, error) = channel.poll();
        for frame in &frames {
            self.session.handle_frame(frame, channel);
        }
        if let Some(e) = error {
            self.channel = None;
            self.session.channel_lost(&e.to_string());
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        let code = normalize_key(key.code, key.modifiers);
        if code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Flow::Quit;
        }

        if self.session.awaiting_password() {
            match code {
                KeyCode::Enter => {
                    let session = &mut self.session;
                    match self.channel.as_mut() {
                        Some(channel) => session.submit_password(channel),
                        None => session.submit_password(&mut Offline),
                    }
                }
                KeyCode::Backspace => self.session.pop_input(),
                KeyCode::Esc => {
                    if !self.session.clear_input() {
                        return Flow::Quit;
                    }
                }
                KeyCode::Char(c) => self.session.push_input(c),
                _ => {}
            }
            return Flow::Continue;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Char('r') | KeyCode::Char('R') if self.channel.is_none() => {
                info!("Reconnecting to {}", self.address.websocket_url());
                self.connect();
            }
            KeyCode::Char('p') => {
                self.session.reenter_picker();
            }
            KeyCode::Char(c @ '1'..='9') => {
                let position = c as usize - '1' as usize;
                self.session.select_option(position);
            }
            _ => {}
        }
        Flow::Continue
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let (x, y) = self.layout_point(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.session.pointer_down(x, y),
            MouseEventKind::Drag(MouseButton::Left) => self.session.pointer_drag(x, y),
            MouseEventKind::Up(MouseButton::Left) => {
                let now = Instant::now();
                let session = &mut self.session;
                match self.channel.as_mut() {
                    Some(channel) => session.pointer_up(x, y, now, channel),
                    None => session.pointer_up(x, y, now, &mut Offline),
                }
            }
            _ => {}
        }
    }

    /// A terminal cell covers two layout rows; prefer whichever hits a widget.
    fn layout_point(&self, column: u16, row: u16) -> (u32, u32) {
        let x = column as u32;
        let top = row as u32 * 2;
        if self.session.pass().hit(x, top).is_some() {
            (x, top)
        } else {
            (x, top + 1)
        }
    }

    fn status(&self) -> String {
        let state = match (&self.channel, self.session.auth_status()) {
            (None, _) => "disconnected",
            (Some(_), AuthStatus::Authenticated) => "connected",
            (Some(_), AuthStatus::Required) => "password required",
            (Some(_), AuthStatus::Unknown) => "waiting for server",
        };
        let name = self
            .session
            .active_config()
            .and_then(|c| c.name())
            .map(|n| format!(" | {}", n))
            .unwrap_or_default();
        let picker = if self.session.has_picker() { " | p configs" } else { "" };
        format!(" {} ({}){}{} | ? help", self.address.websocket_url(), state, name, picker)
    }
}

pub fn run(config: ClientConfig) -> anyhow::Result<()> {
    let mut term = Terminal::new(true).context("initialising terminal")?;
    let _mouse_guard = MouseCaptureGuard::enable().context("enabling mouse capture")?;

    let probe: Arc<dyn IconProbe> = if config.icons {
        Arc::new(HttpIconProbe::new(&config.address.http_base(), ICON_TIMEOUT))
    } else {
        Arc::new(NoIcons)
    };
    let (w, h) = term.size();
    let session = Session::new(config.session, probe, viewport_for(w, h));
    let mut app = App {
        address: config.address,
        session,
        channel: None,
        show_help: false,
    };
    let mut painter = Painter::new();
    let frame_time = Duration::from_secs_f32(config.frame_time.max(0.01));

    let url = app.address.websocket_url();
    app.session.show_message(MessageKind::Info, format!("Connecting to {}...", url));
    draw(&mut painter, &mut term, &app)?;
    app.connect();

    loop {
        app.poll_channel();

        let timeout = app
            .session
            .next_deadline()
            .map(|due| due.saturating_duration_since(Instant::now()).min(frame_time))
            .unwrap_or(frame_time);

        if event::poll(timeout)? {
            loop {
                let flow = match event::read()? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => app.handle_key(key),
                    Event::Mouse(mouse) => {
                        app.handle_mouse(mouse);
                        Flow::Continue
                    }
                    Event::Resize(w, h) => {
                        term.resize(w, h);
                        term.clear_screen()?;
                        app.session.resize(viewport_for(w, h));
                        Flow::Continue
                    }
                    _ => Flow::Continue,
                };
                if let Flow::Quit = flow {
                    return Ok(());
                }
                if !event::poll(Duration::ZERO)? {
                    break;
                }
            }
        }

        app.session.poll_probes();
        app.session.tick(Instant::now());
        draw(&mut painter, &mut term, &app)?;
    }
}

fn draw(painter: &mut Painter, term: &mut Terminal, app: &App) -> io::Result<()> {
    let status = app.status();
    let overlay = Overlay {
        pressed: app.session.pressed(),
        input_len: app.session.input_len(),
        status: &status,
        help: app.show_help.then_some(HELP_TEXT),
    };
    painter.draw(term, app.session.pass(), &overlay);
    term.present()
}

/// Layout viewport for a terminal size; the bottom row is the status bar.
fn viewport_for(width: u16, height: u16) -> Viewport {
    Viewport::new(width as u32, height.saturating_sub(1) as u32 * 2)
}

struct MouseCaptureGuard;

impl MouseCaptureGuard {
    fn enable() -> io::Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnableMouseCapture)?;
        Ok(Self)
    }
}

impl Drop for MouseCaptureGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, DisableMouseCapture);
    }
}

fn normalize_key(code: KeyCode, mods: KeyModifiers) -> KeyCode {
    if code == KeyCode::Char('/') && mods.contains(KeyModifiers::SHIFT) {
        KeyCode::Char('?')
    } else {
        code
    }
}
