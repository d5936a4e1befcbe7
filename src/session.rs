//! Client state machine: handshake, active layout and the current screen.
//!
//! Everything here runs on the UI thread. Frames, input and timers are fed in
//! by the app loop; the only asynchronous part is the icon probe batch,
//! whose results are collected with `poll_probes`.

use crate::channel::FrameSink;
use crate::config::{self, LayoutConfig, NamedConfigs, Resolution};
use crate::dispatch::CommandDispatcher;
use crate::icon::{IconProbe, ProbeBatch};
use crate::layout::{LayoutPolicy, Viewport};
use crate::protocol::{Inbound, Outbound};
use crate::render::{self, Handler, MessageKind, PendingGrid, RenderPass, View, WidgetId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No handshake frame seen on this connection yet
    Unknown,
    Required,
    Authenticated,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub policy: LayoutPolicy,
    pub cooldown: Duration,
    /// Answer `auth-required` with this instead of prompting
    pub password: Option<String>,
}

/// Button held down by the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Press {
    widget: WidgetId,
    generation: u64,
    over: bool,
}

pub struct Session {
    options: SessionOptions,
    viewport: Viewport,
    auth: AuthStatus,
    auth_error: Option<String>,
    auto_answered: bool,
    input: String,
    document: Option<NamedConfigs>,
    active: Option<LayoutConfig>,
    generation: u64,
    pass: RenderPass,
    pending: Option<PendingGrid>,
    probes: ProbeBatch,
    dispatcher: CommandDispatcher,
    press: Option<Press>,
}

impl Session {
    pub fn new(options: SessionOptions, probe: Arc<dyn IconProbe>, viewport: Viewport) -> Self {
        let dispatcher = CommandDispatcher::new(options.cooldown);
        Self {
            options,
            viewport,
            auth: AuthStatus::Unknown,
            auth_error: None,
            auto_answered: false,
            input: String::new(),
            document: None,
            active: None,
            generation: 0,
            pass: RenderPass::empty(0),
            pending: None,
            probes: ProbeBatch::new(probe),
            dispatcher,
            press: None,
        }
    }

    pub fn pass(&self) -> &RenderPass {
        &self.pass
    }

    #[allow(dead_code)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn auth_status(&self) -> AuthStatus {
        self.auth
    }

    pub fn active_config(&self) -> Option<&LayoutConfig> {
        self.active.as_ref()
    }

    /// True when the server sent a named-config list
    pub fn has_picker(&self) -> bool {
        self.document.is_some()
    }

    pub fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn awaiting_password(&self) -> bool {
        matches!(self.pass.view, View::Auth { .. })
    }

    /// Widget currently held down with the pointer still over it
    pub fn pressed(&self) -> Option<WidgetId> {
        self.press
            .filter(|p| p.over && p.generation == self.pass.generation)
            .map(|p| p.widget)
    }

    /// Replace the screen with a status line.
    pub fn show_message(&mut self, kind: MessageKind, text: impl Into<String>) {
        let generation = self.next_generation();
        self.pass = RenderPass::message(generation, kind, text);
    }

    /// Process one inbound frame. Frames must be fed in arrival order.
    pub fn handle_frame(&mut self, frame: &str, sink: &mut dyn FrameSink) {
        let inbound = Inbound::parse(frame);
        debug!("Received {}", inbound.kind());

        match inbound {
            Inbound::AuthRequired => {
                self.auth = AuthStatus::Required;
                match self.options.password.clone() {
                    Some(password) if !self.auto_answered => {
                        self.auto_answered = true;
                        info!("Server requires a password; using the configured one");
                        self.send_password(&password, sink);
                    }
                    _ => self.show_auth_prompt(),
                }
            }
            Inbound::AuthNotRequired | Inbound::AuthSuccess => {
                self.auth = AuthStatus::Authenticated;
                self.auth_error = None;
                self.input.clear();
                sink.send(Outbound::GetConfig);
                self.show_message(MessageKind::Info, "Loading configuration...");
            }
            Inbound::AuthFailed => {
                warn!("Server rejected the password");
                self.auth = AuthStatus::Required;
                self.auth_error = Some("Incorrect password".to_string());
                self.input.clear();
                self.show_auth_prompt();
            }
            Inbound::Config(raw) => self.load_document(&raw),
            Inbound::ConfigLoadFailed(err) => {
                warn!("Server could not load its config: {}", err.message());
                self.document = None;
                self.active = None;
                self.show_message(MessageKind::Error, err.message());
            }
            Inbound::Unknown(text) => debug!("Ignoring unknown frame '{}'", text),
        }
    }

    fn load_document(&mut self, raw: &str) {
        match config::resolve(raw) {
            Ok(Resolution::Active(layout)) => {
                info!("Received layout config");
                self.document = None;
                self.active = Some(layout);
                self.render_grid();
            }
            Ok(Resolution::SelectionRequired(named)) => {
                info!("Received {} named configs", named.len());
                self.document = Some(named);
                self.active = None;
                self.show_picker();
            }
            Err(e) => {
                warn!("Config rejected: {}", e);
                self.document = None;
                self.active = None;
                self.show_message(MessageKind::Error, e.to_string());
            }
        }
    }

    /// The connection is gone: forget everything learned over it.
    pub fn channel_lost(&mut self, reason: &str) {
        info!("Connection lost: {}", reason);
        self.auth = AuthStatus::Unknown;
        self.auth_error = None;
        self.auto_answered = false;
        self.input.clear();
        self.document = None;
        self.active = None;
        self.show_message(
            MessageKind::Error,
            format!("Disconnected ({}). Press r to reconnect", reason),
        );
    }

    /// New viewport size: rebuild whatever is on screen.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        if self.awaiting_password() {
            self.show_auth_prompt();
        } else if self.active.is_some() {
            self.render_grid();
        } else if matches!(self.pass.view, View::Picker(_)) {
            self.show_picker();
        }
    }

    /// Activate the named config at `entry` (an index into the list).
    pub fn select_config(&mut self, entry: usize) -> bool {
        let Some(layout) = self.document.as_ref().and_then(|d| d.select_index(entry)) else {
            return false;
        };
        info!("Selected config '{}'", layout.name().unwrap_or("?"));
        self.active = Some(layout);
        self.render_grid();
        true
    }

    /// Select by picker position (digit keys), counting only offered options
    pub fn select_option(&mut self, position: usize) -> bool {
        let entry = match &self.pass.view {
            View::Picker(options) => options.get(position).map(|o| o.entry),
            _ => None,
        };
        entry.is_some_and(|e| self.select_config(e))
    }

    /// Go back to the config picker.
    pub fn reenter_picker(&mut self) -> bool {
        if self.document.is_none() {
            return false;
        }
        self.active = None;
        self.show_picker();
        true
    }

    pub fn push_input(&mut self, c: char) {
        if self.awaiting_password() {
            self.input.push(c);
        }
    }

    pub fn pop_input(&mut self) {
        self.input.pop();
    }

    /// Clear the password field; false when it was already empty
    pub fn clear_input(&mut self) -> bool {
        let had_input = !self.input.is_empty();
        self.input.clear();
        had_input
    }

    pub fn submit_password(&mut self, sink: &mut dyn FrameSink) {
        if !self.awaiting_password() {
            return;
        }
        let password = std::mem::take(&mut self.input);
        self.send_password(&password, sink);
    }

    fn send_password(&mut self, password: &str, sink: &mut dyn FrameSink) {
        sink.send(Outbound::Auth(password.trim().to_string()));
        self.show_message(MessageKind::Info, "Authenticating...");
    }

    pub fn pointer_down(&mut self, x: u32, y: u32) {
        self.press = self.pass.hit(x, y).map(|widget| Press {
            widget,
            generation: self.pass.generation,
            over: true,
        });
    }

    pub fn pointer_drag(&mut self, x: u32, y: u32) {
        let hit = self.pass.hit(x, y);
        if let Some(press) = self.press.as_mut() {
            press.over = hit == Some(press.widget);
        }
    }

    /// Releasing over the widget that was pressed activates it.
    pub fn pointer_up(&mut self, x: u32, y: u32, now: Instant, sink: &mut dyn FrameSink) {
        let Some(press) = self.press.take() else { return };
        if press.generation != self.pass.generation || self.pass.hit(x, y) != Some(press.widget) {
            return;
        }
        self.activate(press.widget, now, sink);
    }

    pub fn activate(&mut self, widget: WidgetId, now: Instant, sink: &mut dyn FrameSink) {
        let Some(handler) = self.pass.handler(widget).cloned() else { return };
        match handler {
            Handler::RunMacro { button, macro_name } => {
                self.dispatcher
                    .click(&mut self.pass.cooldowns, button, &macro_name, now, sink);
            }
            Handler::SelectConfig(entry) => {
                self.select_config(entry);
            }
            Handler::SubmitPassword => self.submit_password(sink),
        }
    }

    /// Collect finished icon probes; returns true when the grid appeared.
    pub fn poll_probes(&mut self) -> bool {
        // Drained every tick so stale results do not pile up
        let Some(outcomes) = self.probes.poll() else { return false };
        match self.pending.take() {
            Some(pending) if pending.generation == self.generation => {
                self.pass = pending.complete(&outcomes);
                true
            }
            _ => false,
        }
    }

    /// Release buttons whose cooldown has run out
    pub fn tick(&mut self, now: Instant) {
        self.dispatcher.fire_due(&mut self.pass.cooldowns, now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.dispatcher.next_due()
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.pending = None;
        self.press = None;
        self.probes.abandon();
        self.generation
    }

    fn show_auth_prompt(&mut self) {
        let generation = self.next_generation();
        self.pass = RenderPass::auth(generation, self.viewport, self.auth_error.clone());
    }

    fn show_picker(&mut self) {
        let generation = self.next_generation();
        let pass = match &self.document {
            Some(document) => RenderPass::picker(generation, self.viewport, &document.names()),
            None => RenderPass::empty(generation),
        };
        self.pass = pass;
    }

    fn render_grid(&mut self) {
        let generation = self.next_generation();
        let Some(active) = self.active.as_ref() else {
            self.pass = RenderPass::empty(generation);
            return;
        };

        match render::begin_grid(active, self.viewport, &self.options.policy, generation) {
            Ok(pending) => {
                let macros = pending.macros();
                debug!(
                    "Pass {}: {}x{} grid, {} buttons",
                    generation, pending.geometry.rows, pending.geometry.cols, macros.len()
                );
                if macros.is_empty() {
                    self.pass = pending.complete(&[]);
                } else {
                    self.probes.start(generation, macros);
                    self.pass = RenderPass::message(generation, MessageKind::Info, "Loading icons...");
                    self.pending = Some(pending);
                }
            }
            Err(e) => {
                warn!("Layout error: {}", e);
                self.pass = RenderPass::message(generation, MessageKind::Error, e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::NoIcons;
    use crate::layout::EmptyCells;
    use crate::style::Label;
    use std::thread;

    fn session() -> Session {
        session_with(SessionOptions::default())
    }

    fn session_with(options: SessionOptions) -> Session {
        Session::new(options, Arc::new(NoIcons), Viewport::new(400, 400))
    }

    fn settle(session: &mut Session) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.pending.is_some() && Instant::now() < deadline {
            session.poll_probes();
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn labels(session: &Session) -> Vec<String> {
        session
            .pass()
            .grid()
            .map(|g| {
                g.cells
                    .iter()
                    .map(|c| match &c.style.label {
                        Label::Text(t) => t.clone(),
                        Label::Icon(_) => "<icon>".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn message(session: &Session) -> Option<(MessageKind, String)> {
        match &session.pass().view {
            View::Message { kind, text } => Some((*kind, text.clone())),
            _ => None,
        }
    }

    #[test]
    fn open_server_goes_straight_to_grid() {
        let mut s = session();
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame("auth-not-required", &mut sent);
        assert_eq!(sent, vec![Outbound::GetConfig]);
        assert_eq!(s.auth_status(), AuthStatus::Authenticated);

        s.handle_frame(
            r#"config:{"size":"2x2","buttons":[{"macro":"a"},{"macro":"b"},{"macro":"c"}]}"#,
            &mut sent,
        );
        settle(&mut s);
        assert_eq!(labels(&s), vec!["a", "b", "c"]);
        assert_eq!(s.pass().generation, s.generation());
    }

    #[test]
    fn password_prompt_sends_trimmed_password() {
        let mut s = session();
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame("auth-required", &mut sent);
        assert!(s.awaiting_password());
        assert!(sent.is_empty());

        for c in "  hunter2 ".chars() {
            s.push_input(c);
        }
        assert_eq!(s.input_len(), 10);
        s.submit_password(&mut sent);
        assert_eq!(sent, vec![Outbound::Auth("hunter2".into())]);
        assert!(!s.awaiting_password());

        s.handle_frame("auth-success", &mut sent);
        assert_eq!(sent.last(), Some(&Outbound::GetConfig));
    }

    #[test]
    fn configured_password_is_used_once_per_connection() {
        let mut s = session_with(SessionOptions {
            password: Some("secret".into()),
            ..SessionOptions::default()
        });
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame("auth-required", &mut sent);
        assert_eq!(sent, vec![Outbound::Auth("secret".into())]);

        // Rejected: fall back to the prompt with an error
        s.handle_frame("auth-failed", &mut sent);
        s.handle_frame("auth-required", &mut sent);
        assert_eq!(sent.len(), 1);
        assert!(s.awaiting_password());
        assert!(matches!(
            &s.pass().view,
            View::Auth { error: Some(e), .. } if e == "Incorrect password"
        ));

        s.channel_lost("closed");
        s.handle_frame("auth-required", &mut sent);
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn named_configs_go_through_the_picker() {
        let mut s = session();
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame("auth-not-required", &mut sent);
        s.handle_frame(
            r#"config:[{"name":"Home","size":"1x1","buttons":[{"macro":"x"}]},{"name":"Work","size":"1x2","buttons":[{"macro":"y"},{"macro":"z"}]}]"#,
            &mut sent,
        );
        let View::Picker(options) = &s.pass().view else { panic!("expected picker") };
        let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Home", "Work"]);
        assert!(s.active_config().is_none());

        let rect = options[1].rect;
        s.pointer_down(rect.x, rect.y);
        s.pointer_up(rect.x, rect.y, Instant::now(), &mut sent);
        settle(&mut s);

        let grid = s.pass().grid().expect("grid after selection");
        assert_eq!((grid.geometry.rows, grid.geometry.cols), (1, 2));
        assert_eq!(labels(&s), vec!["y", "z"]);

        assert!(s.reenter_picker());
        assert!(matches!(s.pass().view, View::Picker(_)));
        assert!(s.select_option(0));
        settle(&mut s);
        assert_eq!(labels(&s), vec!["x"]);
    }

    #[test]
    fn channel_loss_clears_everything() {
        let mut s = session();
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame("auth-not-required", &mut sent);
        s.handle_frame(r#"config:{"size":"1x1","buttons":[{"macro":"a"}]}"#, &mut sent);
        settle(&mut s);
        assert!(s.pass().grid().is_some());

        s.channel_lost("connection reset");
        assert!(s.pass().grid().is_none());
        assert!(s.active_config().is_none());
        assert!(!s.has_picker());
        assert_eq!(s.auth_status(), AuthStatus::Unknown);
        assert_eq!(message(&s).map(|m| m.0), Some(MessageKind::Error));
    }

    #[test]
    fn bad_documents_show_errors_without_a_grid() {
        let mut s = session();
        let mut sent: Vec<Outbound> = Vec::new();

        s.handle_frame("config:{not json", &mut sent);
        assert_eq!(message(&s).map(|m| m.0), Some(MessageKind::Error));
        assert!(s.active_config().is_none());

        s.handle_frame(r#"config:{"size":"2-2","buttons":[{"macro":"a"}]}"#, &mut sent);
        let (kind, text) = message(&s).unwrap();
        assert_eq!(kind, MessageKind::Error);
        assert!(text.contains("`size`"));
        assert!(s.pass().grid().is_none());

        s.handle_frame("conf-err-2", &mut sent);
        assert!(message(&s).unwrap().1.contains("not found"));

        s.handle_frame("something-else", &mut sent);
        assert!(message(&s).unwrap().1.contains("not found"));
        assert!(sent.is_empty());
    }

    #[test]
    fn resize_rebuilds_and_drops_the_old_pass() {
        let mut s = session();
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame(
            r#"config:{"size":"1x2","rotation":"horizontal","buttons":[{"macro":"a"},{"macro":"b"}]}"#,
            &mut sent,
        );
        let first = s.generation();
        // Portrait before the first batch finished
        s.resize(Viewport::new(200, 400));
        assert!(s.generation() > first);
        settle(&mut s);

        let grid = s.pass().grid().unwrap();
        assert!(grid.geometry.flipped);
        assert_eq!((grid.geometry.rows, grid.geometry.cols), (2, 1));
        assert_eq!(s.pass().generation, s.generation());
    }

    #[test]
    fn resize_keeps_a_fresh_password_prompt() {
        let mut s = session();
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame("auth-not-required", &mut sent);
        s.handle_frame(r#"config:{"size":"1x1","buttons":[{"macro":"a"}]}"#, &mut sent);
        settle(&mut s);
        assert!(s.pass().grid().is_some());

        s.handle_frame("auth-required", &mut sent);
        s.resize(Viewport::new(300, 200));
        settle(&mut s);
        assert!(s.awaiting_password());
        assert!(s.pass().grid().is_none());
    }

    #[test]
    fn late_icon_results_are_released_without_a_pending_grid() {
        let mut s = session();
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame(r#"config:{"size":"1x3","buttons":[{"macro":"a"},{"macro":"b"},{"macro":"c"}]}"#, &mut sent);
        s.channel_lost("closed");
        assert!(s.pending.is_none());

        thread::sleep(Duration::from_millis(50));
        assert!(!s.poll_probes());
        assert_eq!(s.probes.backlog(), 0);
    }

    #[test]
    fn clicks_are_debounced_per_button() {
        let mut s = session_with(SessionOptions {
            cooldown: Duration::from_millis(100),
            ..SessionOptions::default()
        });
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame(r#"config:{"size":"1x1","buttons":[{"macro":"go"}]}"#, &mut sent);
        settle(&mut s);

        let face = s.pass().grid().unwrap().cells[0].face;
        let (x, y) = (face.x + 1, face.y + 1);
        let t0 = Instant::now();

        s.pointer_down(x, y);
        assert_eq!(s.pressed(), Some(0));
        s.pointer_up(x, y, t0, &mut sent);
        s.pointer_down(x, y);
        s.pointer_up(x, y, t0 + Duration::from_millis(30), &mut sent);
        assert_eq!(sent, vec![Outbound::RunMacro("go".into())]);

        s.tick(t0 + Duration::from_millis(100));
        s.pointer_down(x, y);
        s.pointer_up(x, y, t0 + Duration::from_millis(120), &mut sent);
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn dragging_off_a_button_cancels_the_click() {
        let mut s = session();
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame(r#"config:{"size":"1x1","buttons":[{"macro":"go"}]}"#, &mut sent);
        settle(&mut s);

        let face = s.pass().grid().unwrap().cells[0].face;
        s.pointer_down(face.x, face.y);
        s.pointer_drag(0, 0);
        assert_eq!(s.pressed(), None);
        s.pointer_up(0, 0, Instant::now(), &mut sent);
        assert!(sent.is_empty());
    }

    #[test]
    fn placeholder_policy_reaches_the_grid() {
        let mut s = session_with(SessionOptions {
            policy: LayoutPolicy { empty_cells: EmptyCells::Placeholder, ..LayoutPolicy::default() },
            ..SessionOptions::default()
        });
        let mut sent: Vec<Outbound> = Vec::new();
        s.handle_frame(r#"config:{"size":"2x2","buttons":[{"macro":"a"}]}"#, &mut sent);
        settle(&mut s);
        assert_eq!(s.pass().grid().unwrap().placeholders.len(), 3);
    }
}
