use std::mem;
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ctrlp_core::command::COMMAND_MARKER;
use ctrlp_core::config::{DEFAULT_SCROLL_STEP_PX, DEFAULT_SEQUENCE_TIMEOUT};
use ctrlp_core::{Intent, ViewerConfig};
use tracing::trace;

use crate::timer::{DeadlineTimer, SequenceTimer};

/// Pressed twice in a row, jumps to the first page.
pub const TOP_LEADER: char = 'g';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Intent(Intent),
    /// The command line opened, pre-filled with the marker.
    BeginCommand,
    CommandSubmit { line: String },
    CommandCancel,
    /// A pending count or leader was dropped.
    Reset,
    /// Not ours; the host may handle it.
    PassThrough,
    /// Consumed, at most the pending hint changed.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    AwaitingSecondKey {
        leader: char,
    },
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ScrollDown,
    ScrollUp,
    NextPage,
    PrevPage,
    LastPage,
    ZoomIn,
    ZoomOut,
    FitWidth,
    FitHeight,
    Margins,
    Duplex,
    Color,
    Scale,
    Quit,
}

impl Action {
    fn for_key(code: KeyCode) -> Option<Self> {
        let action = match code {
            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::Char('J') | KeyCode::PageDown => Action::NextPage,
            KeyCode::Char('K') | KeyCode::PageUp => Action::PrevPage,
            KeyCode::Char('G') | KeyCode::End => Action::LastPage,
            KeyCode::Char('z') => Action::ZoomIn,
            KeyCode::Char('Z') => Action::ZoomOut,
            KeyCode::Char('w') => Action::FitWidth,
            KeyCode::Char('h') => Action::FitHeight,
            KeyCode::Char('m') => Action::Margins,
            KeyCode::Char('d') => Action::Duplex,
            KeyCode::Char('c') => Action::Color,
            KeyCode::Char('s') => Action::Scale,
            KeyCode::Char('q') => Action::Quit,
            _ => return None,
        };
        Some(action)
    }

    fn intent(self, count: usize, scroll_step: i64) -> Intent {
        let distance = scroll_step.saturating_mul(i64::try_from(count).unwrap_or(i64::MAX));
        match self {
            Action::ScrollDown => Intent::ScrollBy { pixels: distance },
            Action::ScrollUp => Intent::ScrollBy {
                pixels: distance.saturating_neg(),
            },
            Action::NextPage => Intent::NextPage { count },
            Action::PrevPage => Intent::PrevPage { count },
            Action::LastPage => Intent::JumpToLastPage,
            Action::ZoomIn => Intent::ZoomIn { count },
            Action::ZoomOut => Intent::ZoomOut { count },
            Action::FitWidth => Intent::FitToWidth,
            Action::FitHeight => Intent::FitToHeight,
            Action::Margins => Intent::CycleMarginPreset,
            Action::Duplex => Intent::CycleDuplexMode,
            Action::Color => Intent::ToggleColorMode,
            Action::Scale => Intent::CycleScaleMode,
            Action::Quit => Intent::Quit,
        }
    }
}

/// Turns key events into intents: vi-style counts, the `gg` sequence and a
/// `:` command line.
#[derive(Debug)]
pub struct EventMapper<T = DeadlineTimer> {
    mode: InputMode,
    count_prefix: String,
    command_line: String,
    timer: T,
    scroll_step: i64,
}

impl EventMapper<DeadlineTimer> {
    pub fn new() -> Self {
        Self::with_timer(
            DeadlineTimer::new(DEFAULT_SEQUENCE_TIMEOUT),
            DEFAULT_SCROLL_STEP_PX,
        )
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::with_timer(
            DeadlineTimer::new(config.sequence_timeout),
            config.scroll_step_px,
        )
    }

    /// Abandons a pending sequence once its deadline has passed.
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        if self.timer.expired(now) {
            self.on_sequence_timeout();
            true
        } else {
            false
        }
    }

    pub fn time_until_timeout(&self, now: Instant) -> Option<Duration> {
        self.timer.remaining(now)
    }
}

impl Default for EventMapper<DeadlineTimer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SequenceTimer> EventMapper<T> {
    pub fn with_timer(timer: T, scroll_step_px: u32) -> Self {
        Self {
            mode: InputMode::Normal,
            count_prefix: String::new(),
            command_line: String::new(),
            timer,
            scroll_step: i64::from(scroll_step_px),
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                let event = match self.mode {
                    InputMode::Command => self.map_command_key(key),
                    InputMode::Normal | InputMode::AwaitingSecondKey { .. } => {
                        self.map_normal_key(key)
                    }
                };
                trace!(?key, ?event, mode = ?self.mode, "mapped key");
                event
            }
            _ => UiEvent::None,
        }
    }

    /// The sequence timer fired: drop the count and any armed leader.
    pub fn on_sequence_timeout(&mut self) -> UiEvent {
        if self.mode == InputMode::Command {
            return UiEvent::None;
        }
        self.reset();
        UiEvent::Reset
    }

    /// Hint for the status line: `:12`, `g`, or the command being typed.
    pub fn pending_input(&self) -> Option<String> {
        if self.mode == InputMode::Command {
            return Some(self.command_line.clone());
        }
        let mut pending = String::new();
        if !self.count_prefix.is_empty() {
            pending.push(COMMAND_MARKER);
            pending.push_str(&self.count_prefix);
        }
        if let InputMode::AwaitingSecondKey { leader } = self.mode {
            pending.push(leader);
        }
        if pending.is_empty() {
            None
        } else {
            Some(pending)
        }
    }

    fn map_normal_key(&mut self, key: KeyEvent) -> UiEvent {
        let KeyEvent {
            code, modifiers, ..
        } = key;
        if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
            return self.pass_through(code, modifiers);
        }

        match code {
            KeyCode::Char(c) if c.is_ascii_digit() => {
                self.push_digit(c);
                UiEvent::None
            }
            KeyCode::Char(TOP_LEADER) => self.press_leader(TOP_LEADER),
            KeyCode::Char(COMMAND_MARKER) => self.begin_command(),
            KeyCode::Esc => {
                self.reset();
                UiEvent::Reset
            }
            _ => match Action::for_key(code) {
                Some(action) => {
                    let count = self.take_count();
                    self.reset();
                    UiEvent::Intent(action.intent(count, self.scroll_step))
                }
                None => self.pass_through(code, modifiers),
            },
        }
    }

    fn map_command_key(&mut self, key: KeyEvent) -> UiEvent {
        match key.code {
            KeyCode::Esc => {
                self.reset();
                UiEvent::CommandCancel
            }
            KeyCode::Enter => {
                let line = mem::take(&mut self.command_line);
                self.reset();
                UiEvent::CommandSubmit { line }
            }
            KeyCode::Backspace => {
                self.command_line.pop();
                if self.command_line.is_empty() {
                    self.reset();
                    UiEvent::CommandCancel
                } else {
                    UiEvent::None
                }
            }
            KeyCode::Char(c)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                self.command_line.push(c);
                UiEvent::None
            }
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: char) {
        self.count_prefix.push(digit);
        self.mode = InputMode::Normal;
        self.timer.arm();
    }

    fn press_leader(&mut self, leader: char) -> UiEvent {
        if self.mode == (InputMode::AwaitingSecondKey { leader }) {
            self.reset();
            return UiEvent::Intent(Intent::JumpToPage { page: 0 });
        }
        self.mode = InputMode::AwaitingSecondKey { leader };
        self.timer.arm();
        UiEvent::None
    }

    fn begin_command(&mut self) -> UiEvent {
        self.reset();
        self.mode = InputMode::Command;
        self.command_line.push(COMMAND_MARKER);
        UiEvent::BeginCommand
    }

    fn pass_through(&mut self, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        if !(modifiers.is_empty() || matches!(code, KeyCode::Modifier(_))) {
            self.reset();
        }
        UiEvent::PassThrough
    }

    /// Repeat count typed so far; anything unusable counts as one.
    fn take_count(&mut self) -> usize {
        let count = self
            .count_prefix
            .parse::<usize>()
            .ok()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.count_prefix.clear();
        count
    }

    fn reset(&mut self) {
        self.mode = InputMode::Normal;
        self.count_prefix.clear();
        self.command_line.clear();
        self.timer.cancel();
    }
}
