//! Interactive loop: line editing, slash commands and voice episodes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::*;
use rustyline::error::ReadlineError;
use rustyline::{
    Cmd, ConditionalEventHandler, DefaultEditor, Event, EventContext, EventHandler, KeyCode,
    KeyEvent, Modifiers, RepeatCount,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use cipherdesk_chat::{ChatError, PageAction, SessionController, SubmitOutcome};
use cipherdesk_core::types::Mode;
use cipherdesk_voice::{Chord, ChordKey, VoiceCaptureBridge, VoiceEvent};

use crate::render::{help_text, render_fragment, render_table};

// =============================================================================
// Commands
// =============================================================================

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text for the active mode.
    Query(String),
    /// `None` toggles.
    Mode(Option<Mode>),
    Clear,
    Voice,
    Page(PageAction),
    Export,
    Health,
    Help,
    Quit,
    Unknown(String),
}

/// Parse a line. Anything not starting with `/` is a query.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Query(line.to_string());
    };
    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("").to_ascii_lowercase();
    let arg = words.next();
    match (name.as_str(), arg) {
        ("mode", None) => Command::Mode(None),
        ("mode", Some(m)) => match m.to_ascii_lowercase().as_str() {
            "chat" | "conversational" | "ask" => Command::Mode(Some(Mode::Conversational)),
            "sql" | "raw" | "query" => Command::Mode(Some(Mode::RawQuery)),
            _ => Command::Unknown(trimmed.to_string()),
        },
        ("clear", None) => Command::Clear,
        ("voice", None) => Command::Voice,
        ("first", None) => Command::Page(PageAction::First),
        ("prev", None) => Command::Page(PageAction::Prev),
        ("next", None) => Command::Page(PageAction::Next),
        ("last", None) => Command::Page(PageAction::Last),
        ("page", Some(n)) => match n.parse::<usize>() {
            Ok(n) => Command::Page(PageAction::Goto(n)),
            Err(_) => Command::Unknown(trimmed.to_string()),
        },
        ("export", None) => Command::Export,
        ("health", None) => Command::Health,
        ("help", None) => Command::Help,
        ("quit", None) | ("exit", None) => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

// =============================================================================
// Voice chord
// =============================================================================

/// Line-editor key for a chord.
pub fn chord_key_event(chord: &Chord) -> KeyEvent {
    let mut mods = Modifiers::NONE;
    if chord.ctrl {
        mods |= Modifiers::CTRL;
    }
    if chord.alt {
        mods |= Modifiers::ALT;
    }
    match chord.key {
        // Terminals report Shift+letter as the uppercase letter.
        ChordKey::Char(c) if chord.shift => KeyEvent::new(c.to_ascii_uppercase(), mods),
        ChordKey::Char(c) => KeyEvent::new(c, mods),
        ChordKey::F(n) => {
            if chord.shift {
                mods |= Modifiers::SHIFT;
            }
            KeyEvent(KeyCode::F(n), mods)
        }
    }
}

/// Ends the current line and flags that the voice chord was pressed.
struct VoiceChordHandler {
    pressed: Arc<AtomicBool>,
}

impl ConditionalEventHandler for VoiceChordHandler {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        _ctx: &EventContext,
    ) -> Option<Cmd> {
        self.pressed.store(true, Ordering::SeqCst);
        Some(Cmd::AcceptLine)
    }
}

/// One-line description of a voice event.
pub fn describe_voice_event(event: &VoiceEvent) -> String {
    match event {
        VoiceEvent::Listening => format!("{} listening", "🎤".bright_magenta()),
        VoiceEvent::Transcript(text) => format!("   {}", text.italic()),
        VoiceEvent::Transcribing => "   transcribing...".dimmed().to_string(),
        VoiceEvent::Submitted(text) => format!("{} {}", "🎤 sent:".bright_magenta(), text),
        VoiceEvent::Stopped => "🎤 stopped".dimmed().to_string(),
        VoiceEvent::Notice(notice) => format!("{} {}", "!".bright_yellow(), notice.yellow()),
    }
}

// =============================================================================
// Loop
// =============================================================================

pub struct Repl {
    session: Arc<SessionController>,
    voice: VoiceCaptureBridge,
    dictated: mpsc::UnboundedReceiver<String>,
    chord: Chord,
    export_dir: PathBuf,
    /// Number of log entries already printed.
    shown: usize,
}

impl Repl {
    pub fn new(
        session: Arc<SessionController>,
        voice: VoiceCaptureBridge,
        dictated: mpsc::UnboundedReceiver<String>,
        chord: Chord,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            session,
            voice,
            dictated,
            chord,
            export_dir,
            shown: 0,
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", "cipherdesk".bright_blue().bold());
        println!(
            "{}",
            format!("Type /help for commands. {} toggles voice input.", self.chord).bright_black()
        );
        self.print_new();

        let chord_pressed = Arc::new(AtomicBool::new(false));
        let mut rl = DefaultEditor::new()?;
        rl.bind_sequence(
            chord_key_event(&self.chord),
            EventHandler::Conditional(Box::new(VoiceChordHandler {
                pressed: Arc::clone(&chord_pressed),
            })),
        );

        loop {
            let mode = self.session.mode()?;
            let line = match rl.readline(mode.prompt()) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{} {:?}", "Error:".bright_red(), err);
                    break;
                }
            };

            if chord_pressed.swap(false, Ordering::SeqCst) {
                if !line.trim().is_empty() {
                    self.session.input().set(line);
                }
                self.listen().await;
                continue;
            }

            if !line.trim().is_empty() {
                let _ = rl.add_history_entry(line.trim());
            }
            if !self.dispatch(parse_command(&line)).await {
                break;
            }
        }

        if self.voice.is_listening() {
            self.voice.stop().await;
        }
        println!("{}", "Goodbye!".bright_blue());
        Ok(())
    }

    /// Handle one command. Returns `false` to leave the loop.
    async fn dispatch(&mut self, command: Command) -> bool {
        match command {
            Command::Query(text) => self.submit(&text).await,
            Command::Mode(target) => {
                let result = match target {
                    Some(mode) => self.session.set_mode(mode).map(|_| mode),
                    None => self.session.toggle_mode(),
                };
                match result {
                    Ok(mode) => {
                        self.print_new();
                        println!("{} {}", "Mode:".bright_black(), mode.placeholder().bright_black());
                    }
                    Err(e) => self.print_error(&e),
                }
            }
            Command::Clear => match self.session.clear() {
                Ok(()) => {
                    self.shown = 0;
                    self.print_new();
                }
                Err(e) => self.print_error(&e),
            },
            Command::Voice => self.listen().await,
            Command::Page(action) => self.page(action),
            Command::Export => match self.session.export_latest(&self.export_dir) {
                Ok(path) => println!("{} {}", "Saved".bright_green(), path.display()),
                Err(ChatError::NothingToExport) => {
                    println!("{}", "Nothing to export.".yellow())
                }
                Err(e) => self.print_error(&e),
            },
            Command::Health => match self.session.health().await {
                Ok(health) => println!("{}", health.summary()),
                Err(e) => self.print_error(&e),
            },
            Command::Help => println!("{}", help_text()),
            Command::Quit => return false,
            Command::Unknown(text) => {
                println!("{} {}", "Unknown command:".yellow(), text);
            }
        }
        true
    }

    async fn submit(&mut self, text: &str) {
        if !text.trim().is_empty() {
            println!("{}", "Thinking...".bright_magenta());
        }
        match self.session.submit(text).await {
            Ok(SubmitOutcome::Ignored(reason)) => debug!(?reason, "Nothing submitted"),
            Ok(_) => {}
            Err(e) => self.print_error(&e),
        }
        self.print_new();
    }

    fn page(&mut self, action: PageAction) {
        let (id, changed) = match self.session.page_latest(action) {
            Ok(result) => result,
            Err(ChatError::NoTable) => {
                println!("{}", "There is no table to page.".yellow());
                return;
            }
            Err(e) => {
                self.print_error(&e);
                return;
            }
        };
        if !changed {
            println!("{}", "Already on that page.".dimmed());
            return;
        }
        match self.session.fragment(id) {
            Ok(fragment) => {
                if let Some(table) = fragment.tables.last() {
                    println!("{}", render_table(table, true));
                }
            }
            Err(e) => self.print_error(&e),
        }
    }

    /// Run one voice episode. Enter ends it.
    async fn listen(&mut self) {
        if self.voice.is_listening() {
            self.voice.stop().await;
            return;
        }
        if let Err(e) = self.voice.start().await {
            debug!(error = %e, "Voice capture did not start");
            return;
        }
        println!("{}", "Press Enter to stop listening.".bright_black());

        let mut enter = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| ())
        });

        let dictated = tokio::select! {
            dictated = self.dictated.recv() => Some(dictated),
            _ = &mut enter => None,
        };
        match dictated {
            Some(text) => {
                if let Some(text) = text {
                    self.submit(&text).await;
                }
                println!("{}", "Press Enter to continue.".bright_black());
                if let Err(e) = enter.await {
                    warn!(error = %e, "Reading stdin failed");
                }
            }
            None => self.voice.stop().await,
        }

        // Server-side transcription submits while stopping.
        while let Ok(text) = self.dictated.try_recv() {
            self.submit(&text).await;
        }
    }

    fn print_new(&mut self) {
        match self.session.fragments_since(self.shown) {
            Ok(fragments) => {
                for fragment in &fragments {
                    println!("\n{}\n", render_fragment(fragment));
                }
                self.shown += fragments.len();
            }
            Err(e) => self.print_error(&e),
        }
    }

    fn print_error(&self, err: &ChatError) {
        eprintln!("{} {}", "Error:".bright_red(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_query() {
        assert_eq!(
            parse_command("show me traders"),
            Command::Query("show me traders".into())
        );
        assert_eq!(parse_command(""), Command::Query(String::new()));
    }

    #[test]
    fn test_mode_commands() {
        assert_eq!(parse_command("/mode"), Command::Mode(None));
        assert_eq!(parse_command("/mode sql"), Command::Mode(Some(Mode::RawQuery)));
        assert_eq!(
            parse_command("/MODE Chat"),
            Command::Mode(Some(Mode::Conversational))
        );
        assert!(matches!(parse_command("/mode nope"), Command::Unknown(_)));
    }

    #[test]
    fn test_paging_commands() {
        assert_eq!(parse_command("/next"), Command::Page(PageAction::Next));
        assert_eq!(parse_command(" /last "), Command::Page(PageAction::Last));
        assert_eq!(parse_command("/page 3"), Command::Page(PageAction::Goto(3)));
        assert!(matches!(parse_command("/page x"), Command::Unknown(_)));
        assert!(matches!(parse_command("/page"), Command::Unknown(_)));
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(parse_command("/clear"), Command::Clear);
        assert_eq!(parse_command("/voice"), Command::Voice);
        assert_eq!(parse_command("/export"), Command::Export);
        assert_eq!(parse_command("/health"), Command::Health);
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert!(matches!(parse_command("/dance"), Command::Unknown(_)));
    }

    #[test]
    fn test_chord_key_events() {
        let alt_v: Chord = "Alt+V".parse().unwrap();
        assert_eq!(chord_key_event(&alt_v), KeyEvent::new('v', Modifiers::ALT));

        let f9: Chord = "F9".parse().unwrap();
        assert_eq!(chord_key_event(&f9), KeyEvent(KeyCode::F(9), Modifiers::NONE));
    }

    #[test]
    fn test_describe_notice() {
        colored::control::set_override(false);
        let line = describe_voice_event(&VoiceEvent::Notice("not supported".into()));
        assert_eq!(line, "! not supported");
    }
}
