use crate::error::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A user gesture from the terminal host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    ScrollUp,
    ScrollDown,
    TapSurface,
    ToggleMute,
    Like,
    Share,
    /// Pointer enters or leaves the active item
    ToggleHover,
    Screenshot,
    TogglePerson,
    Quit,
}

/// Key bindings shared by both run modes; the runtime ignores commands its mode has no use for
pub fn map_key(code: KeyCode) -> Option<HostCommand> {
    match code {
        KeyCode::Up | KeyCode::Char('k') => Some(HostCommand::ScrollUp),
        KeyCode::Down | KeyCode::Char('j') => Some(HostCommand::ScrollDown),
        KeyCode::Char(' ') | KeyCode::Enter => Some(HostCommand::TapSurface),
        KeyCode::Char('m') => Some(HostCommand::ToggleMute),
        KeyCode::Char('l') => Some(HostCommand::Like),
        KeyCode::Char('s') => Some(HostCommand::Share),
        KeyCode::Char('h') => Some(HostCommand::ToggleHover),
        KeyCode::Char('c') => Some(HostCommand::Screenshot),
        KeyCode::Char('p') => Some(HostCommand::TogglePerson),
        KeyCode::Char('q') | KeyCode::Esc => Some(HostCommand::Quit),
        _ => None,
    }
}

/// Reads raw key presses on a blocking thread and forwards them as host commands
pub struct KeyboardInputHandler {
    commands: mpsc::Sender<HostCommand>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(commands: mpsc::Sender<HostCommand>) -> Self {
        Self {
            commands,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input (arrows/j/k scroll, space play, m mute, l like, s share, c screenshot, p person, q quit)");

        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let key_event = match event::read() {
                            Ok(Event::Key(key_event)) if key_event.kind == KeyEventKind::Press => key_event,
                            Ok(_) => continue,
                            Err(e) => {
                                warn!("Failed to read keyboard event: {}", e);
                                continue;
                            }
                        };

                        let Some(command) = map_key(key_event.code) else {
                            debug!("Unbound key: {:?}", key_event.code);
                            continue;
                        };

                        debug!("Key {:?} -> {:?}", key_event.code, command);
                        if commands.blocking_send(command).is_err() {
                            debug!("Command receiver dropped, keyboard input exiting");
                            break;
                        }
                        if command == HostCommand::Quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        error!("Error polling for keyboard events: {}", e);
                        break;
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    /// Stop the input thread and restore the terminal
    pub async fn stop(&self) {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Let the blocking loop observe the token before forcing cooked mode back
        tokio::time::sleep(Duration::from_millis(200)).await;

        if let Err(e) = disable_raw_mode() {
            warn!("Failed to disable raw mode during stop: {}", e);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
