//! Line-oriented front end: stdin commands in, timeline changes out.

use std::collections::BTreeMap;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use courier_core::{AppViewModel, EngineError, Message, MessageId, Scope};

pub const HELP: &str = "\
commands:
  <text>           submit to the current scope
  /cancel          cancel the running operation
  /clear           clear the current scope
  /scope <name>    switch scope (chat, documentQA, parser, ...)
  /open, /close    subscribe / unsubscribe the current scope
  /save <file>     save answered questions of the current scope
  /restore <file>  load saved questions into the current scope
  /help, /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Submit(String),
    Cancel,
    Clear,
    Open,
    Close,
    SwitchScope(String),
    Save(PathBuf),
    Restore(PathBuf),
    Help,
    Quit,
    Unknown(String),
}

/// `None` for blank lines.
pub fn parse_line(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(ConsoleCommand::Submit(line.to_string()));
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    let parsed = match (name, arg) {
        ("cancel", "") => ConsoleCommand::Cancel,
        ("clear", "") => ConsoleCommand::Clear,
        ("open", "") => ConsoleCommand::Open,
        ("close", "") => ConsoleCommand::Close,
        ("help", "") => ConsoleCommand::Help,
        ("quit" | "exit", "") => ConsoleCommand::Quit,
        ("scope", scope) if !scope.is_empty() => ConsoleCommand::SwitchScope(scope.to_string()),
        ("save", path) if !path.is_empty() => ConsoleCommand::Save(PathBuf::from(path)),
        ("restore", path) if !path.is_empty() => ConsoleCommand::Restore(PathBuf::from(path)),
        _ => ConsoleCommand::Unknown(line.to_string()),
    };
    Some(parsed)
}

/// Reads stdin on its own thread. End of input sends [`ConsoleCommand::Quit`].
pub fn spawn_reader(tx: mpsc::Sender<ConsoleCommand>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = parse_line(&line) {
                if tx.send(command).is_err() {
                    return;
                }
            }
        }
        let _ = tx.send(ConsoleCommand::Quit);
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Shown {
    content: String,
    role: &'static str,
    is_loading: bool,
}

/// Remembers what was printed so each render only reports changes.
#[derive(Debug, Default)]
pub struct Printer {
    messages: BTreeMap<MessageId, Shown>,
    counts: BTreeMap<Scope, usize>,
    progress: BTreeMap<Scope, u8>,
    errors: BTreeMap<Scope, EngineError>,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &AppViewModel) -> Vec<String> {
        let mut lines = Vec::new();
        for scope_view in &view.scopes {
            let scope = &scope_view.scope;
            let previous = self.counts.insert(scope.clone(), scope_view.messages.len());
            if scope_view.messages.is_empty() && previous.unwrap_or(0) > 0 {
                lines.push(format!("[{scope}] cleared"));
            }

            for message in &scope_view.messages {
                let shown = Shown {
                    content: message.content.clone(),
                    role: message.role.as_str(),
                    is_loading: message.is_loading,
                };
                if self.messages.get(&message.id) != Some(&shown) {
                    lines.push(format_message(scope, message));
                    self.messages.insert(message.id, shown);
                }
            }

            match &scope_view.progress {
                Some(progress) if self.progress.get(scope) != Some(&progress.progress) => {
                    lines.push(format!(
                        "[{scope}] {}% {}",
                        progress.progress, progress.message
                    ));
                    self.progress.insert(scope.clone(), progress.progress);
                }
                Some(_) => {}
                None => {
                    self.progress.remove(scope);
                }
            }

            match &scope_view.last_error {
                Some(error) if self.errors.get(scope) != Some(error) => {
                    lines.push(format!("[{scope}] {error}"));
                    self.errors.insert(scope.clone(), error.clone());
                }
                Some(_) => {}
                None => {
                    self.errors.remove(scope);
                }
            }
        }
        lines
    }
}

fn format_message(scope: &Scope, message: &Message) -> String {
    let mut line = format!("[{scope}] {}: {}", message.role.as_str(), message.content);
    if message.is_loading {
        line.push_str(" ...");
    }
    if let Some(ms) = message.processing_time_ms {
        line.push_str(&format!(" ({ms} ms)"));
    }
    line
}
