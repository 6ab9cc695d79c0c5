use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use courier_core::{update, AppState, Msg, Scope};
use courier_logging::{courier_error, courier_info, set_dispatch_seq};
use serde_json::Map;

use super::config::{self, AppConfig};
use super::console::{self, ConsoleCommand, Printer};
use super::effects::EffectRunner;
use super::history;
use super::logging;

/// How long the loop waits for console input before draining engine events.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn run_app() -> anyhow::Result<()> {
    let config_path = config::config_path(std::env::args());
    let config = config::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path:?}"))?;
    logging::initialize(&config.logging);
    courier_info!("Starting courier_app with {:?}", config);

    let runner = EffectRunner::new(&config.loopback).context("starting engine")?;
    let (console_tx, console_rx) = mpsc::channel();
    console::spawn_reader(console_tx);

    let mut app = App::new(&config, runner);
    println!("{}", console::HELP);
    app.dispatch(Msg::ScopeOpened(app.scope.clone()));

    loop {
        match console_rx.recv_timeout(POLL_INTERVAL) {
            Ok(ConsoleCommand::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => app.handle_command(command),
            Err(RecvTimeoutError::Timeout) => {}
        }
        app.drain_engine();
    }

    app.shutdown();
    courier_info!("courier_app exiting");
    Ok(())
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Owns the application state; every change goes through [`App::dispatch`].
struct App {
    state: AppState,
    runner: EffectRunner,
    printer: Printer,
    scope: Scope,
    open: Vec<Scope>,
    seq: u64,
}

impl App {
    fn new(config: &AppConfig, runner: EffectRunner) -> Self {
        let scope = Scope::new(config.default_scope.as_str());
        Self {
            state: AppState::with_id_epoch(now_ms()),
            runner,
            printer: Printer::new(),
            open: vec![scope.clone()],
            scope,
            seq: 0,
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        self.seq += 1;
        set_dispatch_seq(self.seq);

        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            for line in self.printer.render(&state.view()) {
                println!("{line}");
            }
        }
        self.state = state;
        self.runner.run(effects);
    }

    fn drain_engine(&mut self) {
        while let Some(msg) = self.runner.poll(now_ms()) {
            self.dispatch(msg);
        }
    }

    fn handle_command(&mut self, command: ConsoleCommand) {
        let scope = self.scope.clone();
        match command {
            ConsoleCommand::Submit(input) => self.dispatch(Msg::Submitted {
                scope,
                input,
                params: Map::new(),
                at_ms: now_ms(),
            }),
            ConsoleCommand::Cancel => self.dispatch(Msg::CancelClicked {
                scope,
                at_ms: now_ms(),
            }),
            ConsoleCommand::Clear => self.dispatch(Msg::ClearClicked(scope)),
            ConsoleCommand::Open => self.open_scope(scope),
            ConsoleCommand::Close => {
                self.open.retain(|open| open != &scope);
                self.dispatch(Msg::ScopeClosed {
                    scope,
                    at_ms: now_ms(),
                });
            }
            ConsoleCommand::SwitchScope(name) => {
                self.scope = Scope::new(name);
                println!("current scope: {}", self.scope);
                self.open_scope(self.scope.clone());
            }
            ConsoleCommand::Save(path) => {
                match history::save_history(&path, self.state.timeline().messages(&scope)) {
                    Ok(count) => println!("saved {count} exchange(s) to {}", path.display()),
                    Err(err) => {
                        courier_error!("Saving history failed: {}", err);
                        println!("save failed: {err}");
                    }
                }
            }
            ConsoleCommand::Restore(path) => match history::load_history(&path) {
                Ok(entries) => self.dispatch(Msg::HistoryRestored { scope, entries }),
                Err(err) => {
                    courier_error!("Restoring history failed: {}", err);
                    println!("restore failed: {err}");
                }
            },
            ConsoleCommand::Help => println!("{}", console::HELP),
            ConsoleCommand::Quit => {}
            ConsoleCommand::Unknown(line) => println!("unknown command: {line} (try /help)"),
        }
    }

    fn open_scope(&mut self, scope: Scope) {
        if !self.open.contains(&scope) {
            self.open.push(scope.clone());
        }
        self.dispatch(Msg::ScopeOpened(scope));
    }

    /// Closes every open scope, cancelling whatever is still running.
    fn shutdown(&mut self) {
        for scope in std::mem::take(&mut self.open) {
            self.dispatch(Msg::ScopeClosed {
                scope,
                at_ms: now_ms(),
            });
        }
        // Let the cancel acknowledgements reach the log.
        std::thread::sleep(POLL_INTERVAL);
        self.drain_engine();
    }
}
