//! Saved conversation history for `/save` and `/restore`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use courier_core::{HistoryEntry, Message, Role};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("could not serialize history: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SavedExchange {
    question: String,
    response: String,
    at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
struct SavedHistory {
    exchanges: Vec<SavedExchange>,
}

pub fn load_history(path: &Path) -> Result<Vec<HistoryEntry>, HistoryError> {
    let content = fs::read_to_string(path).map_err(|source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let saved: SavedHistory = ron::from_str(&content).map_err(|source| HistoryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(saved
        .exchanges
        .into_iter()
        .map(|exchange| HistoryEntry {
            question: exchange.question,
            response: exchange.response,
            at_ms: exchange.at_ms,
        })
        .collect())
}

/// Writes the finished user/assistant pairs of `messages`, atomically.
/// Returns how many exchanges were saved.
pub fn save_history(path: &Path, messages: &[Message]) -> Result<usize, HistoryError> {
    let history = SavedHistory {
        exchanges: exchanges(messages),
    };
    let content = ron::ser::to_string_pretty(&history, ron::ser::PrettyConfig::new())?;

    let io_error = |source: io::Error| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_error)?;
    tmp.write_all(content.as_bytes()).map_err(io_error)?;
    tmp.flush().map_err(io_error)?;
    tmp.persist(path).map_err(|err| io_error(err.error))?;
    Ok(history.exchanges.len())
}

fn exchanges(messages: &[Message]) -> Vec<SavedExchange> {
    let mut out = Vec::new();
    let mut pending: Option<&Message> = None;
    for message in messages.iter().filter(|m| !m.is_loading) {
        match message.role {
            Role::User => pending = Some(message),
            Role::Assistant => {
                if let Some(question) = pending.take() {
                    out.push(SavedExchange {
                        question: question.content.clone(),
                        response: message.content.clone(),
                        at_ms: question.timestamp_ms,
                    });
                }
            }
            // Failed or cancelled answers are not worth restoring.
            Role::Error | Role::System => pending = None,
        }
    }
    out
}
