use std::fmt;

/// Logical partition key; each scope owns at most one in-flight operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(String);

impl Scope {
    pub const CHAT: &'static str = "chat";
    pub const DOCUMENT_QA: &'static str = "documentQA";
    pub const PARSER: &'static str = "parser";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn chat() -> Self {
        Self::new(Self::CHAT)
    }

    pub fn document_qa() -> Self {
        Self::new(Self::DOCUMENT_QA)
    }

    pub fn parser() -> Self {
        Self::new(Self::PARSER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlates a request with its progress and response events on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type MessageId = u64;

/// Mints `<scope>_req_<epoch>_<seq>` identifiers.
///
/// The epoch is fixed at construction (the app passes process start time) so
/// ids stay unique across restarts; `seq` makes them unique within a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdGenerator {
    epoch_ms: u64,
    next_seq: u64,
}

impl RequestIdGenerator {
    pub fn new(epoch_ms: u64) -> Self {
        Self {
            epoch_ms,
            next_seq: 1,
        }
    }

    pub fn mint(&mut self, scope: &Scope) -> RequestId {
        let seq = self.next_seq;
        self.next_seq += 1;
        RequestId(format!("{}_req_{}_{}", scope, self.epoch_ms, seq))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}
