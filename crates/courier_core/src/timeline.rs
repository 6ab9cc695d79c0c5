use std::collections::BTreeMap;

use crate::{MessageId, RequestId, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
    Error,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp_ms: u64,
    pub is_loading: bool,
    pub request_id: Option<RequestId>,
    pub processing_time_ms: Option<u64>,
}

/// Optional attributes for [`MessageTimeline::append`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageMeta {
    pub timestamp_ms: u64,
    pub is_loading: bool,
    pub request_id: Option<RequestId>,
    pub processing_time_ms: Option<u64>,
}

impl MessageMeta {
    pub fn at(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }

    pub fn placeholder(request_id: RequestId, timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            is_loading: true,
            request_id: Some(request_id),
            processing_time_ms: None,
        }
    }
}

/// Fields to merge into a placeholder. `None` leaves the field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageUpdate {
    pub role: Option<Role>,
    pub content: Option<String>,
    pub is_loading: Option<bool>,
    pub processing_time_ms: Option<u64>,
    pub timestamp_ms: Option<u64>,
}

impl MessageUpdate {
    /// Terminal assistant content.
    pub fn finished(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_loading: Some(false),
            ..Self::default()
        }
    }

    /// Terminal error-role content.
    pub fn failed(content: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Error),
            content: Some(content.into()),
            is_loading: Some(false),
            ..Self::default()
        }
    }

    pub fn with_processing_time(mut self, processing_time_ms: Option<u64>) -> Self {
        self.processing_time_ms = processing_time_ms;
        self
    }

    fn apply(self, message: &mut Message) {
        if let Some(role) = self.role {
            message.role = role;
        }
        if let Some(content) = self.content {
            message.content = content;
        }
        if let Some(is_loading) = self.is_loading {
            message.is_loading = is_loading;
        }
        if self.processing_time_ms.is_some() {
            message.processing_time_ms = self.processing_time_ms;
        }
        if let Some(timestamp_ms) = self.timestamp_ms {
            message.timestamp_ms = timestamp_ms;
        }
    }
}

/// Where [`MessageTimeline::replace_placeholder`] put the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The loading message tagged with the request id.
    Replaced(MessageId),
    /// Some other loading message in the scope (request id was lost).
    Fallback(MessageId),
    /// No loading message at all; a new terminal message was appended.
    Appended(MessageId),
}

/// Ordered conversation entries, partitioned by scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTimeline {
    next_id: MessageId,
    entries: BTreeMap<Scope, Vec<Message>>,
}

impl Default for MessageTimeline {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: BTreeMap::new(),
        }
    }
}

impl MessageTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        scope: &Scope,
        role: Role,
        content: impl Into<String>,
        meta: MessageMeta,
    ) -> MessageId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.entry(scope.clone()).or_default().push(Message {
            id,
            role,
            content: content.into(),
            timestamp_ms: meta.timestamp_ms,
            is_loading: meta.is_loading,
            request_id: meta.request_id,
            processing_time_ms: meta.processing_time_ms,
        });
        id
    }

    /// Finalizes the placeholder for `request_id`, falling back to any loading
    /// message in the scope, and finally to appending, so a result is never lost.
    pub fn replace_placeholder(
        &mut self,
        scope: &Scope,
        request_id: &RequestId,
        update: MessageUpdate,
        now_ms: u64,
    ) -> Placement {
        let messages = self.entries.entry(scope.clone()).or_default();

        let exact = messages
            .iter()
            .position(|m| m.is_loading && m.request_id.as_ref() == Some(request_id));
        if let Some(index) = exact {
            let message = &mut messages[index];
            update.apply(message);
            return Placement::Replaced(message.id);
        }

        if let Some(message) = messages.iter_mut().find(|m| m.is_loading) {
            message.request_id = Some(request_id.clone());
            update.apply(message);
            return Placement::Fallback(message.id);
        }

        let id = self.next_id;
        self.next_id += 1;
        messages.push(Message {
            id,
            role: update.role.unwrap_or(Role::Assistant),
            content: update.content.unwrap_or_default(),
            timestamp_ms: update.timestamp_ms.unwrap_or(now_ms),
            is_loading: false,
            request_id: Some(request_id.clone()),
            processing_time_ms: update.processing_time_ms,
        });
        Placement::Appended(id)
    }

    pub fn messages(&self, scope: &Scope) -> &[Message] {
        self.entries.get(scope).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get(&self, scope: &Scope, id: MessageId) -> Option<&Message> {
        self.messages(scope).iter().find(|m| m.id == id)
    }

    pub fn loading(&self, scope: &Scope) -> impl Iterator<Item = &Message> {
        self.messages(scope).iter().filter(|m| m.is_loading)
    }

    /// Empties the scope's timeline. Returns how many messages were removed.
    pub fn clear(&mut self, scope: &Scope) -> usize {
        self.entries.remove(scope).map_or(0, |messages| messages.len())
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.entries.keys()
    }
}
