use crate::{EngineError, Message, OperationStatus, ProgressEvent, Scope};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub scopes: Vec<ScopeView>,
    pub dirty: bool,
}

impl AppViewModel {
    pub fn scope(&self, scope: &Scope) -> Option<&ScopeView> {
        self.scopes.iter().find(|view| &view.scope == scope)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeView {
    pub scope: Scope,
    pub busy: bool,
    pub status: Option<OperationStatus>,
    pub progress: Option<ProgressEvent>,
    pub messages: Vec<Message>,
    pub last_error: Option<EngineError>,
}
