//! Courier core: pure correlation state machine.
//!
//! Turns fire-and-forget publish/subscribe traffic into request, progress,
//! response and cancel semantics for long-running backend jobs. Everything here
//! is synchronous and side-effect free; IO is requested through [`Effect`]s.
mod cancel;
mod effect;
mod error;
mod ids;
mod msg;
mod normalize;
mod operation;
mod progress;
mod scope;
mod state;
mod timeline;
mod update;
mod view_model;

pub use cancel::CANCELLED_NOTICE;
pub use effect::Effect;
pub use error::{DropReason, EngineError};
pub use ids::{MessageId, RequestId, RequestIdGenerator, Scope};
pub use msg::{HistoryEntry, Msg};
pub use normalize::{
    extract_request_id, normalize_progress, normalize_response, CanonicalResult, DEFAULT_FAILURE,
    INVALID_FORMAT, NO_CONTENT,
};
pub use operation::{Operation, OperationRegistry, OperationStatus, ScopeBusy, TerminalStatus};
pub use progress::{ProgressEvent, ProgressRelay};
pub use scope::ScopeProfile;
pub use state::AppState;
pub use timeline::{Message, MessageMeta, MessageTimeline, MessageUpdate, Placement, Role};
pub use update::update;
pub use view_model::{AppViewModel, ScopeView};
