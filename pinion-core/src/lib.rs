// ABOUTME: Platform-agnostic core for pinion front-ends.
// ABOUTME: Update polling, the sync/async bridge, session registry, and shared conversation logic.

pub mod bridge;
pub mod channel;
pub mod clock;
pub mod config;
pub mod conversation;
pub mod freshness;
pub mod poller;
pub mod session_registry;
pub mod text;

pub use bridge::{BridgeError, EventLoopBridge, LazyBridge};
pub use channel::{Attachment, ChannelEvent, ChannelHandler};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PollConfig;
pub use conversation::{Conversation, HandoffStatus, TurnOutcome};
pub use freshness::{FreshnessOracle, LiveUpdateOracle, ServerMarkerOracle};
pub use poller::UpdatePoller;
pub use session_registry::{SessionEntry, SessionRegistry};

// Re-export client types so front-ends depend on one crate
pub use pinion_client::{
    AgentVars, ChatMessage, ClientConfig, ClientError, ClientRegistry, ConversationClient, Role,
    SessionState,
};
