pub mod action_record;
pub mod agent;
pub mod credential;
pub mod operation;
pub mod page_cache;
pub mod source;
pub mod tool_invocation;
pub mod turn;

pub use action_record::{ActionRecord, ActionStatus};
pub use agent::{Agent, AgentSourceLink, Permission};
pub use credential::Credential;
pub use operation::{Method, Operation, ParamLocation, ParamSpec, ParameterSchema, RiskLevel};
pub use page_cache::PageCache;
pub use source::{AuthConfig, AuthKind, Source, SourceKind};
pub use tool_invocation::{InvocationState, ToolInvocation};
pub use turn::Turn;
