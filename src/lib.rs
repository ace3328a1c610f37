pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod interceptor;
pub mod scope;
pub mod session;
pub mod storage;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use gate::{Decision, Route, RouteGate, RouteTable};
pub use interceptor::ScopeInterceptor;
pub use scope::{Scope, ScopeService};
pub use session::{SessionService, SessionSnapshot, User};
pub use storage::{FileStorage, MemoryStorage, Storage};
