mod config;
mod context;
mod controller;
mod dispatcher;
pub mod prober;
mod router;
pub mod runtime;
pub mod scheduler;

pub use config::SessionConfig;
pub use context::SessionContext;
pub use controller::{SessionController, SessionSnapshot};
pub use dispatcher::{DispatchedEvent, EventDispatcher};
pub use prober::{LivenessProber, PingProbe, ProbeHarvest, ProbeStatus};
pub use router::MessageRouter;
pub use runtime::{SessionCommand, SessionHandle, SessionRuntime};
pub use scheduler::{run_cycle, BroadcastScheduler};
