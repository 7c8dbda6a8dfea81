mod routes;
mod server;
mod session;
mod telemetry;

pub mod app;
pub mod config;
pub mod pipeline;

pub use app::start_app;
pub use server::{build_router, SharedState};
pub use session::{
    CloseReason, FrameQueue, InboundFrame, OverflowPolicy, PushOutcome, SessionState, StreamSession,
};
pub use telemetry::Metrics;
