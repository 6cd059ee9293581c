// Public modules
pub mod cancel;
pub mod client;
pub mod commands;
pub mod config;
pub mod demo;
pub mod error;
pub mod format;
pub mod observability;
pub mod render;
pub mod scroll;
pub mod session;
pub mod sse;

// Re-exports
pub use cancel::CancellationToken;
pub use client::{ByteStream, GenerationRequest, HttpBackend, OutgoingRequest, backend_for};
pub use config::{ChatArgs, Config, Environment};
pub use demo::CannedBackend;
pub use error::{Error, Result};
pub use format::{FormattedLine, FormattedText, ResponseAccumulator};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use scroll::{ScrollPolicy, ViewportState};
pub use session::{
    GenerationParams, Prompt, Session, SessionHandle, SessionState, StreamSessionController,
};
pub use sse::{Delta, FrameDecoder, FrameError, FrameErrorKind};
