pub mod server;
pub mod session;
pub mod writer;

pub use server::{CameraServer, ReceivedFrame, ServerConfig, ServerEvent};
pub use session::{DEFAULT_PORT, Session, SessionConfig, SessionEvent, SessionEvents, Submit};
pub use writer::FrameWriter;
