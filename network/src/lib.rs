pub mod cache;
pub mod config;
pub mod datagram;
pub mod error;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod session;

pub use cache::{CacheEntry, CacheManager};
pub use config::ClientConfig;
pub use datagram::{Datagram, RecvOutcome};
pub use error::{ClientError, ProtocolError, Result, TransportError};
pub use protocol::{OpCode, Operation, Request, Response, Status};
pub use receiver::MonitorSummary;
pub use sender::Transport;
pub use session::{Reply, Session, Source};
