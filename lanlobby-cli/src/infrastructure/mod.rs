pub mod error;
pub mod observability;
pub mod tcp_transport;

pub use error::{CliError, Result};
pub use observability::LogConfig;
pub use tcp_transport::TcpTransport;
