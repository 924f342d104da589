pub mod infrastructure;

pub use infrastructure::{CliError, LogConfig, Result, TcpTransport};
