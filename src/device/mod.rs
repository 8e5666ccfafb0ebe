//! Device module - sessions to network devices
//!
//! [`SessionBuilder`] resolves a device's credential, driver and route
//! (direct or through the gateway) and hands back a [`DeviceSession`].

mod builder;
mod driver;
mod error;
mod output;
mod session;

pub use builder::{SessionBuilder, SessionOpener};
pub use driver::{CliDialect, CliDriver, DeviceType, Driver, DriverContext, ExecDriver};
pub use error::SessionError;
pub use output::{clean_exec_output, clean_shell_output, OutputBuffer, TRUNCATED_MARKER};
pub use session::{DeviceSession, ExecSession, ShellSession};
