//! Device types and their drivers
//!
//! Device types are a closed set keyed by their inventory wire names. Each
//! type maps to a [`Driver`] once, when the session is opened; the driver
//! turns an authenticated SSH connection into a [`DeviceSession`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::error::SessionError;
use super::session::{DeviceSession, ExecSession, ShellSession};
use crate::ssh::HandleController;

/// Supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    CiscoIos,
    CiscoXe,
    CiscoNxos,
    CiscoXr,
    AristaEos,
    JuniperJunos,
    Linux,
}

impl DeviceType {
    pub const ALL: [DeviceType; 7] = [
        DeviceType::CiscoIos,
        DeviceType::CiscoXe,
        DeviceType::CiscoNxos,
        DeviceType::CiscoXr,
        DeviceType::AristaEos,
        DeviceType::JuniperJunos,
        DeviceType::Linux,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::CiscoIos => "cisco_ios",
            DeviceType::CiscoXe => "cisco_xe",
            DeviceType::CiscoNxos => "cisco_nxos",
            DeviceType::CiscoXr => "cisco_xr",
            DeviceType::AristaEos => "arista_eos",
            DeviceType::JuniperJunos => "juniper_junos",
            DeviceType::Linux => "linux",
        }
    }

    pub fn driver(&self) -> &'static dyn Driver {
        match self {
            DeviceType::CiscoIos | DeviceType::CiscoXe => &*CISCO_IOS,
            DeviceType::CiscoNxos => &*CISCO_NXOS,
            DeviceType::CiscoXr => &*CISCO_XR,
            DeviceType::AristaEos => &*ARISTA_EOS,
            DeviceType::JuniperJunos => &*JUNIPER_JUNOS,
            DeviceType::Linux => &LINUX,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        DeviceType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| SessionError::UnsupportedDeviceType(s.trim().to_string()))
    }
}

/// Per-session inputs a driver needs besides the connection
#[derive(Debug, Clone)]
pub struct DriverContext {
    pub device: String,
    /// Enable secret from the credential profile
    pub secret: Option<String>,
    pub max_output_bytes: usize,
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prepare the connection for commands
    async fn start(
        &self,
        controller: HandleController,
        ctx: &DriverContext,
    ) -> Result<Box<dyn DeviceSession>, SessionError>;
}

/// Interactive CLI dialect
#[derive(Debug)]
pub struct CliDialect {
    pub name: &'static str,
    pub prompt: Regex,
    /// Sent once after login to disable paging and line wrapping
    pub setup_commands: &'static [&'static str],
    /// Privileged mode is entered with `enable` when a secret is configured
    pub supports_enable: bool,
}

impl CliDialect {
    fn new(
        name: &'static str,
        setup_commands: &'static [&'static str],
        supports_enable: bool,
    ) -> Self {
        Self {
            name,
            prompt: cli_prompt(),
            setup_commands,
            supports_enable,
        }
    }

    /// Unprivileged prompts end in `>`
    pub fn is_privileged(&self, prompt_line: &str) -> bool {
        prompt_line.trim_end().ends_with('#')
    }
}

fn cli_prompt() -> Regex {
    // hostname, user@host, RP/0/RSP0/CPU0:host, host(config-if) followed by > or #
    Regex::new(r"^[\w.\-@/:()\[\]~+]{1,128}[>#]\s?$").expect("built-in prompt pattern is valid")
}

static CISCO_IOS: LazyLock<CliDriver> = LazyLock::new(|| {
    CliDriver(CliDialect::new(
        "cisco_ios",
        &["terminal length 0", "terminal width 511"],
        true,
    ))
});

static CISCO_NXOS: LazyLock<CliDriver> = LazyLock::new(|| {
    CliDriver(CliDialect::new(
        "cisco_nxos",
        &["terminal length 0", "terminal width 511"],
        false,
    ))
});

static CISCO_XR: LazyLock<CliDriver> = LazyLock::new(|| {
    CliDriver(CliDialect::new(
        "cisco_xr",
        &["terminal length 0", "terminal width 512"],
        false,
    ))
});

static ARISTA_EOS: LazyLock<CliDriver> = LazyLock::new(|| {
    CliDriver(CliDialect::new(
        "arista_eos",
        &["terminal length 0", "terminal width 32767"],
        true,
    ))
});

static JUNIPER_JUNOS: LazyLock<CliDriver> = LazyLock::new(|| {
    CliDriver(CliDialect::new(
        "juniper_junos",
        &["set cli screen-length 0", "set cli screen-width 0"],
        false,
    ))
});

static LINUX: ExecDriver = ExecDriver;

/// Drives an interactive shell with prompt detection
pub struct CliDriver(pub CliDialect);

#[async_trait]
impl Driver for CliDriver {
    fn name(&self) -> &'static str {
        self.0.name
    }

    async fn start(
        &self,
        controller: HandleController,
        ctx: &DriverContext,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        let session = ShellSession::start(controller, &self.0, ctx).await?;
        Ok(Box::new(session))
    }
}

/// One exec channel per command
pub struct ExecDriver;

#[async_trait]
impl Driver for ExecDriver {
    fn name(&self) -> &'static str {
        "linux"
    }

    async fn start(
        &self,
        controller: HandleController,
        ctx: &DriverContext,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        Ok(Box::new(ExecSession::new(controller, ctx)))
    }
}
