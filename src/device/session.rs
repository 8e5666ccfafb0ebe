//! Connected device sessions
//!
//! A session owns the device's handle controller. Dropping a session drops
//! the controller, which ends the handle owner task and closes the SSH
//! connection, so a session abandoned on timeout or cancellation never leaks.

use async_trait::async_trait;
use regex::Regex;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tracing::{debug, info, warn};

use super::driver::{CliDialect, DriverContext};
use super::error::SessionError;
use super::output::{clean_exec_output, clean_shell_output, OutputBuffer};
use crate::ssh::HandleController;

/// Raw reads are capped a little above the output limit
const READ_SLACK: usize = 64 * 1024;

const TERMINAL_COLS: u32 = 511;
const TERMINAL_ROWS: u32 = 24;

/// Capabilities of an open device session
#[async_trait]
pub trait DeviceSession: Send {
    /// Run one command and return its cleaned output
    async fn run_command(&mut self, command: &str) -> Result<String, SessionError>;

    /// Close the session cleanly
    async fn close(self: Box<Self>);
}

/// Interactive shell driven by prompt detection
pub struct ShellSession {
    device: String,
    controller: HandleController,
    channel: Channel<Msg>,
    prompt: Regex,
    max_output_bytes: usize,
}

enum Awaited {
    Prompt,
    Password,
}

static PASSWORD_PROMPT: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"(?i)password:\s*$").expect("built-in password pattern is valid")
});

impl ShellSession {
    pub async fn start(
        controller: HandleController,
        dialect: &CliDialect,
        ctx: &DriverContext,
    ) -> Result<Self, SessionError> {
        let channel = controller.open_session_channel().await?;
        channel
            .request_pty(false, "vt100", TERMINAL_COLS, TERMINAL_ROWS, 0, 0, &[])
            .await
            .map_err(|e| SessionError::Unreachable(format!("Failed to request PTY: {}", e)))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| SessionError::Unreachable(format!("Failed to request shell: {}", e)))?;

        let mut session = Self {
            device: ctx.device.clone(),
            controller,
            channel,
            prompt: dialect.prompt.clone(),
            max_output_bytes: ctx.max_output_bytes,
        };

        let mut buffer = OutputBuffer::new(session.read_limit());
        session.read_until(&mut buffer, false).await?;
        let mut prompt_line = buffer.last_line();
        debug!("{}: initial prompt {:?}", session.device, prompt_line.trim());

        if dialect.supports_enable && !dialect.is_privileged(&prompt_line) {
            if let Some(secret) = &ctx.secret {
                prompt_line = session.enable(secret).await?;
                if !dialect.is_privileged(&prompt_line) {
                    return Err(SessionError::AuthFailed(format!(
                        "{}: enable secret rejected",
                        session.device
                    )));
                }
                info!("{}: privileged mode entered", session.device);
            }
        }

        for command in dialect.setup_commands {
            session.run_command(command).await?;
        }

        Ok(session)
    }

    fn read_limit(&self) -> usize {
        self.max_output_bytes.saturating_add(READ_SLACK)
    }

    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let payload = format!("{}\n", line);
        self.channel
            .data(payload.as_bytes())
            .await
            .map_err(|e| SessionError::Command(format!("Failed to write to channel: {}", e)))
    }

    /// Read until the last line is a prompt (or a password prompt when allowed)
    async fn read_until(
        &mut self,
        buffer: &mut OutputBuffer,
        allow_password: bool,
    ) -> Result<Awaited, SessionError> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    buffer.push(&data);
                    let last = buffer.last_line();
                    if self.prompt.is_match(last.trim_end()) {
                        return Ok(Awaited::Prompt);
                    }
                    if allow_password && PASSWORD_PROMPT.is_match(&last) {
                        return Ok(Awaited::Password);
                    }
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => buffer.push(&data),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(SessionError::Command(format!(
                        "{}: shell closed by device",
                        self.device
                    )));
                }
                Some(_) => {}
            }
        }
    }

    /// Enter privileged mode; returns the resulting prompt line
    async fn enable(&mut self, secret: &str) -> Result<String, SessionError> {
        self.send_line("enable").await?;
        let mut buffer = OutputBuffer::new(self.read_limit());

        if let Awaited::Password = self.read_until(&mut buffer, true).await? {
            self.send_line(secret).await?;
            buffer.clear();
            if let Awaited::Password = self.read_until(&mut buffer, true).await? {
                return Err(SessionError::AuthFailed(format!(
                    "{}: enable secret rejected",
                    self.device
                )));
            }
        }

        Ok(buffer.last_line())
    }
}

#[async_trait]
impl DeviceSession for ShellSession {
    async fn run_command(&mut self, command: &str) -> Result<String, SessionError> {
        debug!("{}: sending {:?}", self.device, command);
        self.send_line(command).await?;

        let mut buffer = OutputBuffer::new(self.read_limit());
        self.read_until(&mut buffer, false).await?;

        Ok(clean_shell_output(
            &buffer.text(),
            command,
            &self.prompt,
            self.max_output_bytes,
            buffer.overflowed(),
        ))
    }

    async fn close(self: Box<Self>) {
        let _ = self.channel.data(&b"exit\n"[..]).await;
        if let Err(e) = self.channel.close().await {
            debug!("{}: ignoring channel close error: {}", self.device, e);
        }
        self.controller.disconnect().await;
    }
}

/// Runs each command on its own exec channel
pub struct ExecSession {
    device: String,
    controller: HandleController,
    max_output_bytes: usize,
}

impl ExecSession {
    pub fn new(controller: HandleController, ctx: &DriverContext) -> Self {
        Self {
            device: ctx.device.clone(),
            controller,
            max_output_bytes: ctx.max_output_bytes,
        }
    }
}

#[async_trait]
impl DeviceSession for ExecSession {
    async fn run_command(&mut self, command: &str) -> Result<String, SessionError> {
        let mut channel = self.controller.open_session_channel().await?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| SessionError::Command(format!("Failed to exec: {}", e)))?;

        let mut buffer = OutputBuffer::new(self.max_output_bytes.saturating_add(READ_SLACK));
        let mut exit_code = None;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => buffer.push(&data),
                // ext=1 is stderr
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => buffer.push(&data),
                Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        if let Some(code) = exit_code.filter(|c| *c != 0) {
            warn!("{}: {:?} exited with status {}", self.device, command, code);
        }

        Ok(clean_exec_output(
            &buffer.text(),
            self.max_output_bytes,
            buffer.overflowed(),
        ))
    }

    async fn close(self: Box<Self>) {
        self.controller.disconnect().await;
    }
}
