//! CLI output capture and cleanup

use regex::Regex;

pub const TRUNCATED_MARKER: &str = "[output truncated]";

/// Bytes kept past the output limit so the prompt can still be detected
const TAIL_WINDOW: usize = 512;

/// Accumulates raw channel data with a hard memory cap
#[derive(Debug)]
pub struct OutputBuffer {
    data: Vec<u8>,
    tail: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            tail: Vec::new(),
            limit,
            overflowed: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.data.len());
        if chunk.len() > room {
            self.overflowed = true;
        }
        self.data.extend_from_slice(&chunk[..chunk.len().min(room)]);

        self.tail.extend_from_slice(chunk);
        if self.tail.len() > TAIL_WINDOW {
            let excess = self.tail.len() - TAIL_WINDOW;
            self.tail.drain(..excess);
        }
    }

    /// Last line of the stream with escape sequences and `\r` removed
    pub fn last_line(&self) -> String {
        let text = strip_ansi_escapes::strip_str(String::from_utf8_lossy(&self.tail));
        let text = text.replace('\r', "");
        text.rsplit('\n').next().unwrap_or_default().to_string()
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.tail.clear();
        self.overflowed = false;
    }
}

/// Strip escapes and normalise line endings to `\n`
pub fn normalize(raw: &str) -> String {
    let stripped = strip_ansi_escapes::strip_str(raw);
    stripped.replace("\r\n", "\n").replace('\r', "")
}

/// Turn a raw shell transcript into the command's output
///
/// Removes the echoed command line and the trailing prompt, then caps the
/// result at `max_bytes`.
pub fn clean_shell_output(
    raw: &str,
    command: &str,
    prompt: &Regex,
    max_bytes: usize,
    overflowed: bool,
) -> String {
    let text = normalize(raw);
    let mut lines: Vec<&str> = text.split('\n').collect();

    let command = command.trim();
    if let Some(pos) = lines.iter().position(|l| !l.trim().is_empty()) {
        if !command.is_empty() && lines[pos].trim_end().ends_with(command) {
            lines.drain(..=pos);
        }
    }

    if !overflowed {
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        if lines.last().is_some_and(|l| prompt.is_match(l.trim_end())) {
            lines.pop();
        }
    }

    let body = lines.join("\n");
    cap(body.trim_end().to_string(), max_bytes, overflowed)
}

/// Clean exec-channel output (no echo and no prompt)
pub fn clean_exec_output(raw: &str, max_bytes: usize, overflowed: bool) -> String {
    let text = normalize(raw);
    cap(text.trim_end().to_string(), max_bytes, overflowed)
}

fn cap(mut text: String, max_bytes: usize, overflowed: bool) -> String {
    let mut truncated = overflowed;
    if text.len() > max_bytes {
        let mut cut = max_bytes;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        truncated = true;
    }
    if truncated {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(TRUNCATED_MARKER);
    }
    text
}
