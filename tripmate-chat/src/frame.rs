//! STOMP 1.2 frames as carried in WebSocket text messages.

use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;
use tripmate_core::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    fn parse(line: &str) -> Option<Self> {
        Some(match line {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            _ => return None,
        })
    }

    /// CONNECT and CONNECTED headers are sent verbatim.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// One decoded WebSocket payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Heartbeat,
    Frame(Frame),
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json_body<T: Serialize + ?Sized>(mut self, value: &T) -> CoreResult<Self> {
        self.body = serde_json::to_string(value)?;
        Ok(self.header("content-type", "application/json"))
    }

    /// First value of a header; repeated headers keep the earliest.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str, heartbeat: (Duration, Duration)) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header(
                "heart-beat",
                format!("{},{}", heartbeat.0.as_millis(), heartbeat.1.as_millis()),
            )
    }

    pub fn send(destination: &str) -> Self {
        Frame::new(Command::Send).header("destination", destination)
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                let _ = write!(out, "{}:{}\n", escape_header(name), escape_header(value));
            } else {
                let _ = write!(out, "{}:{}\n", name, value);
            }
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            let _ = write!(out, "content-length:{}\n", self.body.len());
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

pub fn decode(payload: &str) -> CoreResult<Inbound> {
    let text = payload.trim_start_matches(['\r', '\n']);
    if text.is_empty() {
        return Ok(Inbound::Heartbeat);
    }

    let (head, rest) = split_head(text)?;
    let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
    let command_line = lines.next().unwrap_or_default();
    let command = Command::parse(command_line)
        .ok_or_else(|| CoreError::Protocol(format!("unknown STOMP command '{}'", command_line)))?;

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| CoreError::Protocol(format!("malformed header line '{}'", line)))?;
        if command.escapes_headers() {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| CoreError::Protocol(format!("bad content-length '{}'", v)))
        })
        .transpose()?;

    let body = match content_length {
        Some(len) => {
            if rest.len() <= len || !rest.is_char_boundary(len) || rest.as_bytes()[len] != 0 {
                return Err(CoreError::Protocol("frame shorter than content-length".to_string()));
            }
            &rest[..len]
        }
        None => {
            let end = rest
                .find('\0')
                .ok_or_else(|| CoreError::Protocol("frame is not NUL terminated".to_string()))?;
            &rest[..end]
        }
    };

    Ok(Inbound::Frame(Frame {
        command,
        headers,
        body: body.to_string(),
    }))
}

/// Splits at the blank line ending the headers.
fn split_head(text: &str) -> CoreResult<(&str, &str)> {
    let mut start = 0;
    while let Some(offset) = text[start..].find('\n') {
        let end = start + offset;
        let line = &text[start..end];
        if start > 0 && (line.is_empty() || line == "\r") {
            return Ok((&text[..start - 1], &text[end + 1..]));
        }
        start = end + 1;
    }
    Err(CoreError::Protocol("frame has no header terminator".to_string()))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> CoreResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(CoreError::Protocol(format!(
                    "undefined escape '\\{}' in header",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

/// Heart-beat periods agreed with the broker, zero meaning "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub outgoing: Duration,
    pub incoming: Duration,
}

impl Heartbeat {
    /// Combines what we offered with the broker's `heart-beat` header.
    pub fn negotiate(offered: (Duration, Duration), server: Option<&str>) -> Self {
        let (sx, sy) = server
            .and_then(|value| {
                let (x, y) = value.split_once(',')?;
                Some((x.trim().parse::<u64>().ok()?, y.trim().parse::<u64>().ok()?))
            })
            .unwrap_or((0, 0));
        let (cx, cy) = (offered.0.as_millis() as u64, offered.1.as_millis() as u64);

        let pick = |mine: u64, theirs: u64| {
            if mine == 0 || theirs == 0 {
                Duration::ZERO
            } else {
                Duration::from_millis(mine.max(theirs))
            }
        };
        Self {
            outgoing: pick(cx, sy),
            incoming: pick(cy, sx),
        }
    }
}
