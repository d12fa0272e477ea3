/// Server → client protocol lines.
///
/// Every line the hub writes is one of four shapes:
///   `GETIP` | `SUBMITNAME` | `NAMEACCEPTED <name>` | `MESSAGE <text>`
///
/// Lines are terminated by `\n` on the wire; [`ServerLine::to_wire`]
/// produces the content without the terminator.
use std::fmt;

/// A single line sent from the hub to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Asks the client to report its own address on the next line.
    GetIp,
    /// Asks the client for a display name. Repeated until one is accepted.
    SubmitName,
    /// The submitted name was registered.
    NameAccepted(String),
    /// Any chat, whisper, or system text.
    Message(String),
}

impl ServerLine {
    /// A `MESSAGE` line carrying arbitrary text.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    /// A `MESSAGE System: <body>` line.
    pub fn system(body: impl fmt::Display) -> Self {
        Self::Message(format!("System: {body}"))
    }

    /// Serialize to the wire format (without trailing `\n`).
    pub fn to_wire(&self) -> String {
        match self {
            Self::GetIp => "GETIP".into(),
            Self::SubmitName => "SUBMITNAME".into(),
            Self::NameAccepted(name) => format!("NAMEACCEPTED {name}"),
            Self::Message(text) => format!("MESSAGE {text}"),
        }
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}
