//! Telnet option negotiation filter.
//!
//! The Dubbo console is plain text, but a server may still open with option
//! negotiation (RFC 854). The filter separates application bytes from
//! commands and refuses every option:
//!
//! | Received | Reply |
//! |----------|-------|
//! | `IAC DO x` / `IAC DONT x` | `IAC WONT x` |
//! | `IAC WILL x` / `IAC WONT x` | `IAC DONT x` |
//! | `IAC SB ... IAC SE` | none (dropped) |
//! | `IAC IAC` | literal `0xFF` data byte |
//! | any other `IAC x` | none (dropped) |
//!
//! State is carried between calls so a command split across two reads is
//! still recognised.

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Command,
    Option(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Output of one [`NegotiationFilter::feed`] call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Filtered {
    /// Application bytes with all commands removed.
    pub data: Vec<u8>,
    /// Bytes to send back to the server.
    pub replies: Vec<u8>,
}

/// Incremental telnet command stripper.
#[derive(Debug, Default)]
pub struct NegotiationFilter {
    state: State,
}

impl NegotiationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets any partially received command.
    pub fn reset(&mut self) {
        self.state = State::Data;
    }

    /// Processes the next chunk read from the server.
    pub fn feed(&mut self, input: &[u8]) -> Filtered {
        let mut out = Filtered {
            data: Vec::with_capacity(input.len()),
            replies: Vec::new(),
        };

        for &byte in input {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Command,
                (State::Data, b) => {
                    out.data.push(b);
                    State::Data
                }
                (State::Command, IAC) => {
                    out.data.push(IAC);
                    State::Data
                }
                (State::Command, cmd @ (DO | DONT | WILL | WONT)) => State::Option(cmd),
                (State::Command, SB) => State::Subnegotiation,
                (State::Command, _) => State::Data,
                (State::Option(cmd), option) => {
                    let refusal = if matches!(cmd, DO | DONT) { WONT } else { DONT };
                    out.replies.extend_from_slice(&[IAC, refusal, option]);
                    State::Data
                }
                (State::Subnegotiation, IAC) => State::SubnegotiationIac,
                (State::Subnegotiation, _) => State::Subnegotiation,
                (State::SubnegotiationIac, SE) => State::Data,
                (State::SubnegotiationIac, _) => State::Subnegotiation,
            };
        }
        out
    }
}

/// Doubles every `0xFF` so it is sent as data rather than a command.
pub fn escape(bytes: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    if !bytes.contains(&IAC) {
        return std::borrow::Cow::Borrowed(bytes);
    }
    let mut escaped = Vec::with_capacity(bytes.len() + 1);
    for &b in bytes {
        escaped.push(b);
        if b == IAC {
            escaped.push(IAC);
        }
    }
    std::borrow::Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ECHO: u8 = 1;
    const SUPPRESS_GO_AHEAD: u8 = 3;

    #[test]
    fn test_plain_text_passes_through() {
        let mut filter = NegotiationFilter::new();
        let out = filter.feed(b"dubbo>");
        assert_eq!(out.data, b"dubbo>");
        assert!(out.replies.is_empty());
    }

    #[test]
    fn test_do_and_will_are_refused() {
        let mut filter = NegotiationFilter::new();
        let out = filter.feed(&[IAC, DO, ECHO, b'a', IAC, WILL, SUPPRESS_GO_AHEAD, b'b']);
        assert_eq!(out.data, b"ab");
        assert_eq!(out.replies, [IAC, WONT, ECHO, IAC, DONT, SUPPRESS_GO_AHEAD]);
    }

    #[test]
    fn test_command_split_across_reads() {
        let mut filter = NegotiationFilter::new();
        let first = filter.feed(&[b'x', IAC]);
        let second = filter.feed(&[DO]);
        let third = filter.feed(&[ECHO, b'y']);
        assert_eq!(first.data, b"x");
        assert!(second.data.is_empty() && second.replies.is_empty());
        assert_eq!(third.data, b"y");
        assert_eq!(third.replies, [IAC, WONT, ECHO]);
    }

    #[test]
    fn test_subnegotiation_is_dropped() {
        let mut filter = NegotiationFilter::new();
        let out = filter.feed(&[b'a', IAC, SB, 24, 1, IAC, SE, b'b']);
        assert_eq!(out.data, b"ab");
        assert!(out.replies.is_empty());
    }

    #[test]
    fn test_escaped_iac_is_data() {
        let mut filter = NegotiationFilter::new();
        let out = filter.feed(&[b'a', IAC, IAC, b'b']);
        assert_eq!(out.data, [b'a', IAC, b'b']);
    }

    #[test]
    fn test_escape_doubles_iac() {
        assert_eq!(&*escape(b"plain"), b"plain");
        assert_eq!(&*escape(&[1, IAC, 2]), [1, IAC, IAC, 2]);
    }
}
