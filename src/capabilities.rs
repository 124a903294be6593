//! Connection-time configuration: what the caller asks for when it
//! connects, and what this client advertises in `initialize`.

use bitflags::bitflags;

/// `{name, version}` — used both for `Context::set_client_info` and for
/// the `ServerInfo` a server reports back in its `initialize` response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Server-reported `{name, version}`.
pub type ServerInfo = ClientInfo;

/// `$/setTrace` level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trace {
    #[default]
    Off,
    Messages,
    Verbose,
}

impl Trace {
    pub fn as_str(self) -> &'static str {
        match self {
            Trace::Off => "off",
            Trace::Messages => "messages",
            Trace::Verbose => "verbose",
        }
    }

    /// Parses the three accepted strings; anything else is a
    /// [`crate::Error::Config`] at the `set_trace_from_string` call site.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(Trace::Off),
            "messages" => Some(Trace::Messages),
            "verbose" => Some(Trace::Verbose),
            _ => None,
        }
    }
}

bitflags! {
    /// Bitwise-ORable debug flags: controls whether outgoing requests and
    /// incoming responses are logged for a session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DebugFlags: u8 {
        const NONE = 0;
        const PRINT_REQUESTS = 1 << 0;
        const PRINT_RESPONSES = 1 << 1;
    }
}

/// The capability bits this client is willing to advertise in
/// `initialize`. Every field defaults to `false` and is only emitted when
/// `true` — flat, rather than mirroring the LSP specification's full
/// capability tree, which this client has no need to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub hover: bool,
    pub document_symbol: bool,
    pub semantic_tokens: bool,
    pub workspace_configuration: bool,
    pub publish_diagnostics: bool,
}

/// Parameters for [`Context::connect`](crate::context::Context::connect).
#[derive(Debug, Clone, Default)]
pub struct ConnectParams {
    pub args: Vec<String>,
    pub root_uri: Option<String>,
    pub trace: Trace,
    pub seek_path_env: bool,
    pub capabilities: Capabilities,
    /// Seconds to wait for the `shutdown` response before forcing
    /// termination.
    pub shutdown_timeout_secs: u64,
}

impl ConnectParams {
    pub fn new() -> Self {
        Self {
            shutdown_timeout_secs: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_parses_known_strings_only() {
        assert_eq!(Trace::parse("off"), Some(Trace::Off));
        assert_eq!(Trace::parse("messages"), Some(Trace::Messages));
        assert_eq!(Trace::parse("verbose"), Some(Trace::Verbose));
        assert_eq!(Trace::parse("bogus"), None);
    }

    #[test]
    fn debug_flags_are_bitwise_orable() {
        let mask = DebugFlags::PRINT_REQUESTS | DebugFlags::PRINT_RESPONSES;
        assert!(mask.contains(DebugFlags::PRINT_REQUESTS));
        assert!(mask.contains(DebugFlags::PRINT_RESPONSES));
        assert!(!DebugFlags::NONE.contains(DebugFlags::PRINT_REQUESTS));
    }
}
