//! Message types for the cmdns protocol
//!
//! Every frame line on the wire is a JSON object with a single key naming the
//! message kind, for example `{"prepare":{"total":3}}`. On the Rust side that
//! shape is a plain enum; the object-with-optional-keys encoding lives in the
//! private [`Envelope`] type that serde converts through.
//!
//! # Message Flow
//!
//! 1. Client sends `Prepare` (optionally naming a subset of checks) or `List`
//! 2. Server announces `Prepare { total }`, then one `Prepare { done: true }`
//!    per registered check
//! 3. Client sends `Check { all: true }` once every check is prepared
//! 4. Server streams `Progress`, `Complete`, `Network`, `Whois`, `Dns`, `Ua`
//!    and asks for client-side probes with `Lookup`
//! 5. Client answers each `Lookup` with the probe outcome
//! 6. Server finishes with `Rating`

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant of a [`Message`], mostly useful for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Check enumeration
    List,
    /// Check execution control
    Check,
    /// Preparation handshake
    Prepare,
    /// Per-check progress
    Progress,
    /// Per-check completion
    Complete,
    /// Final verdict
    Rating,
    /// Network observation
    Network,
    /// Whois observation
    Whois,
    /// Client-side lookup probe
    Lookup,
    /// Captured DNS exchange
    DnsRecord,
    /// Observed user agent
    UserAgent,
    /// No recognised key
    Unknown,
}

impl MessageKind {
    /// Wire key for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Check => "check",
            Self::Prepare => "prepare",
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Rating => "rating",
            Self::Network => "network",
            Self::Whois => "whois",
            Self::Lookup => "lookup",
            Self::DnsRecord => "dns",
            Self::UserAgent => "ua",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumerate the checks the server offers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListMsg {
    /// Available checks (server → client only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<serde_json::Value>,
}

/// Start check execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckMsg {
    /// Run every prepared check
    pub all: bool,
}

/// Preparation handshake
///
/// The server sends one `done == false` instance carrying `total`, then one
/// `done == true` instance per registered check with its metadata. The client
/// sends an empty instance, or one carrying `checks` to scope the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareMsg {
    /// Whether this instance registers a check
    #[serde(skip_serializing_if = "is_false")]
    pub done: bool,
    /// Number of checks that will be prepared; only a positive total counts
    #[serde(skip_serializing_if = "is_zero")]
    pub total: i64,

    /// Check id
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Check name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Check description
    #[serde(rename = "desc", skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Check category
    #[serde(rename = "cat", skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// Score weight of the check
    #[serde(skip_serializing_if = "is_zero")]
    pub score: i64,
    /// Whether the check is a meta check
    #[serde(skip_serializing_if = "is_false")]
    pub meta: bool,

    /// Requested check ids (client → server)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<String>,
}

/// Progress of a running check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressMsg {
    /// Check id the progress belongs to
    #[serde(rename = "for")]
    pub check: String,
    /// Current step
    pub at: i64,
    /// Failed steps so far
    #[serde(rename = "fail")]
    pub failure: i64,
    /// Successful steps so far
    #[serde(rename = "succ")]
    pub success: i64,
}

/// Completion of a check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompleteMsg {
    /// Check id
    pub id: String,
    /// Whether the check passed
    #[serde(rename = "succ")]
    pub success: bool,
    /// Optional human-readable detail
    #[serde(rename = "msg", skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Final verdict
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingMsg {
    /// Verdict text
    pub text: String,
    /// Verdict class
    pub class: String,
}

/// Network path observed by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkMsg {
    /// Source port
    pub port: u16,
    /// IP version
    #[serde(rename = "ipv")]
    pub ip_version: u8,
    /// Transport protocol
    #[serde(rename = "proto")]
    pub protocol: String,
    /// DNS message id
    #[serde(rename = "id")]
    pub dns_id: u16,
}

/// Resource record inside a captured DNS exchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrMsg {
    /// Owner name
    #[serde(rename = "n")]
    pub name: String,
    /// Record type
    #[serde(rename = "t")]
    pub rrtype: String,
    /// Record class
    #[serde(rename = "c")]
    pub class: String,
    /// Time to live
    #[serde(rename = "l", skip_serializing_if = "is_zero")]
    pub ttl: i64,
    /// Presentation-format rdata
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rdata: String,
}

/// DNS exchange captured by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsMsg {
    #[serde(rename = "cid")]
    pub check_id: String,
    #[serde(rename = "unts")]
    pub unix_nano: i64,
    #[serde(rename = "src")]
    pub source: String,
    #[serde(rename = "dst")]
    pub destination: String,
    pub port: u16,
    #[serde(rename = "proto")]
    pub protocol: String,
    #[serde(rename = "ipv")]
    pub ip_version: u8,

    #[serde(rename = "id")]
    pub dns_id: u16,
    #[serde(skip_serializing_if = "is_false")]
    pub qr: bool,
    #[serde(rename = "op", skip_serializing_if = "String::is_empty")]
    pub opcode: String,
    #[serde(skip_serializing_if = "is_false")]
    pub aa: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub tc: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub rd: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub ra: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub z: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub ad: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub cd: bool,
    #[serde(rename = "do", skip_serializing_if = "is_false")]
    pub dnssec_ok: bool,
    #[serde(rename = "rc", skip_serializing_if = "String::is_empty")]
    pub rcode: String,

    #[serde(rename = "q", skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<RrMsg>,
    #[serde(rename = "ans", skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<RrMsg>,
    #[serde(rename = "ns", skip_serializing_if = "Vec::is_empty")]
    pub authorities: Vec<RrMsg>,
    #[serde(rename = "add", skip_serializing_if = "Vec::is_empty")]
    pub additionals: Vec<RrMsg>,
}

/// Whois data for the client address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhoisMsg {
    /// Regional internet registry
    pub rir: String,
    /// Network name
    #[serde(rename = "nn")]
    pub netname: String,
    /// Address looked up
    pub ip: String,
}

/// Client-side lookup probe
///
/// Arrives from the server with `id` and `dn` set and goes back with the
/// outcome filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupMsg {
    /// Check id requesting the probe
    pub id: String,
    /// Domain name to probe
    pub dn: String,
    /// Whether the probe succeeded
    #[serde(rename = "ok")]
    pub success: bool,
    /// Probe failure text
    #[serde(rename = "err", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupMsg {
    /// Create a lookup request
    pub fn new(id: impl Into<String>, dn: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dn: dn.into(),
            ..Self::default()
        }
    }

    /// Record a successful probe
    pub fn succeed(&mut self) {
        self.success = true;
        self.error = None;
    }

    /// Record a failed probe
    pub fn fail(&mut self, error: impl Into<String>) {
        self.success = false;
        self.error = Some(error.into());
    }
}

/// User agent the server observed for the client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAgentMsg {
    /// User agent string
    pub text: String,
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Envelope", into = "Envelope")]
pub enum Message {
    /// Check enumeration request or answer
    List(ListMsg),
    /// Execution control
    Check(CheckMsg),
    /// Preparation handshake
    Prepare(PrepareMsg),
    /// Progress report
    Progress(ProgressMsg),
    /// Completion report
    Complete(CompleteMsg),
    /// Final verdict
    Rating(RatingMsg),
    /// Network observation
    Network(NetworkMsg),
    /// Whois observation
    Whois(WhoisMsg),
    /// Lookup probe request or response
    Lookup(LookupMsg),
    /// Captured DNS exchange
    DnsRecord(DnsMsg),
    /// Observed user agent
    UserAgent(UserAgentMsg),
    /// Object without a recognised key; carries no meaning
    Unknown,
}

impl Message {
    /// Ask the server to prepare checks, all of them when `checks` is empty
    pub fn prepare(checks: Vec<String>) -> Self {
        Message::Prepare(PrepareMsg {
            checks,
            ..PrepareMsg::default()
        })
    }

    /// Ask the server to enumerate its checks
    pub fn list_request() -> Self {
        Message::List(ListMsg::default())
    }

    /// Start every prepared check
    pub fn check_all() -> Self {
        Message::Check(CheckMsg { all: true })
    }

    /// Get the kind of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::List(_) => MessageKind::List,
            Message::Check(_) => MessageKind::Check,
            Message::Prepare(_) => MessageKind::Prepare,
            Message::Progress(_) => MessageKind::Progress,
            Message::Complete(_) => MessageKind::Complete,
            Message::Rating(_) => MessageKind::Rating,
            Message::Network(_) => MessageKind::Network,
            Message::Whois(_) => MessageKind::Whois,
            Message::Lookup(_) => MessageKind::Lookup,
            Message::DnsRecord(_) => MessageKind::DnsRecord,
            Message::UserAgent(_) => MessageKind::UserAgent,
            Message::Unknown => MessageKind::Unknown,
        }
    }
}

/// Wire shape: one optional key per message kind
#[derive(Debug, Default, Serialize, Deserialize)]
struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    list: Option<ListMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    check: Option<CheckMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prepare: Option<PrepareMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    progress: Option<ProgressMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    complete: Option<CompleteMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating: Option<RatingMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network: Option<NetworkMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    whois: Option<WhoisMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lookup: Option<LookupMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dns: Option<DnsMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ua: Option<UserAgentMsg>,
}

impl From<Envelope> for Message {
    // The first populated key wins.
    fn from(envelope: Envelope) -> Self {
        let Envelope {
            list,
            check,
            prepare,
            progress,
            complete,
            rating,
            network,
            whois,
            lookup,
            dns,
            ua,
        } = envelope;

        list.map(Message::List)
            .or_else(|| check.map(Message::Check))
            .or_else(|| prepare.map(Message::Prepare))
            .or_else(|| progress.map(Message::Progress))
            .or_else(|| complete.map(Message::Complete))
            .or_else(|| rating.map(Message::Rating))
            .or_else(|| network.map(Message::Network))
            .or_else(|| whois.map(Message::Whois))
            .or_else(|| lookup.map(Message::Lookup))
            .or_else(|| dns.map(Message::DnsRecord))
            .or_else(|| ua.map(Message::UserAgent))
            .unwrap_or(Message::Unknown)
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        let mut envelope = Envelope::default();
        match message {
            Message::List(m) => envelope.list = Some(m),
            Message::Check(m) => envelope.check = Some(m),
            Message::Prepare(m) => envelope.prepare = Some(m),
            Message::Progress(m) => envelope.progress = Some(m),
            Message::Complete(m) => envelope.complete = Some(m),
            Message::Rating(m) => envelope.rating = Some(m),
            Message::Network(m) => envelope.network = Some(m),
            Message::Whois(m) => envelope.whois = Some(m),
            Message::Lookup(m) => envelope.lookup = Some(m),
            Message::DnsRecord(m) => envelope.dns = Some(m),
            Message::UserAgent(m) => envelope.ua = Some(m),
            Message::Unknown => {}
        }
        envelope
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}
