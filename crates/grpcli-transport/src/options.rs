//! Dial options: the ordered directives a connection attempt is built from.

use std::time::Duration;

use crate::Credentials;

/// One transport configuration directive.
#[derive(Debug, Clone)]
pub enum DialOption {
    /// Wait until the connection is established before returning from
    /// [`dial`](crate::dial). Without it the channel connects lazily.
    Block,
    /// Plaintext or TLS credentials.
    Credentials(Credentials),
    /// `user-agent` header sent with every call.
    UserAgent(String),
    /// Upper bound on establishing the TCP connection.
    ConnectTimeout(Duration),
    TcpNodelay(bool),
    /// Per-request timeout applied by the channel.
    RequestTimeout(Duration),
    Http2KeepAliveInterval(Duration),
    KeepAliveTimeout(Duration),
    InitialStreamWindowSize(u32),
}

/// An ordered set of [`DialOption`]s for a single connection attempt.
///
/// Options are applied in order, so a later directive of the same kind
/// overrides an earlier one. [`dial`](crate::dial) takes the set by value:
/// it is consumed exactly once.
#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    options: Vec<DialOption>,
}

impl DialOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, option: DialOption) {
        self.options.push(option);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DialOption> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Folds the directives into the settings `dial` acts on.
    pub(crate) fn resolve(self) -> ResolvedOptions {
        let mut resolved = ResolvedOptions::default();
        for option in self.options {
            match option {
                DialOption::Block => resolved.block = true,
                DialOption::Credentials(c) => resolved.credentials = c,
                DialOption::UserAgent(ua) => resolved.user_agent = Some(ua),
                DialOption::ConnectTimeout(d) => resolved.connect_timeout = Some(d),
                DialOption::TcpNodelay(on) => resolved.tcp_nodelay = on,
                DialOption::RequestTimeout(d) => resolved.request_timeout = Some(d),
                DialOption::Http2KeepAliveInterval(d) => resolved.keep_alive_interval = Some(d),
                DialOption::KeepAliveTimeout(d) => resolved.keep_alive_timeout = Some(d),
                DialOption::InitialStreamWindowSize(size) => resolved.stream_window = Some(size),
            }
        }
        resolved
    }
}

impl Extend<DialOption> for DialOptions {
    fn extend<I: IntoIterator<Item = DialOption>>(&mut self, iter: I) {
        self.options.extend(iter);
    }
}

impl FromIterator<DialOption> for DialOptions {
    fn from_iter<I: IntoIterator<Item = DialOption>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DialOptions {
    type Item = DialOption;
    type IntoIter = std::vec::IntoIter<DialOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.options.into_iter()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub(crate) block: bool,
    pub(crate) credentials: Credentials,
    pub(crate) user_agent: Option<String>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) tcp_nodelay: bool,
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) keep_alive_interval: Option<Duration>,
    pub(crate) keep_alive_timeout: Option<Duration>,
    pub(crate) stream_window: Option<u32>,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            block: false,
            credentials: Credentials::Insecure,
            user_agent: None,
            connect_timeout: None,
            tcp_nodelay: true,
            request_timeout: None,
            keep_alive_interval: None,
            keep_alive_timeout: None,
            stream_window: None,
        }
    }
}
