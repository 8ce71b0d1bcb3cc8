//! Client configuration and the extension registration phase.
//!
//! Extensions (extra formats, extra flags, pre-dial hooks) are registered on
//! a [`ConfigBuilder`]. [`ConfigBuilder::build`] freezes them behind an
//! `Arc`, so every [`Config`] clone shares the same read-only registries
//! and calls running concurrently never contend on them.

use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgMatches, Command};
use grpcli_codec::{Decoder, Encoder, FormatRegistry};
use grpcli_transport::{DialOptions, TlsSettings};

use crate::{BoxError, CallContext};

pub const DEFAULT_SERVER_ADDR: &str = "localhost:8080";
pub const DEFAULT_FORMAT: &str = "json";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Adds extension flags to the client's command.
pub type FlagBinder = Arc<dyn Fn(Command) -> Command + Send + Sync>;

/// Runs after credentials are resolved and before the dial.
///
/// A hook may add metadata to the context and append dial options. The
/// first hook to fail aborts the call before any connection is attempted.
pub type PreDialer =
    Arc<dyn Fn(&Config, &mut CallContext, &mut DialOptions) -> Result<(), BoxError> + Send + Sync>;

#[derive(Default)]
struct Extensions {
    formats: FormatRegistry,
    flag_binders: Vec<FlagBinder>,
    pre_dialers: Vec<PreDialer>,
}

/// Everything a [`round_trip`](crate::round_trip) needs to know.
///
/// The public fields are the values a user controls through flags. Cloning
/// is cheap: the extension registries are shared.
#[derive(Clone)]
pub struct Config {
    /// `host:port` of the server.
    pub server_addr: String,
    /// Where the request body comes from; `-` means standard input.
    pub request_file: Option<PathBuf>,
    /// Input format name; empty means "no request body".
    pub request_format: String,
    /// Output format name; empty means "discard the response".
    pub response_format: String,
    /// Dial timeout; zero means no timeout.
    pub timeout: Duration,
    /// Whether flags fall back to environment variables.
    pub use_env_vars: bool,
    /// Prefix for those environment variables, e.g. `GREETER_`.
    pub env_var_prefix: String,

    pub tls: bool,
    pub server_name: Option<String>,
    pub insecure_skip_verify: bool,
    pub ca_cert_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,

    extensions: Arc<Extensions>,
    matches: Option<ArgMatches>,
}

impl Config {
    /// Starts the registration phase from the default configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Applies a functional option to this configuration.
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// let config = grpcli::Config::default().with(|c| c.timeout = Duration::from_secs(3));
    /// assert_eq!(config.timeout, Duration::from_secs(3));
    /// ```
    pub fn with(mut self, option: impl FnOnce(&mut Self)) -> Self {
        option(&mut self);
        self
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.extensions.formats
    }

    /// Registered input format names, for help text.
    pub fn decoder_formats(&self) -> Vec<&str> {
        self.extensions.formats.decoder_formats()
    }

    /// Registered output format names, for help text.
    pub fn encoder_formats(&self) -> Vec<&str> {
        self.extensions.formats.encoder_formats()
    }

    /// Parsed command-line values, once [`apply_flags`](Self::apply_flags)
    /// has run. Extensions read their own flags from here.
    pub fn flag_matches(&self) -> Option<&ArgMatches> {
        self.matches.as_ref()
    }

    /// The TLS parameters for a dial, derived from the current fields.
    pub fn tls_settings(&self) -> TlsSettings {
        TlsSettings {
            enabled: self.tls,
            insecure_skip_verify: self.insecure_skip_verify,
            server_name: self.server_name.clone(),
            ca_cert_file: self.ca_cert_file.clone(),
            cert_file: self.cert_file.clone(),
            key_file: self.key_file.clone(),
        }
    }

    pub(crate) fn flag_binders(&self) -> &[FlagBinder] {
        &self.extensions.flag_binders
    }

    pub(crate) fn pre_dialers(&self) -> &[PreDialer] {
        &self.extensions.pre_dialers
    }

    pub(crate) fn set_matches(&mut self, matches: ArgMatches) {
        self.matches = Some(matches);
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::new().build()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_addr", &self.server_addr)
            .field("request_file", &self.request_file)
            .field("request_format", &self.request_format)
            .field("response_format", &self.response_format)
            .field("timeout", &self.timeout)
            .field("tls", &self.tls)
            .field("server_name", &self.server_name)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("formats", &self.extensions.formats)
            .field("flag_binders", &self.extensions.flag_binders.len())
            .field("pre_dialers", &self.extensions.pre_dialers.len())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Config`]: the registration phase.
///
/// # Example
///
/// ```rust
/// use grpcli::{Config, NoOp};
///
/// let config = Config::builder()
///     .server_addr("greeter.internal:50051")
///     .output_encoder("silent", |_| NoOp)
///     .pre_dialer(|_config, ctx, _options| {
///         ctx.metadata_mut().insert("x-client", "greeter-cli".parse()?);
///         Ok(())
///     })
///     .build();
/// assert!(config.encoder_formats().contains(&"silent"));
/// ```
pub struct ConfigBuilder {
    server_addr: String,
    request_file: Option<PathBuf>,
    request_format: String,
    response_format: String,
    timeout: Duration,
    use_env_vars: bool,
    env_var_prefix: String,
    tls: bool,
    server_name: Option<String>,
    insecure_skip_verify: bool,
    ca_cert_file: Option<PathBuf>,
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
    extensions: Extensions,
}

impl ConfigBuilder {
    /// Creates a builder with the default settings and built-in formats.
    pub fn new() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            request_file: None,
            request_format: DEFAULT_FORMAT.to_string(),
            response_format: DEFAULT_FORMAT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            use_env_vars: true,
            env_var_prefix: String::new(),
            tls: false,
            server_name: None,
            insecure_skip_verify: false,
            ca_cert_file: None,
            cert_file: None,
            key_file: None,
            extensions: Extensions::default(),
        }
    }

    pub fn server_addr(mut self, addr: &str) -> Self {
        self.server_addr = addr.to_string();
        self
    }

    pub fn request_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.request_file = Some(path.into());
        self
    }

    pub fn request_format(mut self, format: &str) -> Self {
        self.request_format = format.to_string();
        self
    }

    pub fn response_format(mut self, format: &str) -> Self {
        self.response_format = format.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn use_env_vars(mut self, enabled: bool) -> Self {
        self.use_env_vars = enabled;
        self
    }

    pub fn env_var_prefix(mut self, prefix: &str) -> Self {
        self.env_var_prefix = prefix.to_string();
        self
    }

    pub fn tls(mut self, enabled: bool) -> Self {
        self.tls = enabled;
        self
    }

    pub fn server_name(mut self, name: &str) -> Self {
        self.server_name = Some(name.to_string());
        self
    }

    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    pub fn ca_cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_file = Some(path.into());
        self
    }

    pub fn cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_file = Some(path.into());
        self
    }

    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    /// Registers a callback that adds extension flags.
    pub fn flag_binder<F>(mut self, binder: F) -> Self
    where
        F: Fn(Command) -> Command + Send + Sync + 'static,
    {
        self.extensions.flag_binders.push(Arc::new(binder));
        self
    }

    /// Registers a hook run before every dial, after those already
    /// registered.
    pub fn pre_dialer<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Config, &mut CallContext, &mut DialOptions) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.extensions.pre_dialers.push(Arc::new(hook));
        self
    }

    /// Adds (or replaces) an input format.
    pub fn input_decoder<F, D>(mut self, format: &str, make: F) -> Self
    where
        F: Fn(Box<dyn Read + Send>) -> D + Send + Sync + 'static,
        D: Decoder + 'static,
    {
        self.extensions.formats.register_decoder(format, make);
        self
    }

    /// Adds (or replaces) an output format.
    pub fn output_encoder<F, E>(mut self, format: &str, make: F) -> Self
    where
        F: Fn(Box<dyn Write + Send>) -> E + Send + Sync + 'static,
        E: Encoder + 'static,
    {
        self.extensions.formats.register_encoder(format, make);
        self
    }

    /// Ends the registration phase.
    pub fn build(self) -> Config {
        Config {
            server_addr: self.server_addr,
            request_file: self.request_file,
            request_format: self.request_format,
            response_format: self.response_format,
            timeout: self.timeout,
            use_env_vars: self.use_env_vars,
            env_var_prefix: self.env_var_prefix,
            tls: self.tls,
            server_name: self.server_name,
            insecure_skip_verify: self.insecure_skip_verify,
            ca_cert_file: self.ca_cert_file,
            cert_file: self.cert_file,
            key_file: self.key_file,
            extensions: Arc::new(self.extensions),
            matches: None,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
