//! Command-line flags for the core configuration fields.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::Config;

const SERVER_ADDR: &str = "server-addr";
const REQUEST_FILE: &str = "request-file";
const REQUEST_FORMAT: &str = "request-format";
const RESPONSE_FORMAT: &str = "response-format";
const TIMEOUT: &str = "timeout";
const TLS: &str = "tls";
const TLS_SERVER_NAME: &str = "tls-server-name";
const TLS_INSECURE_SKIP_VERIFY: &str = "tls-insecure-skip-verify";
const TLS_CA_CERT_FILE: &str = "tls-ca-cert-file";
const TLS_CERT_FILE: &str = "tls-cert-file";
const TLS_KEY_FILE: &str = "tls-key-file";

impl Config {
    /// Adds the core flags, then every registered extension flag, to `cmd`.
    ///
    /// Defaults are taken from this configuration. With
    /// [`use_env_vars`](Config::use_env_vars) set, each core flag falls back
    /// to `{env_var_prefix}{FLAG_NAME}` (e.g. `GREETER_SERVER_ADDR`).
    pub fn bind_flags(&self, cmd: Command) -> Command {
        let cmd = cmd
            .arg(
                self.string_arg(SERVER_ADDR, Some(&self.server_addr))
                    .short('s')
                    .help("server address in the form host:port"),
            )
            .arg(
                self.string_arg(REQUEST_FILE, self.request_file.as_deref().map(path_str).as_deref())
                    .short('f')
                    .help("client request file; use \"-\" for stdin"),
            )
            .arg(
                self.string_arg(REQUEST_FORMAT, Some(&self.request_format))
                    .short('i')
                    .help(format!("request format ({})", self.decoder_formats().join(", "))),
            )
            .arg(
                self.string_arg(RESPONSE_FORMAT, Some(&self.response_format))
                    .short('o')
                    .help(format!("response format ({})", self.encoder_formats().join(", "))),
            )
            .arg(
                self.with_env(Arg::new(TIMEOUT))
                    .long(TIMEOUT)
                    .value_name("DURATION")
                    .value_parser(humantime::parse_duration)
                    .default_value(humantime::format_duration(self.timeout).to_string())
                    .help("client connection timeout"),
            )
            .arg(self.bool_arg(TLS, self.tls).help("enable TLS"))
            .arg(
                self.string_arg(TLS_SERVER_NAME, self.server_name.as_deref())
                    .help("TLS server name override"),
            )
            .arg(
                self.bool_arg(TLS_INSECURE_SKIP_VERIFY, self.insecure_skip_verify)
                    .help("INSECURE: skip TLS checks"),
            )
            .arg(
                self.string_arg(TLS_CA_CERT_FILE, self.ca_cert_file.as_deref().map(path_str).as_deref())
                    .help("CA certificate file"),
            )
            .arg(
                self.string_arg(TLS_CERT_FILE, self.cert_file.as_deref().map(path_str).as_deref())
                    .help("client certificate file"),
            )
            .arg(
                self.string_arg(TLS_KEY_FILE, self.key_file.as_deref().map(path_str).as_deref())
                    .help("client key file"),
            );

        self.flag_binders().iter().fold(cmd, |cmd, bind| bind(cmd))
    }

    /// Copies parsed flag values into this configuration.
    ///
    /// Empty path and server-name values mean "unset". The matches are kept
    /// so extensions can read their own flags via
    /// [`flag_matches`](Config::flag_matches).
    pub fn apply_flags(&mut self, matches: &ArgMatches) {
        if let Some(addr) = string(matches, SERVER_ADDR) {
            self.server_addr = addr;
        }
        if let Some(file) = string(matches, REQUEST_FILE) {
            self.request_file = non_empty(file).map(PathBuf::from);
        }
        // An empty format is meaningful: no request body, or no output.
        if let Some(format) = string(matches, REQUEST_FORMAT) {
            self.request_format = format;
        }
        if let Some(format) = string(matches, RESPONSE_FORMAT) {
            self.response_format = format;
        }
        if let Ok(Some(timeout)) = matches.try_get_one::<Duration>(TIMEOUT) {
            self.timeout = *timeout;
        }
        if let Some(tls) = boolean(matches, TLS) {
            self.tls = tls;
        }
        if let Some(name) = string(matches, TLS_SERVER_NAME) {
            self.server_name = non_empty(name);
        }
        if let Some(skip) = boolean(matches, TLS_INSECURE_SKIP_VERIFY) {
            self.insecure_skip_verify = skip;
        }
        if let Some(path) = string(matches, TLS_CA_CERT_FILE) {
            self.ca_cert_file = non_empty(path).map(PathBuf::from);
        }
        if let Some(path) = string(matches, TLS_CERT_FILE) {
            self.cert_file = non_empty(path).map(PathBuf::from);
        }
        if let Some(path) = string(matches, TLS_KEY_FILE) {
            self.key_file = non_empty(path).map(PathBuf::from);
        }

        self.set_matches(matches.clone());
    }

    /// The environment variable a core flag falls back to.
    pub fn env_var_name(&self, flag: &str) -> String {
        format!("{}{}", self.env_var_prefix, flag.to_uppercase().replace('-', "_"))
    }

    fn with_env(&self, arg: Arg) -> Arg {
        if !self.use_env_vars {
            return arg;
        }
        let name = self.env_var_name(arg.get_id().as_str());
        arg.env(name)
    }

    fn string_arg(&self, id: &'static str, default: Option<&str>) -> Arg {
        let arg = self
            .with_env(Arg::new(id))
            .long(id)
            .action(ArgAction::Set);
        match default {
            Some(value) => arg.default_value(value.to_string()),
            None => arg,
        }
    }

    fn bool_arg(&self, id: &'static str, default: bool) -> Arg {
        self.with_env(Arg::new(id))
            .long(id)
            .action(ArgAction::Set)
            .num_args(0..=1)
            .require_equals(true)
            .default_value(default.to_string())
            .default_missing_value("true")
            .value_parser(BoolishValueParser::new())
    }
}

fn path_str(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.try_get_one::<String>(id).ok().flatten().cloned()
}

fn boolean(matches: &ArgMatches, id: &str) -> Option<bool> {
    matches.try_get_one::<bool>(id).ok().flatten().copied()
}
