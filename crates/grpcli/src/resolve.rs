//! Picking the request decoder and response encoder for a call.

use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use grpcli_codec::{Decoder, Encoder, FormatRegistry, NoOp};
use tracing::debug;

use crate::{ClientError, Config};

/// The standard streams a call reads its request from and writes its
/// response to.
pub struct Stdio {
    pub stdin: Box<dyn Read + Send>,
    /// Whether `stdin` is a character device (a terminal or `/dev/null`)
    /// rather than a pipe or file that carries a request.
    pub stdin_is_char_device: bool,
    pub stdout: Box<dyn Write + Send>,
}

impl Stdio {
    /// The process's own standard input and output.
    pub fn inherit() -> Self {
        let stdin = io::stdin();
        let stdin_is_char_device = is_char_device(&stdin);
        Self {
            stdin: Box::new(stdin),
            stdin_is_char_device,
            stdout: Box::new(io::stdout()),
        }
    }

    pub fn new(
        stdin: impl Read + Send + 'static,
        stdin_is_char_device: bool,
        stdout: impl Write + Send + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdin_is_char_device,
            stdout: Box::new(stdout),
        }
    }
}

/// Whether `stream` is a character device. A descriptor whose metadata
/// cannot be read carries nothing to decode, so it counts as one.
#[cfg(unix)]
pub(crate) fn is_char_device(stream: &impl std::os::fd::AsFd) -> bool {
    use std::os::unix::fs::FileTypeExt;

    stream
        .as_fd()
        .try_clone_to_owned()
        .map(std::fs::File::from)
        .and_then(|file| file.metadata())
        .map_or(true, |meta| meta.file_type().is_char_device())
}

#[cfg(not(unix))]
pub(crate) fn is_char_device(stream: &impl io::IsTerminal) -> bool {
    stream.is_terminal()
}

impl fmt::Debug for Stdio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stdio")
            .field("stdin_is_char_device", &self.stdin_is_char_device)
            .finish_non_exhaustive()
    }
}

/// Where a request body comes from. The first matching rule wins:
///
/// 1. standard input when it is not a character device, or when the
///    request file is `-`;
/// 2. the request file, decoded by the format named after its extension
///    when that format is registered;
/// 3. the request file, decoded by the configured request format;
/// 4. nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource<'a> {
    Stdin,
    FileByExtension { path: &'a Path, format: &'a str },
    File(&'a Path),
    Absent,
}

impl<'a> RequestSource<'a> {
    pub fn select(
        stdin_is_char_device: bool,
        request_file: Option<&'a Path>,
        formats: &FormatRegistry,
    ) -> Self {
        if !stdin_is_char_device || request_file == Some(Path::new("-")) {
            return RequestSource::Stdin;
        }
        let Some(path) = request_file else {
            return RequestSource::Absent;
        };
        match extension(path) {
            Some(format) if formats.decoder(format).is_some() => {
                RequestSource::FileByExtension { path, format }
            }
            _ => RequestSource::File(path),
        }
    }
}

/// Text after the last `.` of the file name. Unlike `Path::extension`, a
/// leading dot counts, so `.json` yields `json`.
fn extension(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

impl Config {
    /// Resolves the decoder for this call's request body.
    ///
    /// A request file is read whole and closed before this returns. An
    /// unknown request format is reported before the file is touched.
    pub fn make_decoder(
        &self,
        stdin: Box<dyn Read + Send>,
        stdin_is_char_device: bool,
    ) -> Result<Box<dyn Decoder>, ClientError> {
        let source = RequestSource::select(
            stdin_is_char_device,
            self.request_file.as_deref(),
            self.formats(),
        );
        debug!(?source, format = %self.request_format, "resolving request decoder");

        match source {
            RequestSource::Stdin => self.named_decoder(|| Ok(stdin)),
            RequestSource::FileByExtension { path, format } => {
                match self.formats().decoder(format) {
                    Some(make) => Ok(make(read_request_file(path)?)),
                    None => self.named_decoder(|| read_request_file(path)),
                }
            }
            RequestSource::File(path) => self.named_decoder(|| read_request_file(path)),
            RequestSource::Absent => Ok(Box::new(NoOp)),
        }
    }

    /// Resolves the encoder the response is written through.
    pub fn make_encoder(&self, stdout: Box<dyn Write + Send>) -> Result<Box<dyn Encoder>, ClientError> {
        if self.response_format.is_empty() {
            return Ok(Box::new(NoOp));
        }
        let make = self
            .formats()
            .encoder(&self.response_format)
            .ok_or_else(|| ClientError::UnknownResponseFormat(self.response_format.clone()))?;
        debug!(format = %self.response_format, "resolved response encoder");
        Ok(make(stdout))
    }

    fn named_decoder(
        &self,
        open: impl FnOnce() -> Result<Box<dyn Read + Send>, ClientError>,
    ) -> Result<Box<dyn Decoder>, ClientError> {
        if self.request_format.is_empty() {
            return Ok(Box::new(NoOp));
        }
        let make = self
            .formats()
            .decoder(&self.request_format)
            .ok_or_else(|| ClientError::UnknownRequestFormat(self.request_format.clone()))?;
        Ok(make(open()?))
    }
}

fn read_request_file(path: &Path) -> Result<Box<dyn Read + Send>, ClientError> {
    let body = std::fs::read(path).map_err(|source| ClientError::RequestFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(Cursor::new(body)))
}
