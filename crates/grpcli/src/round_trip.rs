//! The connection orchestrator: resolve, dial, invoke, close.

use std::future::Future;

use grpcli_codec::{Decoder, Encoder};
use grpcli_transport::{Connection, DialOption, DialOptions, dial};
use tracing::{debug, info, warn};

use crate::context::{elapsed, expired};
use crate::{CallContext, ClientError, Config, Stdio};

/// Closes the connection when the call exits, however it exits.
struct CloseGuard(Connection);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Runs one RPC against the configured server using the process's standard
/// streams.
///
/// See [`round_trip_with`] for the full sequence.
pub async fn round_trip<T, E, F, Fut>(ctx: CallContext, config: &Config, invoke: F) -> Result<T, E>
where
    F: FnOnce(Connection, Box<dyn Decoder>, Box<dyn Encoder>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ClientError>,
{
    round_trip_with(ctx, config, Stdio::inherit(), invoke).await
}

/// Runs one RPC against the configured server.
///
/// 1. Resolves the request decoder, then the response encoder. Both are
///    settled before anything touches the network.
/// 2. Resolves TLS credentials and runs every pre-dial hook in registration
///    order; the first failing hook aborts the call.
/// 3. Dials, waiting until the connection is ready. The dial is bounded by
///    the context deadline and [`Config::timeout`], and aborted by
///    cancelling the context.
/// 4. Hands the connection (carrying the context's metadata) and codecs to
///    `invoke` and returns its result untouched. The context's cancellation
///    and deadline also bound `invoke`.
///
/// The connection is closed before this returns, on every path.
///
/// # Example
///
/// ```rust,no_run
/// use grpcli::{CallContext, Config, round_trip};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let config = Config::default();
/// round_trip(CallContext::new(), &config, |conn, mut input, mut output| async move {
///     let request: serde_json::Value = input.decode_or_default()?;
///     // let response = GreeterClient::new(conn.channel()).hello(conn.request(request)).await?;
///     output.encode(&request)?;
///     Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
/// })
/// .await
/// # }
/// ```
pub async fn round_trip_with<T, E, F, Fut>(
    mut ctx: CallContext,
    config: &Config,
    stdio: Stdio,
    invoke: F,
) -> Result<T, E>
where
    F: FnOnce(Connection, Box<dyn Decoder>, Box<dyn Encoder>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ClientError>,
{
    let Stdio {
        stdin,
        stdin_is_char_device,
        stdout,
    } = stdio;

    // --- Step 1: Codecs ---
    let decoder = config.make_decoder(stdin, stdin_is_char_device)?;
    let encoder = config.make_encoder(stdout)?;

    // --- Step 2: Dial options ---
    let mut options = DialOptions::new();
    options.push(DialOption::Block);
    let credentials = config
        .tls_settings()
        .resolve(&config.server_addr)
        .map_err(ClientError::from)?;
    options.push(DialOption::Credentials(credentials));

    for (index, hook) in config.pre_dialers().iter().enumerate() {
        if let Err(e) = hook(config, &mut ctx, &mut options) {
            warn!(hook = index, error = %e, "pre-dial hook failed");
            return Err(ClientError::PreDial(e).into());
        }
    }

    // --- Step 3: Dial ---
    let cancel = ctx.cancellation_token().clone();
    let dial_deadline = ctx.dial_deadline(config.timeout);
    debug!(
        addr = %config.server_addr,
        options = options.len(),
        timeout = ?config.timeout,
        "dialing server"
    );
    if cancel.is_cancelled() {
        return Err(ClientError::Cancelled.into());
    }
    if elapsed(dial_deadline) {
        warn!(addr = %config.server_addr, "dial deadline already passed");
        return Err(ClientError::Timeout {
            addr: config.server_addr.clone(),
        }
        .into());
    }
    let conn = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(addr = %config.server_addr, "dial cancelled");
            return Err(ClientError::Cancelled.into());
        }
        _ = expired(dial_deadline) => {
            warn!(addr = %config.server_addr, "timeout dialing server");
            return Err(ClientError::Timeout { addr: config.server_addr.clone() }.into());
        }
        result = dial(&config.server_addr, options) => result.map_err(ClientError::from)?,
    };
    let conn = conn.with_metadata(ctx.metadata().clone());
    info!(id = %conn.id(), addr = %config.server_addr, "connection established");
    let _guard = CloseGuard(conn.clone());

    // --- Step 4: Invoke ---
    if cancel.is_cancelled() {
        return Err(ClientError::Cancelled.into());
    }
    if elapsed(ctx.deadline()) {
        return Err(ClientError::DeadlineExceeded.into());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled.into()),
        _ = expired(ctx.deadline()) => Err(ClientError::DeadlineExceeded.into()),
        result = invoke(conn, decoder, encoder) => result,
    }

    // _guard drops here → connection closed.
}
