//! `health-probe`: asks a gRPC server for its health status.
//!
//! Shaped like a generated client: all it writes is the RPC call, while
//! flags, request/response formats, TLS and the connection come from
//! grpcli.
//!
//! ```text
//! echo '{"service":""}' | health-probe -s localhost:50051
//! health-probe -s api.internal:443 --tls -o pretty-xml -H authorization=bearer-token
//! ```

use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};
use grpcli::BoxError;
use grpcli::prelude::*;
use serde::{Deserialize, Serialize};
use tonic::metadata::AsciiMetadataKey;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::health_client::HealthClient;

const HEADER: &str = "header";

#[derive(Debug, Default, Deserialize)]
#[serde(rename = "HealthCheckRequest")]
struct CheckRequest {
    #[serde(default)]
    service: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "HealthCheckResponse")]
struct CheckResponse {
    status: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = grpcli::init_logging("warn");

    let mut config = config();
    let cmd = Command::new("health-probe").about("Checks the health of a gRPC server");
    let matches = config.bind_flags(cmd).get_matches();
    config.apply_flags(&matches);

    let ctx = CallContext::new();
    let cancel = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match round_trip(ctx, &config, check).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn config() -> Config {
    Config::builder()
        .env_var_prefix("HEALTH_PROBE_")
        .flag_binder(|cmd| {
            cmd.arg(
                Arg::new(HEADER)
                    .long(HEADER)
                    .short('H')
                    .value_name("KEY=VALUE")
                    .action(ArgAction::Append)
                    .help("metadata sent with the request"),
            )
        })
        .pre_dialer(|config, ctx, _| {
            let headers = config
                .flag_matches()
                .and_then(|m| m.try_get_many::<String>(HEADER).ok().flatten());
            for header in headers.into_iter().flatten() {
                let (key, value) = header
                    .split_once('=')
                    .ok_or_else(|| format!("invalid header {header:?}, expected KEY=VALUE"))?;
                let key = AsciiMetadataKey::from_bytes(key.trim().as_bytes())?;
                ctx.metadata_mut().insert(key, value.trim().parse()?);
            }
            Ok(())
        })
        .build()
}

async fn check(
    conn: Connection,
    mut input: Box<dyn Decoder>,
    mut output: Box<dyn Encoder>,
) -> Result<(), BoxError> {
    let request: CheckRequest = input.decode_or_default()?;
    tracing::debug!(id = %conn.id(), service = %request.service, "checking health");

    let response = HealthClient::new(conn.channel())
        .check(conn.request(HealthCheckRequest {
            service: request.service,
        }))
        .await?;

    output.encode(&CheckResponse {
        status: response.into_inner().status().as_str_name().to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_flag_is_bound() {
        let mut config = config().with(|c| c.use_env_vars = false);
        let matches = config
            .bind_flags(Command::new("health-probe"))
            .try_get_matches_from(["health-probe", "-H", "x-a=1", "--header", "x-b=2"])
            .unwrap();
        config.apply_flags(&matches);

        let headers: Vec<&String> = config
            .flag_matches()
            .unwrap()
            .get_many::<String>(HEADER)
            .unwrap()
            .collect();
        assert_eq!(headers, ["x-a=1", "x-b=2"]);
    }
}
