//! Server discovery: probe candidates in order and take the first that
//! completes the handshake.

use crate::agent::profiles::ServerProfile;
use crate::client::handshake;
use crate::types::{ClientConfig, Error, Result};

/// Probe `candidates` sequentially, each bounded by `config.probe_timeout`.
///
/// Later candidates are never contacted once one answers. Probe connections
/// are closed before returning.
pub async fn discover(candidates: &[ServerProfile], config: &ClientConfig) -> Result<ServerProfile> {
    let mut failures = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match probe(candidate, config).await {
            Ok(server) => {
                tracing::info!(
                    "Discovered {} at {} (server={}, failed_probes={})",
                    candidate.name,
                    candidate.endpoint,
                    server,
                    failures.len()
                );
                return Ok(candidate.clone());
            }
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", candidate.endpoint, e);
                failures.push(format!("{} ({})", candidate.endpoint, e.wire_message()));
            }
        }
    }

    Err(Error::NoServerFound(if failures.is_empty() {
        "no candidates".to_string()
    } else {
        failures.join(", ")
    }))
}

async fn probe(candidate: &ServerProfile, config: &ClientConfig) -> Result<String> {
    let attempt = async {
        let connection = candidate.endpoint.open(config).await?;
        let server = handshake(&connection, &candidate.endpoint, config.probe_timeout).await?;
        Ok::<_, Error>(server.server)
    };
    tokio::time::timeout(config.probe_timeout, attempt)
        .await
        .map_err(|_| {
            Error::timeout(format!(
                "no handshake within {}s",
                config.probe_timeout.as_secs_f64()
            ))
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_candidates() {
        let err = discover(&[], &ClientConfig::default()).await.unwrap_err();
        assert!(matches!(err, Error::NoServerFound(_)));
    }
}
