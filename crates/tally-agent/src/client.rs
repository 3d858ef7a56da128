//! HTTP client for the collector's update endpoint.
//!
//! One TCP connection per send: connect, http1 handshake, drive the
//! connection from a background task, post the metric record.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use http_body_util::Full;
use hyper_util::rt::TokioIo;
use std::io::Write;
use tracing::debug;

use tally_model::MetricRecord;

/// Client for posting metric updates to a collector.
#[derive(Debug, Clone)]
pub struct CollectorClient {
    address: String,
    compress: bool,
}

impl CollectorClient {
    /// `address` is the collector's `host:port`.
    pub fn new(address: impl Into<String>, compress: bool) -> Self {
        Self {
            address: address.into(),
            compress,
        }
    }

    /// Post one metric record to `/update`. Non-2xx responses are errors.
    pub async fn send_update(&self, record: &MetricRecord) -> Result<()> {
        let body = serde_json::to_vec(record).context("failed to serialize metric record")?;
        let body = if self.compress {
            gzip(&body).context("failed to compress request body")?
        } else {
            body
        };

        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .with_context(|| format!("failed to connect to collector {}", self.address))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .context("http handshake failed")?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let uri = format!("http://{}/update", self.address);
        let mut req = http::Request::builder()
            .method("POST")
            .uri(&uri)
            .header("host", &self.address)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .header("user-agent", "tally-agent/0.1");
        if self.compress {
            req = req.header("content-encoding", "gzip");
        }
        let req = req
            .body(Full::new(Bytes::from(body)))
            .context("failed to build request")?;

        let resp = sender
            .send_request(req)
            .await
            .context("failed to send request")?;

        if !resp.status().is_success() {
            bail!("unexpected status from collector: {}", resp.status());
        }

        debug!(metric = %record.id, kind = %record.kind, "metric reported");
        Ok(())
    }
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
