// Polling demo client
// Connects to the demo server and keeps calling SayHello so the server's
// metrics have something to show
//
// Numan Thabit 2025 Nov

use crate::proto::{DemoServiceClient, HelloRequest};
use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use std::time::Duration;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};
use tonic::transport::Channel;
use tonic::Request;
use tracing::{info, warn};

/// Connect to `endpoint`, retrying with exponential backoff for up to a minute.
pub async fn connect(endpoint: &str) -> Result<DemoServiceClient<Channel>> {
    let policy = ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(60)),
        ..ExponentialBackoff::default()
    };
    let endpoint = endpoint.to_string();
    backoff::future::retry(policy, || async {
        DemoServiceClient::connect(endpoint.clone())
            .await
            .map_err(|err| {
                warn!(error = %err, endpoint = %endpoint, "connect failed; retrying");
                backoff::Error::transient(err)
            })
    })
    .await
    .with_context(|| format!("connect demo server {endpoint}"))
}

/// Builds the metadata attached to every call.
pub fn build_metadata(pairs: &[(String, String)]) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        let key: AsciiMetadataKey = key
            .to_ascii_lowercase()
            .parse()
            .with_context(|| format!("invalid metadata key {key:?}"))?;
        let value: AsciiMetadataValue = value
            .parse()
            .with_context(|| format!("invalid metadata value {value:?}"))?;
        metadata.insert(key, value);
    }
    Ok(metadata)
}

pub struct Poller {
    client: DemoServiceClient<Channel>,
    names: Vec<String>,
    metadata: MetadataMap,
    interval: Duration,
}

impl Poller {
    pub fn new(
        client: DemoServiceClient<Channel>,
        names: Vec<String>,
        metadata: MetadataMap,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            names,
            metadata,
            interval,
        }
    }

    /// Sends one greeting.
    pub async fn say_hello(&mut self, name: &str) -> Result<String> {
        let mut request = Request::new(HelloRequest {
            name: name.to_string(),
        });
        *request.metadata_mut() = self.metadata.clone();
        let response = self
            .client
            .say_hello(request)
            .await
            .with_context(|| format!("SayHello({name})"))?;
        Ok(response.into_inner().message)
    }

    /// Calls SayHello forever, cycling through the names. Returns the first
    /// call failure.
    pub async fn run(mut self) -> Result<()> {
        if self.names.is_empty() {
            anyhow::bail!("no names to send");
        }
        let names = self.names.clone();
        for name in names.iter().cycle() {
            let message = self.say_hello(name).await?;
            info!(name = %name, message = %message, "SayHello answered");
            tokio::time::sleep(self.interval).await;
        }
        Ok(())
    }
}
