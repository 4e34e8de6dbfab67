/// Delivery client posting the merged record set to the ingestion endpoint
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::clients::{DeliveryReceipt, RecordSink};
use crate::error::Result;
use crate::types::MergedRecord;

pub struct IngestClient {
    client: Client,
    url: String,
}

impl IngestClient {
    pub fn new(client: Client, url: &str) -> Self {
        IngestClient {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl RecordSink for IngestClient {
    async fn deliver(&self, records: &[MergedRecord]) -> Result<DeliveryReceipt> {
        debug!("Posting {} records to {}", records.len(), self.url);

        let response = self.client.post(&self.url).json(records).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(DeliveryReceipt { status, body })
    }
}
