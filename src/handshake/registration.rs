use super::Handshake;
use super::store::{SpecKind, load_spec_document};
use crate::error::{HandshakeError, Result};
use crate::event::OrderCreatedEvent;
use crate::protocol::{ConnectionType, HandshakeStep};
use std::path::PathBuf;
use tracing::{info, warn};

/// File name of the REST management info document.
pub const INFO_DETAILS_FILE: &str = "kyma-info-url-details.json";

impl Handshake {
    /// Step 3: resolves application and eventing identifiers over mTLS.
    ///
    /// 第三步：通过 mTLS 获取应用和事件相关的标识。
    pub async fn fetch_app_info(&mut self) -> Result<String> {
        let tls = self.tls_client.as_ref().ok_or(HandshakeError::NoSecureChannel)?;
        let connector = self.connector.as_mut().ok_or(HandshakeError::NoConnection)?;

        let body = connector.fetch_app_info(tls).await?;
        if connector.connection_type() == ConnectionType::Rest {
            let path = self.info_details_path();
            tokio::fs::create_dir_all(&self.details_dir)
                .await
                .map_err(|e| HandshakeError::persistence(&self.details_dir, e))?;
            tokio::fs::write(&path, &body)
                .await
                .map_err(|e| HandshakeError::persistence(&path, e))?;
        }

        self.advance(HandshakeStep::AppInfoFetched);
        info!(event_url = ?self.event_url(), "application info fetched");
        Ok(body)
    }

    /// Step 4: registers the canned API spec, targeting `host_url`.
    ///
    /// An empty `host_url` falls back to [`Config::default_host_url`](crate::config::Config).
    pub async fn register_api_spec(&mut self, host_url: &[u8]) -> Result<String> {
        let tls = self.tls_client.as_ref().ok_or(HandshakeError::NoSecureChannel)?;
        let connector = self.connector.as_ref().ok_or(HandshakeError::NoConnection)?;

        let spec = load_spec_document(
            &self.config.spec_docs_dir(),
            SpecKind::Api,
            connector.connection_type(),
        )
        .await?;

        let requested = String::from_utf8_lossy(host_url);
        let host_url = match requested.trim() {
            "" => {
                warn!(
                    default = %self.config.default_host_url,
                    "no host URL provided, using default"
                );
                self.config.default_host_url.as_str()
            }
            url => url,
        };

        let response = connector.register_api_spec(tls, &spec, host_url).await?;
        info!(host_url, "API spec registered");
        self.advance(HandshakeStep::SpecsRegistered);
        Ok(response)
    }

    /// Step 5: registers the canned event spec.
    pub async fn register_event_spec(&mut self) -> Result<String> {
        let tls = self.tls_client.as_ref().ok_or(HandshakeError::NoSecureChannel)?;
        let connector = self.connector.as_ref().ok_or(HandshakeError::NoConnection)?;

        let spec = load_spec_document(
            &self.config.spec_docs_dir(),
            SpecKind::Event,
            connector.connection_type(),
        )
        .await?;

        let response = connector.register_event_spec(tls, &spec).await?;
        self.advance(HandshakeStep::SpecsRegistered);
        info!("event spec registered");
        Ok(response)
    }

    /// Publishes an `orderCreated` event to the application's eventing URL.
    ///
    /// An empty `order_code` is replaced by a sample one.
    pub async fn send_order_created_event(&self, order_code: &[u8]) -> Result<String> {
        let tls = self.tls_client.as_ref().ok_or(HandshakeError::NoSecureChannel)?;
        let event_url = self
            .event_url()
            .ok_or(HandshakeError::MissingConfiguration("eventsUrl"))?;

        let event = OrderCreatedEvent::new(&String::from_utf8_lossy(order_code));
        event.publish(tls, event_url).await
    }

    /// Where [`fetch_app_info`](Self::fetch_app_info) keeps the REST info document.
    pub fn info_details_path(&self) -> PathBuf {
        self.details_dir.join(INFO_DETAILS_FILE)
    }
}
