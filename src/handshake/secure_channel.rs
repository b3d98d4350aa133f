use super::{Handshake, tls};
use crate::crypto::CsrGenerator;
use crate::error::{HandshakeError, Result};
use crate::protocol::{ConnectionStatus, HandshakeStep};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{info, warn};

const ESTABLISHED: &str = "Secure TLS Connection has been established";

impl Handshake {
    /// Step 2: obtains a certificate and builds the mTLS client.
    ///
    /// On any failure the session is left without a client and marked
    /// `NotConnected`. The key and chain on disk are only replaced once the
    /// platform has issued a certificate that matches the new key; the client
    /// is then built from what was read back.
    ///
    /// 第二步：获取证书并构建 mTLS 客户端。任何失败都会使会话没有客户端并标记为
    /// `NotConnected`。只有在平台签发了与新私钥匹配的证书之后才会替换磁盘上的文件。
    pub async fn establish_secure_channel(&mut self) -> Result<String> {
        self.disconnect();
        if self.connector.is_some() {
            self.step = self.step.min(HandshakeStep::TokenRedeemed);
        }

        match self.try_establish_secure_channel().await {
            Ok(client) => {
                self.tls_client = Some(client);
                self.status = ConnectionStatus::Connected;
                self.advance(HandshakeStep::SecureChannelEstablished);
                info!(dir = %self.store.dir().display(), "secure channel established");
                Ok(ESTABLISHED.to_string())
            }
            Err(e) => {
                warn!(error = %e, "secure channel could not be established");
                Err(e)
            }
        }
    }

    async fn try_establish_secure_channel(&mut self) -> Result<reqwest::Client> {
        let connector = self.connector.as_ref().ok_or(HandshakeError::NoConnection)?;
        let subject = connector
            .certificate_subject()
            .ok_or(HandshakeError::MissingCertificateSubject)?;

        let generator = CsrGenerator::from_subject_str(subject, connector.key_length())?
            .with_placeholder_certificate(self.config.placeholder_certificate);
        // A 4096-bit key takes seconds; keep it off the runtime's worker threads.
        let material = tokio::task::spawn_blocking(move || generator.generate()).await??;
        self.store.write_csr(&material.csr_pem).await?;

        let encoded_chain = connector.exchange_csr(&self.http, &material.csr_pem).await?;
        let chain = STANDARD
            .decode(encoded_chain.trim())
            .map_err(HandshakeError::UndecodableCertificate)?;
        tls::verify_identity(&material.private_key_pem, &chain)?;

        self.store
            .write_identity(&material.private_key_pem, &chain)
            .await?;
        if let Some(placeholder) = &material.placeholder_certificate_pem {
            self.store.write_placeholder(placeholder).await?;
        }
        self.advance(HandshakeStep::CertificateIssued);

        let (private_key_pem, chain_pem) = self.store.read_identity().await?;
        tls::build_tls_client(&private_key_pem, &chain_pem, &self.config)
    }
}
