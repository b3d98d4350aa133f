use super::Handshake;
use crate::connector::Connector;
use crate::error::{HandshakeError, Result};
use crate::protocol::HandshakeStep;
use tracing::{info, warn};

impl Handshake {
    /// Step 1: redeems the one-time token.
    ///
    /// Always starts over: the previous strategy, every identifier it had
    /// cached, and the mTLS client are discarded before anything else runs.
    /// The new strategy is only kept if redemption succeeds.
    ///
    /// 第一步：兑换一次性令牌。总是从头开始，先丢弃之前的策略、缓存的标识
    /// 以及 mTLS 客户端；只有兑换成功时才保留新的策略。
    pub async fn redeem_token(&mut self, payload: &[u8]) -> Result<String> {
        self.connector = None;
        self.disconnect();
        self.step = HandshakeStep::Idle;

        let payload = std::str::from_utf8(payload)
            .map_err(|e| HandshakeError::MalformedToken(e.to_string()))?;
        let mut connector = Connector::for_payload(payload);
        info!(
            connection_type = %connector.connection_type(),
            key_length = connector.key_length(),
            "redeeming token"
        );

        match connector.redeem_token(&self.http, payload).await {
            Ok(body) => {
                self.connector = Some(connector);
                self.advance(HandshakeStep::TokenRedeemed);
                Ok(body)
            }
            Err(e) => {
                warn!(error = %e, "token redemption failed");
                Err(e)
            }
        }
    }
}
