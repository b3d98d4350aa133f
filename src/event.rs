//! The sample `orderCreated` domain event.

use crate::error::Result;
use crate::protocol::http::read_text;
use reqwest::Client;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};
use uuid::Uuid;

pub const EVENT_TYPE: &str = "orderCreated";
pub const EVENT_TYPE_VERSION: &str = "v1";
/// Sent when the caller supplies no order code.
pub const DEFAULT_ORDER_CODE: &str = "12345";

#[derive(Debug, Clone, Serialize)]
pub struct OrderCreatedEvent {
    #[serde(rename = "event-type")]
    pub event_type: &'static str,
    #[serde(rename = "event-type-version")]
    pub event_type_version: &'static str,
    #[serde(rename = "event-id")]
    pub event_id: Uuid,
    #[serde(rename = "event-time")]
    pub event_time: String,
    pub data: OrderData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub order_code: String,
}

impl OrderCreatedEvent {
    pub fn new(order_code: &str) -> Self {
        let order_code = match order_code.trim() {
            "" => {
                warn!("no order code provided, sending default");
                DEFAULT_ORDER_CODE
            }
            code => code,
        };
        let event_time = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        Self {
            event_type: EVENT_TYPE,
            event_type_version: EVENT_TYPE_VERSION,
            event_id: Uuid::new_v4(),
            event_time,
            data: OrderData {
                order_code: order_code.to_string(),
            },
        }
    }

    /// POSTs the event to `event_url` over the given client.
    pub async fn publish(&self, client: &Client, event_url: &str) -> Result<String> {
        debug!(url = event_url, event_id = %self.event_id, "publishing event");
        let response = client.post(event_url).json(self).send().await?;
        read_text(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = OrderCreatedEvent::new("4711");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event-type"], "orderCreated");
        assert_eq!(value["event-type-version"], "v1");
        assert_eq!(value["data"]["orderCode"], "4711");
        assert!(Uuid::parse_str(value["event-id"].as_str().unwrap()).is_ok());
        assert!(OffsetDateTime::parse(value["event-time"].as_str().unwrap(), &Rfc3339).is_ok());
    }

    #[test]
    fn test_empty_order_code_uses_default() {
        assert_eq!(OrderCreatedEvent::new("  ").data.order_code, DEFAULT_ORDER_CODE);
    }

    #[test]
    fn test_each_event_has_its_own_id() {
        assert_ne!(OrderCreatedEvent::new("1").event_id, OrderCreatedEvent::new("1").event_id);
    }
}
