//! Order submitters for the live worker thread.
//!
//! `RelaySubmitter` posts each order to a JackRabbitRelay-style webhook;
//! `DryRunSubmitter` only logs.

use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use qqelab_core::{OrderError, OrderRequest, OrderSide, OrderSubmitter};

/// Webhook body. Field names follow the relay's capitalized keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RelayPayload {
    pub exchange: String,
    pub account: String,
    pub market: String,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl RelayPayload {
    pub fn from_order(order: &OrderRequest) -> Self {
        let action = match (order.side, order.size) {
            (OrderSide::Buy, _) => "Buy",
            (OrderSide::Sell, None) => "Close",
            (OrderSide::Sell, Some(_)) => "Sell",
        };
        Self {
            exchange: order.exchange.clone(),
            account: order.account.clone(),
            market: order.asset.clone(),
            action,
            amount: order.size,
        }
    }
}

/// Posts each order to a relay webhook exactly once.
///
/// Market orders are not idempotent, so a failed POST is reported and never
/// resent.
pub struct RelaySubmitter {
    client: reqwest::blocking::Client,
    url: String,
}

impl RelaySubmitter {
    pub fn new(url: impl Into<String>) -> Result<Self, OrderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| OrderError::Submission(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl OrderSubmitter for RelaySubmitter {
    fn name(&self) -> &str {
        "relay"
    }

    fn submit(&mut self, order: &OrderRequest) -> Result<(), OrderError> {
        let payload = RelayPayload::from_order(order);
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| OrderError::Submission(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), market = %payload.market, "relay rejected order");
            return Err(OrderError::Submission(format!("relay returned HTTP {status}")));
        }
        info!(
            action = payload.action,
            market = %payload.market,
            amount = ?payload.amount,
            "relay accepted order"
        );
        Ok(())
    }
}

/// Logs orders without sending them anywhere.
#[derive(Debug, Default)]
pub struct DryRunSubmitter {
    submitted: usize,
}

impl DryRunSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }
}

impl OrderSubmitter for DryRunSubmitter {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn submit(&mut self, order: &OrderRequest) -> Result<(), OrderError> {
        self.submitted += 1;
        let payload = RelayPayload::from_order(order);
        info!(
            target: "trade_monitor",
            action = payload.action,
            exchange = %payload.exchange,
            account = %payload.account,
            market = %payload.market,
            amount = ?payload.amount,
            "dry-run order"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn order(side: OrderSide, size: Option<f64>) -> OrderRequest {
        OrderRequest {
            side,
            symbol: "FLOKIUSDT".into(),
            size,
            price: Some(0.00003),
            exchange: "mimic".into(),
            account: "binance_floki".into(),
            asset: "FLOKI/USDT".into(),
        }
    }

    #[test]
    fn buy_payload_uses_relay_keys() {
        let payload = RelayPayload::from_order(&order(OrderSide::Buy, Some(11.0)));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Exchange": "mimic",
                "Account": "binance_floki",
                "Market": "FLOKI/USDT",
                "Action": "Buy",
                "Amount": 11.0,
            })
        );
    }

    #[test]
    fn close_all_omits_amount() {
        let payload = RelayPayload::from_order(&order(OrderSide::Sell, None));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["Action"], "Close");
        assert!(json.get("Amount").is_none());
    }

    #[test]
    fn dry_run_counts_orders() {
        let mut submitter = DryRunSubmitter::new();
        submitter.submit(&order(OrderSide::Buy, Some(11.0))).unwrap();
        submitter.submit(&order(OrderSide::Sell, None)).unwrap();
        assert_eq!(submitter.submitted(), 2);
        assert_eq!(submitter.name(), "dry-run");
    }

    /// Serve `status` to every connection and count the connections.
    fn canned_relay(status: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/orders", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                // Read the headers and the JSON body before answering.
                while let Ok(n) = stream.read(&mut buf) {
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if let Some(end) = find_header_end(&request) {
                        if request.len() >= end + content_length(&request[..end]) {
                            break;
                        }
                    }
                }
                let response =
                    format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (url, hits)
    }

    fn find_header_end(request: &[u8]) -> Option<usize> {
        request.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
    }

    fn content_length(headers: &[u8]) -> usize {
        String::from_utf8_lossy(headers)
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().ok())
                    .flatten()
            })
            .unwrap_or(0)
    }

    #[test]
    fn rejected_order_is_posted_once() {
        let (url, hits) = canned_relay("502 Bad Gateway");
        let mut submitter = RelaySubmitter::new(url).unwrap();
        let err = submitter.submit(&order(OrderSide::Buy, Some(11.0))).unwrap_err();
        assert!(matches!(err, OrderError::Submission(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn accepted_order_is_posted_once() {
        let (url, hits) = canned_relay("200 OK");
        let mut submitter = RelaySubmitter::new(url).unwrap();
        submitter.submit(&order(OrderSide::Sell, None)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
