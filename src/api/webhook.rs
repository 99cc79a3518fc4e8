//! Implements the `Webhook` trait with a plain `reqwest` POST.

use crate::api::{Delivery, Webhook};
use crate::error::Res;
use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};

/// The Apps Script receiver answers with this text when it has appended the row.
const SUCCESS_REPLY: &str = "Success";

/// The Apps Script receiver answers with this prefix when it could not append the row.
const ERROR_REPLY: &str = "Error";

/// Posts `text/plain` bodies. A plain-text body avoids a CORS preflight on the Apps Script side,
/// and the receiver parses it as JSON anyway.
#[derive(Debug, Clone, Default)]
pub struct HttpWebhook {
    client: reqwest::Client,
}

impl HttpWebhook {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Webhook for HttpWebhook {
    async fn post(&self, url: &str, body: String) -> Res<Delivery> {
        trace!("POST {url}: {body}");
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .context("Network error while sending to the webhook")?;

        let status = response.status();
        // The body is best effort: a completed request with an unreadable body is still sent.
        let reply = response.text().await.unwrap_or_default();
        let delivery = classify(status, &reply);
        debug!("Webhook replied {status}, delivery {delivery}");
        Ok(delivery)
    }
}

/// Maps a receiver reply onto a `Delivery`.
pub(super) fn classify(status: reqwest::StatusCode, reply: &str) -> Delivery {
    let reply = reply.trim();
    if !status.is_success() {
        let reason = if reply.is_empty() {
            format!("the webhook returned {status}")
        } else {
            format!("the webhook returned {status}: {}", snippet(reply))
        };
        return Delivery::Failed(reason);
    }
    if reply.starts_with(SUCCESS_REPLY) {
        Delivery::Ack
    } else if reply.starts_with(ERROR_REPLY) {
        Delivery::Failed(snippet(reply))
    } else {
        Delivery::Unknown
    }
}

/// The first line of a reply, at most 200 characters.
fn snippet(reply: &str) -> String {
    reply
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(200)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Accepts one connection, answers it with `reply` and yields the raw request.
    async fn serve_once(reply: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/macros/s/x/exec", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });
        (url, server)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some((head, body)) = text.split_once("\r\n\r\n") {
                let length = head
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if body.len() >= length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    #[test]
    fn test_classify_success_reply() {
        assert_eq!(classify(StatusCode::OK, "Success"), Delivery::Ack);
        assert_eq!(classify(StatusCode::OK, "Success\n"), Delivery::Ack);
    }

    #[test]
    fn test_classify_error_reply() {
        assert_eq!(
            classify(StatusCode::OK, "Error: SyntaxError: Unexpected token"),
            Delivery::Failed("Error: SyntaxError: Unexpected token".to_string())
        );
    }

    #[test]
    fn test_classify_unconfirmed_reply() {
        assert_eq!(classify(StatusCode::OK, ""), Delivery::Unknown);
        assert_eq!(
            classify(StatusCode::OK, "<!DOCTYPE html><html>sign in</html>"),
            Delivery::Unknown
        );
    }

    #[test]
    fn test_classify_http_error() {
        match classify(StatusCode::NOT_FOUND, "") {
            Delivery::Failed(reason) => assert!(reason.contains("404")),
            other => panic!("expected a failure, got {other:?}"),
        }
        match classify(StatusCode::INTERNAL_SERVER_ERROR, "boom\nstack") {
            Delivery::Failed(reason) => assert!(reason.ends_with(": boom")),
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_sends_json_as_plain_text() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 7\r\n\
            Connection: close\r\n\r\nSuccess",
        )
        .await;
        let body = r#"{"merchantName":"Cafe X","totalAmount":12.5}"#;
        let delivery = HttpWebhook::new()
            .post(&url, body.to_string())
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Ack);

        let request = server.await.unwrap();
        let (head, sent) = request.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("POST /macros/s/x/exec HTTP/1.1"), "{head}");
        assert!(
            head.lines()
                .any(|line| line.eq_ignore_ascii_case("content-type: text/plain")),
            "{head}"
        );
        assert_eq!(sent, body);
        let json: serde_json::Value = serde_json::from_str(sent).unwrap();
        assert_eq!(json["merchantName"], "Cafe X");
    }

    #[tokio::test]
    async fn test_post_http_error_is_a_failed_delivery() {
        let (url, server) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\n\
            Connection: close\r\n\r\nboom",
        )
        .await;
        let delivery = HttpWebhook::new()
            .post(&url, "{}".to_string())
            .await
            .unwrap();
        match delivery {
            Delivery::Failed(reason) => assert!(reason.contains("500"), "{reason}"),
            other => panic!("expected a failure, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_a_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP connections.
        let result = HttpWebhook::new()
            .post("http://127.0.0.1:9/exec", "{}".to_string())
            .await;
        assert!(result.is_err());
    }
}
