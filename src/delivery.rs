//! 出站投递协调
//!
//! 按顺序发送一批响应消息：以首字符 `{` 区分 interactive / 文本，
//! 相邻消息之间固定停顿（最后一条之后不停顿）。单条失败记日志后
//! 继续发剩余的，不中断批次。

use std::sync::Arc;
use std::time::Duration;

use crate::transport::Transport;
use crate::util::mask_sensitive;

pub struct DeliveryCoordinator {
    transport: Arc<dyn Transport>,
    pacing: Duration,
}

impl DeliveryCoordinator {
    pub fn new(transport: Arc<dyn Transport>, pacing: Duration) -> Self {
        Self { transport, pacing }
    }

    /// 顺序投递一批消息
    pub async fn deliver(&self, user: &str, responses: &[String]) {
        for (i, response) in responses.iter().enumerate() {
            let result = if response.trim_start().starts_with('{') {
                self.transport.send_interactive(user, response).await
            } else {
                self.transport.send_text(user, response).await
            };

            if let Err(e) = result {
                tracing::error!(
                    user = %mask_sensitive(user),
                    index = i,
                    error = %e,
                    "failed to deliver message"
                );
            }

            if i + 1 < responses.len() {
                tokio::time::sleep(self.pacing).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BotError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 记录发送的 (método, cuerpo)；可按索引注入失败
    struct RecordingTransport {
        sent: Mutex<Vec<(&'static str, String)>>,
        fail_on: Option<usize>,
    }

    impl RecordingTransport {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_on,
            }
        }

        fn record(&self, kind: &'static str, body: &str) -> Result<()> {
            let mut sent = self.sent.lock().unwrap();
            let index = sent.len();
            sent.push((kind, body.to_string()));
            if self.fail_on == Some(index) {
                Err(BotError::WhatsApp("injected".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_text(&self, _to: &str, body: &str) -> Result<()> {
            self.record("text", body)
        }

        async fn send_interactive(&self, _to: &str, payload: &str) -> Result<()> {
            self.record("interactive", payload)
        }

        async fn mark_read(&self, _message_id: &str) -> Result<()> {
            Ok(())
        }

        async fn media_url(&self, _media_id: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_shape_detection() {
        let transport = Arc::new(RecordingTransport::new(None));
        let coordinator =
            DeliveryCoordinator::new(transport.clone(), Duration::from_millis(1));

        let batch = vec![
            "texto plano".to_string(),
            r#"{"type":"interactive"}"#.to_string(),
        ];
        coordinator.deliver("u1", &batch).await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].0, "text");
        assert_eq!(sent[1].0, "interactive");
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let transport = Arc::new(RecordingTransport::new(Some(0)));
        let coordinator =
            DeliveryCoordinator::new(transport.clone(), Duration::from_millis(1));

        let batch = vec!["uno".to_string(), "dos".to_string(), "tres".to_string()];
        coordinator.deliver("u1", &batch).await;

        assert_eq!(transport.sent.lock().unwrap().len(), 3);
    }
}
