use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shieldpost_core::{Contact, MessageContent, MessageRelay, Result, TokenAmount};

use super::GatewayClient;

pub struct HttpMessageRelay {
    client: GatewayClient,
}

impl HttpMessageRelay {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    protected_data: &'a str,
    #[serde(flatten)]
    content: &'a MessageContent,
    max_price: TokenAmount,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    task_id: String,
}

#[async_trait]
impl MessageRelay for HttpMessageRelay {
    async fn fetch_contacts(&self, strict: bool) -> Result<Vec<Contact>> {
        let strict = if strict { "true" } else { "false" };
        self.client.get("contacts", &[("strict", strict)]).await
    }

    async fn send(
        &self,
        contact: &str,
        content: &MessageContent,
        max_price: TokenAmount,
    ) -> Result<String> {
        let request = SendRequest {
            protected_data: contact,
            content,
            max_price,
        };
        let response: SendResponse = self.client.post("send", &request).await?;
        Ok(response.task_id)
    }
}
