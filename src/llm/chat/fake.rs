use async_trait::async_trait;
use std::sync::{ Arc, Mutex };

use super::{ ChatClient, CompletionRequest, CompletionResponse };
use super::factory::{ ClientBuilder, ClientFactory };
use crate::error::ChatError;

/// In-process stand-in for the remote service that records every request.
pub struct FakeChatClient {
    reply: Result<String, ChatError>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeChatClient {
    pub fn replying(text: &str) -> Self {
        Self { reply: Ok(text.to_string()), requests: Mutex::new(Vec::new()) }
    }

    pub fn failing(error: ChatError) -> Self {
        Self { reply: Err(error), requests: Mutex::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    async fn complete(
        &self,
        request: &CompletionRequest
    ) -> Result<CompletionResponse, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone().map(|response| CompletionResponse { response })
    }

    fn get_base_url(&self) -> String {
        "fake://".to_string()
    }
}

/// Factory whose every credential resolves to `client`.
pub fn factory_for(client: Arc<FakeChatClient>) -> Arc<ClientFactory> {
    let builder: ClientBuilder = Arc::new(move |_api_key: &str| -> Result<Arc<dyn ChatClient>, ChatError> {
        Ok(Arc::clone(&client) as Arc<dyn ChatClient>)
    });
    Arc::new(ClientFactory::new(builder, 8))
}
