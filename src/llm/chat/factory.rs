use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{ Arc, Mutex };

use super::ChatClient;
use super::anthropic::AnthropicChatClient;
use crate::error::ChatError;

pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Builds a fresh client for a credential.
pub type ClientBuilder = Arc<dyn Fn(&str) -> Result<Arc<dyn ChatClient>, ChatError> + Send + Sync>;

/// Memoizes one client per distinct credential, shared by every session of
/// the process. When the cache is full the least recently used credential is
/// dropped.
pub struct ClientFactory {
    builder: ClientBuilder,
    cache: Mutex<LruCache<String, Arc<dyn ChatClient>>>,
}

impl ClientFactory {
    pub fn new(builder: ClientBuilder, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            builder,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn anthropic(base_url: Option<String>, capacity: usize) -> Self {
        let builder: ClientBuilder = Arc::new(move |api_key: &str| -> Result<Arc<dyn ChatClient>, ChatError> {
            let client = AnthropicChatClient::new(api_key, base_url.clone())?;
            Ok(Arc::new(client) as Arc<dyn ChatClient>)
        });
        Self::new(builder, capacity)
    }

    pub fn get_client(&self, credential: &str) -> Result<Arc<dyn ChatClient>, ChatError> {
        if credential.trim().is_empty() {
            return Err(ChatError::Configuration("API key must not be empty".to_string()));
        }

        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = cache.get(credential) {
            return Ok(Arc::clone(client));
        }

        let client = (self.builder)(credential)?;

        if cache.push(credential.to_string(), Arc::clone(&client)).is_some() {
            debug!("Client cache full, evicted the least recently used client");
        }
        debug!("Created client, {} cached", cache.len());

        Ok(client)
    }

    pub fn cached_clients(&self) -> usize {
        let cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.len()
    }
}
