use std::sync::Arc;

use twilight_cache_inmemory::InMemoryCache;
use twilight_http::Client;

use crate::state::State;

/// The bot's HTTP and cache APIs, along with its shared state.
#[derive(Clone, Debug)]
pub struct Api {
    /// The API's HTTP client.
    pub http: Arc<Client>,
    /// The API's in-memory cache.
    pub cache: Arc<InMemoryCache>,
    /// The bot's shared state.
    pub state: Arc<State>,
}

impl Api {
    /// Returns a shared reference to this [`Api`].
    #[must_use]
    pub const fn by_ref(&self) -> ApiRef {
        ApiRef { http: &self.http, cache: &self.cache, state: &self.state }
    }
}

/// A reference to the bot's HTTP and cache APIs, along with its shared state.
#[derive(Clone, Copy, Debug)]
pub struct ApiRef<'api> {
    /// The API's HTTP client.
    pub http: &'api Arc<Client>,
    /// The API's in-memory cache.
    pub cache: &'api Arc<InMemoryCache>,
    /// The bot's shared state.
    pub state: &'api Arc<State>,
}
