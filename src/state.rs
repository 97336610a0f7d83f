use std::sync::Arc;

use crate::auth::TokenAuthenticator;
use crate::database::Store;
use crate::storage::BlobStore;

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub tokens: Arc<TokenAuthenticator>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>, tokens: TokenAuthenticator) -> Self {
        Self {
            store,
            blobs,
            tokens: Arc::new(tokens),
        }
    }
}
