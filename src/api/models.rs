use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::digest::CachedDigest;

#[derive(Serialize)]
pub struct DigestResponse {
    #[serde(flatten)]
    pub digest: CachedDigest,
    /// True when served from memory without calling the provider.
    pub cached: bool,
}

impl DigestResponse {
    pub fn new(digest: CachedDigest, requested_at: DateTime<Utc>) -> Self {
        let cached = digest.generated_at != requested_at;
        DigestResponse { digest, cached }
    }
}
