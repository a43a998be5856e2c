//! Share token resolution.

use regex::Regex;
use tracing::{debug, error};

use super::error::ShareError;
use super::storage::ShareStore;
use super::types::ProtectedResource;

/// Expected shape of tokens we mint; other shapes are still looked up safely.
pub fn valid_share_token(token: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_-]{16,128}$").is_ok_and(|regex| regex.is_match(token))
}

/// Map a share token to its active record.
///
/// Unknown and deleted tokens both yield `ShareError::NotFound`.
///
/// # Errors
/// Returns `BadRequest` for an empty token, `NotFound` when nothing active matches,
/// and `Internal` when the store fails.
pub async fn resolve(store: &dyn ShareStore, token: &str) -> Result<ProtectedResource, ShareError> {
    if token.trim().is_empty() {
        return Err(ShareError::BadRequest("Missing share token"));
    }
    if !valid_share_token(token) {
        debug!(token_len = token.len(), "share token has an unexpected shape");
    }

    match store.find_active_by_token(token).await {
        Ok(Some(resource)) if resource.share_token == token && resource.deleted_at.is_none() => {
            Ok(resource)
        }
        Ok(_) => Err(ShareError::NotFound),
        Err(err) => {
            error!("Failed to resolve share token: {err:#}");
            Err(ShareError::Internal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::share::memory::{MemoryShareStore, created_at, open_resource};
    use chrono::{TimeDelta, Utc};

    const TOKEN: &str = "Qm9vbGVhbkFsZ2VicmE";

    #[test]
    fn token_shape() {
        assert!(valid_share_token(TOKEN));
        assert!(valid_share_token("abc_DEF-0123456789"));
        assert!(!valid_share_token("short"));
        assert!(!valid_share_token("has spaces in the token value"));
        assert!(!valid_share_token(&"a".repeat(129)));
    }

    #[tokio::test]
    async fn resolves_active_share() {
        let store = MemoryShareStore::default();
        let resource = open_resource(TOKEN);
        store.insert(resource.clone()).await;
        assert_eq!(resolve(&store, TOKEN).await, Ok(resource));
    }

    #[tokio::test]
    async fn unknown_and_deleted_tokens_look_the_same() {
        let store = MemoryShareStore::default();
        let mut deleted = open_resource("deleted_token_0000000");
        deleted.deleted_at = Some(Utc::now());
        store.insert(deleted).await;

        let unknown = resolve(&store, "never_existed_0000000").await;
        let gone = resolve(&store, "deleted_token_0000000").await;
        assert_eq!(unknown, Err(ShareError::NotFound));
        assert_eq!(gone, unknown);
    }

    #[tokio::test]
    async fn newest_non_deleted_record_wins() {
        let store = MemoryShareStore::default();
        let now = Utc::now();
        let oldest = created_at(open_resource(TOKEN), now - TimeDelta::days(2));
        let middle = created_at(open_resource(TOKEN), now - TimeDelta::days(1));
        let mut newest = created_at(open_resource(TOKEN), now);
        newest.deleted_at = Some(now);
        store.insert(oldest).await;
        store.insert(middle.clone()).await;
        store.insert(newest).await;

        assert_eq!(resolve(&store, TOKEN).await, Ok(middle));
    }

    #[tokio::test]
    async fn odd_tokens_are_looked_up_but_not_found() {
        let store = MemoryShareStore::default();
        store.insert(open_resource(TOKEN)).await;
        assert_eq!(
            resolve(&store, "' OR 1=1 --").await,
            Err(ShareError::NotFound)
        );
        assert_eq!(
            resolve(&store, "  ").await,
            Err(ShareError::BadRequest("Missing share token"))
        );
    }
}
