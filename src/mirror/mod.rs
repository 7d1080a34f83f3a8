//! Client-side state mirror.
//!
//! Every mutation is tried against the gateway first. When that fails the
//! mirror applies the same mutation to its [`LocalStore`] instead. A post
//! stored that way exists only locally: it is invisible to every other
//! user until [`ClientMirror::reconcile`] replays it, and even then it lands
//! as a pending post awaiting moderation. Nothing reconciles on its own.

pub mod error;
pub mod gateway;
pub mod store;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::api::requests::{CreatePostRequest, LoginRequest, RegisterRequest, Validate};
use crate::auth::password::{hash_password, verify_password};
use crate::db::models::{Attachment, Comment, FeedPost, PostStatus, User};

pub use error::MirrorError;
pub use gateway::{Gateway, HttpGateway};
pub use store::{LocalStore, StoreEvent};

use store::{
    CREDENTIALS_KEY, CURRENT_USER_KEY, FEED_KEY, LOGIN_TIME_KEY, POSTS_KEY, USERS_KEY,
};

/// A post that only exists in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPost {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub timestamp: String,
    pub likes: Vec<i64>,
    pub comments: Vec<Comment>,
    pub status: PostStatus,
}

/// Where a composed post ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Accepted by the gateway; pending moderation there.
    Submitted { id: i64 },
    /// Gateway unavailable; kept locally until `reconcile`.
    StoredLocally { local_id: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Remote(User),
    Local(User),
}

impl LoginOutcome {
    pub fn user(&self) -> &User {
        match self {
            LoginOutcome::Remote(user) | LoginOutcome::Local(user) => user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Remote,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostRef {
    Remote(i64),
    Local(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub post: PostRef,
    pub author_name: String,
    pub author_type: String,
    pub author_photo: Option<String>,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub status: PostStatus,
    pub created_at: String,
}

impl FeedItem {
    fn from_remote(post: FeedPost) -> Self {
        Self {
            post: PostRef::Remote(post.id),
            author_name: post.full_name,
            author_type: post.user_type,
            author_photo: post.profile_photo,
            content: post.content,
            attachments: post.attachments,
            status: post.status,
            created_at: post.created_at,
        }
    }

    fn from_local(post: LocalPost, author: Option<&User>) -> Self {
        Self {
            post: PostRef::Local(post.id),
            author_name: author
                .map(|u| u.full_name.clone())
                .unwrap_or_else(|| "Unknown User".to_string()),
            author_type: author
                .map(|u| u.user_type.clone())
                .unwrap_or_else(|| "User".to_string()),
            author_photo: author.and_then(|u| u.profile_photo.clone()),
            content: post.content,
            attachments: post.attachments,
            status: post.status,
            created_at: post.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub source: FeedSource,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub local_id: i64,
    pub remote_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub submitted: Vec<Reconciled>,
    pub remaining: usize,
}

pub struct ClientMirror<G> {
    gateway: G,
    store: Arc<LocalStore>,
    bcrypt_cost: u32,
}

impl<G: Gateway> ClientMirror<G> {
    pub fn new(gateway: G, store: Arc<LocalStore>) -> Self {
        Self {
            gateway,
            store,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Cost used when caching credentials for offline login.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub async fn current_user(&self) -> Result<Option<User>, MirrorError> {
        self.store.get(CURRENT_USER_KEY).await
    }

    /// Registration needs a server-assigned id, so there is no local fallback.
    pub async fn register(&self, req: &RegisterRequest) -> Result<i64, MirrorError> {
        // The cached credential below must be hashable without truncation.
        req.validate()?;
        let id = self.gateway.register(req).await?;

        let user = User {
            id,
            full_name: req.full_name.clone(),
            email: req.email.clone(),
            user_type: req.user_type.clone(),
            sport: req.sport.clone(),
            location: req.location.clone(),
            bio: None,
            profile_photo: None,
            is_admin: false,
            suspended: false,
            created_at: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        self.remember_user(&user, &req.password).await?;

        Ok(id)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, MirrorError> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        match self.gateway.login(&req).await {
            Ok(Some(user)) => {
                self.remember_user(&user, password).await?;
                self.start_session(&user).await?;
                return Ok(LoginOutcome::Remote(user));
            }
            Ok(None) => tracing::info!("Gateway refused credentials, trying local mirror"),
            Err(e) if e.is_unreachable() => {
                tracing::info!("Gateway unreachable, trying local mirror: {}", e)
            }
            Err(e) => tracing::warn!("Gateway login failed, trying local mirror: {}", e),
        }

        let credentials: BTreeMap<String, String> =
            self.store.get(CREDENTIALS_KEY).await?.unwrap_or_default();
        let users: Vec<User> = self.store.get(USERS_KEY).await?.unwrap_or_default();

        let matched = credentials
            .get(email)
            .filter(|hash| verify_password(password, hash))
            .and_then(|_| users.into_iter().find(|u| u.email == email));

        match matched {
            Some(user) => {
                self.start_session(&user).await?;
                Ok(LoginOutcome::Local(user))
            }
            None => Err(MirrorError::InvalidCredentials),
        }
    }

    pub async fn logout(&self) -> Result<(), MirrorError> {
        self.store.remove(CURRENT_USER_KEY).await?;
        self.store.remove(LOGIN_TIME_KEY).await?;
        Ok(())
    }

    pub async fn create_post(
        &self,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<PostOutcome, MirrorError> {
        let author = self.current_user().await?.ok_or(MirrorError::NotLoggedIn)?;

        let req = CreatePostRequest {
            author_id: author.id,
            content: content.to_string(),
            attachments,
        };

        match self.gateway.create_post(&req).await {
            Ok(id) => return Ok(PostOutcome::Submitted { id }),
            Err(e) if e.is_unreachable() => {
                tracing::info!("Gateway unreachable, storing post locally: {}", e)
            }
            Err(e) => tracing::warn!("Gateway post creation failed, storing locally: {}", e),
        }

        let timestamp = Utc::now();
        let local_id = self
            .store
            .update(POSTS_KEY, |posts: &mut Vec<LocalPost>| {
                let mut id = timestamp.timestamp_millis();
                while posts.iter().any(|p| p.id == id) {
                    id += 1;
                }
                posts.insert(
                    0,
                    LocalPost {
                        id,
                        author_id: req.author_id,
                        content: req.content,
                        attachments: req.attachments,
                        timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                        likes: Vec::new(),
                        comments: Vec::new(),
                        status: PostStatus::Pending,
                    },
                );
                id
            })
            .await?;

        Ok(PostOutcome::StoredLocally { local_id })
    }

    /// Approved posts from the gateway, or the local view when it is down.
    pub async fn load_feed(&self) -> Result<Feed, MirrorError> {
        match self.gateway.get_posts().await {
            Ok(posts) => {
                self.store.set(FEED_KEY, &posts).await?;
                return Ok(Feed {
                    source: FeedSource::Remote,
                    items: posts.into_iter().map(FeedItem::from_remote).collect(),
                });
            }
            Err(e) if e.is_unreachable() => {
                tracing::info!("Gateway unreachable, rendering local mirror: {}", e)
            }
            Err(e) => tracing::warn!("Gateway feed fetch failed, rendering local mirror: {}", e),
        }

        let local: Vec<LocalPost> = self.store.get(POSTS_KEY).await?.unwrap_or_default();
        let users: Vec<User> = self.store.get(USERS_KEY).await?.unwrap_or_default();
        let cached: Vec<FeedPost> = self.store.get(FEED_KEY).await?.unwrap_or_default();

        let mut items: Vec<FeedItem> = local
            .into_iter()
            .map(|post| {
                let author = users.iter().find(|u| u.id == post.author_id);
                FeedItem::from_local(post, author)
            })
            .collect();
        items.extend(cached.into_iter().map(FeedItem::from_remote));

        Ok(Feed {
            source: FeedSource::Local,
            items,
        })
    }

    /// Posts waiting for `reconcile`, newest first.
    pub async fn pending_local(&self) -> Result<Vec<LocalPost>, MirrorError> {
        Ok(self.store.get(POSTS_KEY).await?.unwrap_or_default())
    }

    /// Replay locally stored posts against the gateway, oldest first. Posts
    /// the gateway accepts leave the local store; the rest stay queued.
    ///
    /// The queue is emptied under the store lock before anything is sent, so
    /// mirrors sharing a store never replay the same post twice.
    pub async fn reconcile(&self) -> Result<ReconcileReport, MirrorError> {
        let queued = self
            .store
            .update(POSTS_KEY, |posts: &mut Vec<LocalPost>| std::mem::take(posts))
            .await?;
        let mut submitted = Vec::new();
        let mut failed = Vec::new();

        for post in queued.into_iter().rev() {
            let req = CreatePostRequest {
                author_id: post.author_id,
                content: post.content.clone(),
                attachments: post.attachments.clone(),
            };
            match self.gateway.create_post(&req).await {
                Ok(remote_id) => submitted.push(Reconciled {
                    local_id: post.id,
                    remote_id,
                }),
                Err(e) => {
                    tracing::warn!("Could not reconcile local post {}: {}", post.id, e);
                    failed.push(post);
                }
            }
        }

        // Failed posts are older than anything queued meanwhile, so they go
        // back behind it, newest first.
        let remaining = self
            .store
            .update(POSTS_KEY, |posts: &mut Vec<LocalPost>| {
                posts.extend(failed.into_iter().rev());
                posts.len()
            })
            .await?;

        if !submitted.is_empty() {
            tracing::info!(
                "Reconciled {} local post(s), {} still queued",
                submitted.len(),
                remaining
            );
        }

        Ok(ReconcileReport {
            submitted,
            remaining,
        })
    }

    pub fn watch_session(&self) -> SessionWatcher {
        SessionWatcher {
            store: Arc::clone(&self.store),
            events: self.store.subscribe(),
        }
    }

    async fn start_session(&self, user: &User) -> Result<(), MirrorError> {
        self.store.set(CURRENT_USER_KEY, user).await?;
        self.store
            .set(LOGIN_TIME_KEY, &Utc::now().timestamp_millis().to_string())
            .await?;
        Ok(())
    }

    /// Cache the profile and a locally hashed credential for offline login.
    async fn remember_user(&self, user: &User, plaintext: &str) -> Result<(), MirrorError> {
        let hash = hash_password(plaintext, self.bcrypt_cost)?;

        self.store
            .update(USERS_KEY, |users: &mut Vec<User>| {
                users.retain(|u| u.id != user.id && u.email != user.email);
                users.push(user.clone());
            })
            .await?;
        self.store
            .update(CREDENTIALS_KEY, |creds: &mut BTreeMap<String, String>| {
                creds.insert(user.email.clone(), hash);
            })
            .await?;
        Ok(())
    }
}

/// Observes session changes written by any mirror sharing the store.
pub struct SessionWatcher {
    store: Arc<LocalStore>,
    events: broadcast::Receiver<StoreEvent>,
}

impl SessionWatcher {
    /// Wait for the next write to the session key and return the session it
    /// left behind (`None` after a logout).
    pub async fn changed(&mut self) -> Result<Option<User>, MirrorError> {
        loop {
            match self.events.recv().await {
                Ok(event) if event.key == CURRENT_USER_KEY => break,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!("Session watcher lagged by {} events", missed);
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        self.store.get(CURRENT_USER_KEY).await
    }
}
