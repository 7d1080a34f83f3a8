use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::requests::{
    CreatePostRequest, LoginRequest, PostIdRequest, RegisterRequest, UserIdRequest,
};
use crate::api::responses::{Ack, Created, ErrorEnvelope, LoginResponse};
use crate::api::Action;
use crate::db::models::{FeedPost, User, UserSummary};
use crate::mirror::error::MirrorError;

/// The remote operations the mirror falls back from.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn register(&self, req: &RegisterRequest) -> Result<i64, MirrorError>;

    /// `Ok(None)` when the gateway answered but refused the credentials.
    async fn login(&self, req: &LoginRequest) -> Result<Option<User>, MirrorError>;

    async fn create_post(&self, req: &CreatePostRequest) -> Result<i64, MirrorError>;

    async fn get_posts(&self) -> Result<Vec<FeedPost>, MirrorError>;
}

/// Talks to the gateway's `/api?action=` endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn endpoint(&self, action: Action) -> String {
        format!("{}/api?action={}", self.base_url, action)
    }

    async fn post<B, R>(&self, action: Action, body: &B) -> Result<R, MirrorError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.endpoint(action))
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn fetch<R: DeserializeOwned>(&self, action: Action) -> Result<R, MirrorError> {
        let response = self.client.get(self.endpoint(action)).send().await?;
        decode(response).await
    }

    pub async fn get_pending_posts(&self) -> Result<Vec<FeedPost>, MirrorError> {
        self.fetch(Action::GetPendingPosts).await
    }

    pub async fn approve_post(&self, post_id: i64) -> Result<(), MirrorError> {
        let _: Ack = self
            .post(Action::ApprovePost, &PostIdRequest { post_id })
            .await?;
        Ok(())
    }

    pub async fn delete_post(&self, post_id: i64) -> Result<(), MirrorError> {
        let _: Ack = self
            .post(Action::DeletePost, &PostIdRequest { post_id })
            .await?;
        Ok(())
    }

    pub async fn get_users(&self) -> Result<Vec<UserSummary>, MirrorError> {
        self.fetch(Action::GetUsers).await
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<(), MirrorError> {
        let _: Ack = self
            .post(Action::DeleteUser, &UserIdRequest { user_id })
            .await?;
        Ok(())
    }

    pub async fn suspend_user(&self, user_id: i64) -> Result<(), MirrorError> {
        let _: Ack = self
            .post(Action::SuspendUser, &UserIdRequest { user_id })
            .await?;
        Ok(())
    }
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, MirrorError> {
    let status = response.status();
    if !status.is_success() {
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.error,
            Err(_) => status.to_string(),
        };
        return Err(MirrorError::Rejected(message));
    }
    Ok(response.json::<R>().await?)
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn register(&self, req: &RegisterRequest) -> Result<i64, MirrorError> {
        let created: Created = self.post(Action::Register, req).await?;
        Ok(created.id)
    }

    async fn login(&self, req: &LoginRequest) -> Result<Option<User>, MirrorError> {
        let response: LoginResponse = self.post(Action::Login, req).await?;
        Ok(if response.success { response.user } else { None })
    }

    async fn create_post(&self, req: &CreatePostRequest) -> Result<i64, MirrorError> {
        let created: Created = self.post(Action::CreatePost, req).await?;
        Ok(created.id)
    }

    async fn get_posts(&self) -> Result<Vec<FeedPost>, MirrorError> {
        self.fetch(Action::GetPosts).await
    }
}
