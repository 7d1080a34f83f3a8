use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user record without its password hash. This is what `login` hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub user_type: String,
    pub sport: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub profile_photo: Option<String>,
    pub is_admin: bool,
    pub suspended: bool,
    pub created_at: String,
}

/// The columns `get_users` exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub user_type: String,
    pub sport: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
    pub suspended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Approved,
    Rejected,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Approved => "approved",
            PostStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PostStatus::Pending),
            "approved" => Ok(PostStatus::Approved),
            "rejected" => Ok(PostStatus::Rejected),
            other => Err(format!("unknown post status: {}", other)),
        }
    }
}

/// A file attached to a post, carried inline as a data URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author_id: i64,
    pub content: String,
    pub created_at: String,
}

/// A post joined with the author columns the feed renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub status: PostStatus,
    pub likes: Vec<i64>,
    pub comments: Vec<Comment>,
    pub created_at: String,
    pub full_name: String,
    pub user_type: String,
    pub profile_photo: Option<String>,
}
