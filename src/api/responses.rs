use serde::{Deserialize, Serialize};

use crate::db::models::User;

/// `{success: true, id}` for actions that insert a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub success: bool,
    pub id: i64,
}

impl Created {
    pub fn new(id: i64) -> Self {
        Self { success: true, id }
    }
}

/// `{success: true}` for actions that only mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LoginResponse {
    pub fn accepted(user: User) -> Self {
        Self {
            success: true,
            user: Some(user),
            message: None,
        }
    }

    pub fn rejected() -> Self {
        Self {
            success: false,
            user: None,
            message: Some("Invalid credentials".into()),
        }
    }
}

/// The `{error}` envelope every failure renders as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejected_login_has_no_user_field() {
        let value = serde_json::to_value(LoginResponse::rejected()).unwrap();
        assert_eq!(
            value,
            json!({ "success": false, "message": "Invalid credentials" })
        );
    }

    #[test]
    fn created_serializes_flat() {
        let value = serde_json::to_value(Created::new(12)).unwrap();
        assert_eq!(value, json!({ "success": true, "id": 12 }));
    }
}
