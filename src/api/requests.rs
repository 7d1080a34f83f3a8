//! Request bodies, one schema per mutating action. Field names follow the
//! camelCase the browser client sends; anything else is rejected.

use serde::{Deserialize, Serialize};

use crate::auth::password::MAX_PASSWORD_BYTES;
use crate::db::models::Attachment;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Checks that go beyond what deserialization already guarantees.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

fn max_bytes(field: &str, value: &str, limit: usize) -> Result<(), ValidationError> {
    if value.len() > limit {
        return Err(ValidationError(format!(
            "{} must be at most {} bytes",
            field, limit
        )));
    }
    Ok(())
}

fn positive_id(field: &str, value: i64) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError(format!("{} must be a positive id", field)));
    }
    Ok(())
}

fn email_shape(email: &str) -> Result<(), ValidationError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError("email is not a valid address".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub user_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("fullName", &self.full_name)?;
        required("email", &self.email)?;
        email_shape(&self.email)?;
        required("password", &self.password)?;
        max_bytes("password", &self.password, MAX_PASSWORD_BYTES)?;
        required("userType", &self.user_type)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// An empty email or password simply never matches.
impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePostRequest {
    pub author_id: i64,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Validate for CreatePostRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        positive_id("authorId", self.author_id)?;
        required("content", &self.content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostIdRequest {
    pub post_id: i64,
}

impl Validate for PostIdRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        positive_id("postId", self.post_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserIdRequest {
    pub user_id: i64,
}

impl Validate for UserIdRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        positive_id("userId", self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn register_body() -> serde_json::Value {
        json!({
            "fullName": "Ada Runner",
            "email": "ada@x.com",
            "password": "s3cret",
            "userType": "Athlete",
            "sport": "Track",
            "location": "Lagos"
        })
    }

    #[test]
    fn register_accepts_browser_payload() {
        let req: RegisterRequest = serde_json::from_value(register_body()).unwrap();
        assert_eq!(req.full_name, "Ada Runner");
        assert_eq!(req.sport.as_deref(), Some("Track"));
        req.validate().unwrap();
    }

    #[test]
    fn register_sport_and_location_are_optional() {
        let mut body = register_body();
        body.as_object_mut().unwrap().remove("sport");
        body.as_object_mut().unwrap().remove("location");
        let req: RegisterRequest = serde_json::from_value(body).unwrap();
        assert!(req.sport.is_none());
        req.validate().unwrap();
    }

    #[test]
    fn register_rejects_missing_and_unknown_fields() {
        let mut missing = register_body();
        missing.as_object_mut().unwrap().remove("email");
        assert!(serde_json::from_value::<RegisterRequest>(missing).is_err());

        let mut unknown = register_body();
        unknown["isAdmin"] = json!(true);
        assert!(serde_json::from_value::<RegisterRequest>(unknown).is_err());
    }

    #[test]
    fn register_rejects_blank_fields_and_bad_email() {
        let mut blank: RegisterRequest = serde_json::from_value(register_body()).unwrap();
        blank.full_name = "   ".into();
        assert_eq!(
            blank.validate(),
            Err(ValidationError("fullName is required".into()))
        );

        for bad in ["no-at-sign", "@x.com", "ada@", "a@b@c", "ada @x.com"] {
            let mut req: RegisterRequest = serde_json::from_value(register_body()).unwrap();
            req.email = bad.into();
            assert!(req.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn register_rejects_password_past_bcrypt_limit() {
        let mut req: RegisterRequest = serde_json::from_value(register_body()).unwrap();
        req.password = "a".repeat(MAX_PASSWORD_BYTES);
        req.validate().unwrap();

        req.password.push('b');
        assert_eq!(
            req.validate(),
            Err(ValidationError("password must be at most 72 bytes".into()))
        );
    }

    #[test]
    fn create_post_defaults_attachments() {
        let req: CreatePostRequest =
            serde_json::from_value(json!({ "authorId": 3, "content": "hello" })).unwrap();
        assert!(req.attachments.is_empty());
        req.validate().unwrap();
    }

    #[test]
    fn create_post_rejects_null_author() {
        let body = json!({ "authorId": null, "content": "hello" });
        assert!(serde_json::from_value::<CreatePostRequest>(body).is_err());
    }

    #[test]
    fn ids_must_be_positive() {
        assert!(PostIdRequest { post_id: 0 }.validate().is_err());
        assert!(UserIdRequest { user_id: -4 }.validate().is_err());
        assert!(UserIdRequest { user_id: 4 }.validate().is_ok());
    }

    #[test]
    fn id_requests_use_camel_case() {
        let req: PostIdRequest = serde_json::from_value(json!({ "postId": 7 })).unwrap();
        assert_eq!(req.post_id, 7);
        assert!(serde_json::from_value::<PostIdRequest>(json!({ "post_id": 7 })).is_err());
    }
}
