use super::{ApiClient, ApiError};
use crate::session::UserRole;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct RawLogin {
    token: Option<String>,
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    role: Option<String>,
    #[serde(rename = "userType")]
    user_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_role: Option<UserRole>,
}

impl ApiClient {
    /// Log in and store the token (and role, when the backend sends one) in the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "Email and password are required".into(),
            ));
        }

        let raw: RawLogin = self
            .post_json("/auth/login", &LoginRequest { email, password })
            .await?;
        let login = LoginResponse {
            token: raw
                .token
                .or(raw.access_token)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ApiError::Parse("login response carries no token".into()))?,
            user_role: raw
                .role
                .or(raw.user_type)
                .and_then(|r| UserRole::parse(&r)),
        };

        self.session()
            .update(|s| {
                s.auth_token = Some(login.token.clone());
                if login.user_role.is_some() {
                    s.user_role = login.user_role;
                }
            })?;
        log::info!("Logged in as {}", email);
        Ok(login)
    }
}
