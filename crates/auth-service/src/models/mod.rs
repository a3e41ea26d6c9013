use serde::{Deserialize, Serialize};

/// Response body of `GET /api/v1/auth/public-key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    /// SPKI PEM.
    pub public_key: String,
    pub algorithm: String,
    pub key_type: String,
}

/// Response body of `POST /api/v1/auth/logout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
    /// Whether the refresh token was actually revoked. Always `false` unless
    /// a revocation store is configured.
    pub revoked: bool,
}

/// Response body of `GET /api/v1/auth/me` and the `/api/v1/users/profile`
/// endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    /// `connected` or `disconnected`.
    pub database: String,
    pub timestamp: i64,
    pub version: String,
}
