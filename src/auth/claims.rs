use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "data")]
    pub user_id: Uuid, // opaque user ID
    pub iat: i64,      // issued at (unix seconds)
    pub exp: i64,      // expires at (unix seconds)
}
