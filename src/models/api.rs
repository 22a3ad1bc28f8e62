use crate::models::cylinder::Cylinder;
use crate::models::profile::{Settings, UserProfile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Deserialize)]
pub struct AddCylinderRequest {
    pub size: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWeightRequest {
    pub weight: f64,
    /// Reject the write if the profile moved past this version
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: Settings,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyQuery {
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub version: u64,
    pub profile: UserProfile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CylinderResponse {
    pub success: bool,
    pub version: u64,
    pub cylinder: Cylinder,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
