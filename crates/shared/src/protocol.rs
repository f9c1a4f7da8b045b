use serde::{Deserialize, Serialize};

use crate::domain::{OpeningId, Side, UserSummary, VariationId};

/// Which owner partition a listing reads from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListScope {
    Private,
    #[default]
    Public,
}

impl ListScope {
    pub fn as_str(self) -> &'static str {
        match self {
            ListScope::Private => "private",
            ListScope::Public => "public",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OpeningsQuery {
    #[serde(default)]
    pub mode: ListScope,
    #[serde(default)]
    pub favorites: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameOpeningRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BatchDeleteRequest {
    #[serde(default)]
    pub openings: Vec<OpeningId>,
    #[serde(default)]
    pub variations: Vec<VariationId>,
}

impl BatchDeleteRequest {
    pub fn is_empty(&self) -> bool {
        self.openings.is_empty() && self.variations.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportRequest {
    pub opening_ids: Vec<OpeningId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportResponse {
    pub imported: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteResponse {
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionAssignment {
    pub id: i64,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReorderOpeningsRequest {
    pub side: Side,
    pub positions: Vec<PositionAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReorderVariationsRequest {
    pub positions: Vec<PositionAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub admin_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, rename = "newPassword", skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
    #[serde(default, rename = "currentPassword")]
    pub current_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyAdminRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An image attached to a create/update form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Field set shared by the create-opening and update-variation forms.
///
/// `name` and `side` are only read on creation; the side of an existing
/// opening cannot be changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariationForm {
    pub name: Option<String>,
    pub side: Option<Side>,
    pub moves: String,
    pub notes: Option<String>,
    pub variation_name: Option<String>,
    pub tutorials: Vec<String>,
    pub image: Option<ImageUpload>,
    pub delete_image: bool,
}
