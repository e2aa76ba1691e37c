use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(SessionId);
id_newtype!(ProductId);

impl SessionId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

/// Identity issued by the identity provider, anonymous or password-backed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
    pub is_anonymous: bool,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn anonymous(id: SessionId) -> Self {
        Self {
            id,
            display_name: None,
            email: None,
            photo_ref: None,
            is_anonymous: true,
            issued_at: Utc::now(),
        }
    }
}

/// Partial update of the session's own profile attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionProfileUpdate {
    pub display_name: Option<String>,
    pub photo_ref: Option<String>,
}

/// Per-user profile document. Absent fields read back as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
}

impl ProfileRecord {
    pub fn value(&self, field: ProfileField) -> &str {
        match field {
            ProfileField::FirstName => &self.first_name,
            ProfileField::LastName => &self.last_name,
            ProfileField::Location => &self.location,
            ProfileField::Bio => &self.bio,
        }
    }

    pub fn value_mut(&mut self, field: ProfileField) -> &mut String {
        match field {
            ProfileField::FirstName => &mut self.first_name,
            ProfileField::LastName => &mut self.last_name,
            ProfileField::Location => &mut self.location,
            ProfileField::Bio => &mut self.bio,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    FirstName,
    LastName,
    Location,
    Bio,
}

impl ProfileField {
    pub const ALL: [ProfileField; 4] = [
        ProfileField::FirstName,
        ProfileField::LastName,
        ProfileField::Location,
        ProfileField::Bio,
    ];

    /// Key used for the field inside the stored document.
    pub fn document_key(self) -> &'static str {
        match self {
            ProfileField::FirstName => "firstName",
            ProfileField::LastName => "lastName",
            ProfileField::Location => "location",
            ProfileField::Bio => "bio",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProfileField::FirstName => "First Name",
            ProfileField::LastName => "Last Name",
            ProfileField::Location => "Location",
            ProfileField::Bio => "Bio",
        }
    }
}

pub const PHOTO_DOCUMENT_KEY: &str = "photoURL";

/// Target of a save: one stored field, or the composite first+last name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveTarget {
    Field(ProfileField),
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown profile field '{0}'")]
pub struct UnknownField(pub String);

impl FromStr for SaveTarget {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SaveTarget::Name),
            "firstName" => Ok(SaveTarget::Field(ProfileField::FirstName)),
            "lastName" => Ok(SaveTarget::Field(ProfileField::LastName)),
            "location" => Ok(SaveTarget::Field(ProfileField::Location)),
            "bio" => Ok(SaveTarget::Field(ProfileField::Bio)),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub id: ProductId,
    pub name: String,
    pub image: String,
}
