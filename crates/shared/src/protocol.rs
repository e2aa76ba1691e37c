//! Wire types for the hosted identity toolkit and Firestore REST APIs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub return_secure_token: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInWithPasswordRequest {
    pub email: String,
    pub password: String,
    pub return_secure_token: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokenResponse {
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Seconds, encoded as a decimal string.
    #[serde(default)]
    pub expires_in: String,
    pub local_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoUrl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoUrl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub return_secure_token: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoUrl")]
    pub photo_url: Option<String>,
}

/// Form body for the secure-token exchange; the endpoint uses snake_case keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub grant_type: String,
    pub refresh_token: String,
}

impl RefreshTokenRequest {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            grant_type: "refresh_token".to_string(),
            refresh_token: refresh_token.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub id_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub id_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub users: Vec<AccountInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoUrl")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestErrorEnvelope {
    pub error: RestErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FirestoreValue {
    StringValue(String),
    BooleanValue(bool),
    /// int64 values travel as decimal strings.
    IntegerValue(String),
    DoubleValue(f64),
    NullValue(Option<String>),
}

impl FirestoreValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::StringValue(s.clone()),
            Value::Bool(b) => Self::BooleanValue(*b),
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::IntegerValue(n.to_string()),
            Value::Number(n) => Self::DoubleValue(n.as_f64().unwrap_or_default()),
            Value::Null => Self::NullValue(None),
            // Nested values are not used by the profile document; keep them readable.
            other => Self::StringValue(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::StringValue(s) => Value::String(s.clone()),
            Self::BooleanValue(b) => Value::Bool(*b),
            Self::IntegerValue(raw) => raw
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .unwrap_or_else(|_| Value::String(raw.clone())),
            Self::DoubleValue(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
            Self::NullValue(_) => Value::Null,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirestoreDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FirestoreValue>,
}

impl FirestoreDocument {
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            name: None,
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), FirestoreValue::from_json(v)))
                .collect(),
        }
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
            .into_iter()
            .map(|(k, v)| {
                let json = v.to_json();
                (k, json)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_fields_use_string_value_tag() {
        let mut fields = Map::new();
        fields.insert("bio".into(), json!("hello"));
        let doc = FirestoreDocument::from_fields(&fields);
        assert_eq!(
            serde_json::to_value(&doc).expect("json"),
            json!({ "fields": { "bio": { "stringValue": "hello" } } })
        );
    }

    #[test]
    fn parses_document_returned_by_get() {
        let raw = json!({
            "name": "projects/p/databases/(default)/documents/users/abc",
            "fields": {
                "firstName": { "stringValue": "Ada" },
                "visits": { "integerValue": "3" },
                "photoURL": { "nullValue": null }
            },
            "createTime": "2024-01-01T00:00:00Z"
        });
        let doc: FirestoreDocument = serde_json::from_value(raw).expect("document");
        let fields = doc.into_fields();
        assert_eq!(fields["firstName"], json!("Ada"));
        assert_eq!(fields["visits"], json!(3));
        assert_eq!(fields["photoURL"], Value::Null);
    }

    #[test]
    fn token_response_reads_photo_url_casing() {
        let raw = json!({
            "idToken": "t",
            "localId": "uid-1",
            "expiresIn": "3600",
            "photoUrl": "file:///a.png"
        });
        let parsed: AuthTokenResponse = serde_json::from_value(raw).expect("token");
        assert_eq!(parsed.photo_url.as_deref(), Some("file:///a.png"));
        assert!(parsed.refresh_token.is_empty());
    }

    #[test]
    fn parses_secure_token_response() {
        let raw = json!({
            "expires_in": "3600",
            "token_type": "Bearer",
            "refresh_token": "r2",
            "id_token": "t2",
            "user_id": "uid-1",
            "project_id": "123"
        });
        let parsed: RefreshTokenResponse = serde_json::from_value(raw).expect("refresh");
        assert_eq!(parsed.id_token, "t2");
        assert_eq!(parsed.user_id, "uid-1");
        assert_eq!(
            serde_json::to_value(RefreshTokenRequest::new("r1")).expect("json"),
            json!({ "grant_type": "refresh_token", "refresh_token": "r1" })
        );
    }
}
