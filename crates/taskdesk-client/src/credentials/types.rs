//! Core credential types.

use serde::{Deserialize, Deserializer, Serialize};

/// An authenticated session: both tokens plus the cached user profile.
///
/// The record is persisted and cleared as a unit, so a store never exposes a
/// token without its companions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Short-lived bearer token attached to ordinary requests.
    pub access_token: String,
    /// Long-lived token used only against the refresh endpoint.
    pub refresh_token: String,
    /// Cached profile. Advisory only; the server decides authorization.
    pub user: UserProfile,
}

impl CredentialRecord {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        user: UserProfile,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            user,
        }
    }

    /// Check that both tokens are non-empty.
    #[inline]
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

/// Cached user profile returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceMetrics>,
}

impl UserProfile {
    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }

    /// Name to show in the UI, falling back to the username.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

/// Per-user task performance figures shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceMetrics {
    pub tasks_completed: u32,
    pub tasks_in_progress: u32,
    pub tasks_overdue: u32,
    /// Completed / assigned, in the range `0.0..=1.0`.
    pub completion_rate: f64,
    pub average_completion_hours: Option<f64>,
}

/// Accept identifiers sent either as JSON strings or numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Optional variant of [`string_or_number`].
pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(s)| s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_payload_shape() {
        let json = r#"{
            "accessToken": "a.b.c",
            "refreshToken": "r-1",
            "user": {
                "id": 1,
                "username": "admin",
                "name": "Administrator",
                "role": "admin",
                "performance": {"tasksCompleted": 12, "completionRate": 0.8}
            }
        }"#;
        let record: CredentialRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_complete());
        assert_eq!(record.user.id, "1");
        assert!(record.user.is_admin());
        let perf = record.user.performance.unwrap();
        assert_eq!(perf.tasks_completed, 12);
        assert_eq!(perf.tasks_overdue, 0);
    }

    #[test]
    fn test_display_name_fallback() {
        let user: UserProfile =
            serde_json::from_str(r#"{"id":"u-7","username":"kim","role":"employee"}"#).unwrap();
        assert_eq!(user.display_name(), "kim");
        assert!(!user.is_admin());
    }
}
