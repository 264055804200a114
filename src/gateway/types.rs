//! Wire types for the backend API (camelCase JSON).

use serde::{Deserialize, Serialize};

/// Body of `POST /users/bootstrap`; both fields are omitted when absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_code: Option<String>,
}

impl BootstrapRequest {
    /// Builds a request from form input, dropping blank values.
    #[must_use]
    pub fn from_form(full_name: Option<&str>, referrer_code: Option<&str>) -> Self {
        Self {
            full_name: non_blank(full_name),
            referrer_code: non_blank(referrer_code),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Body of `PATCH /me`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSync {
    pub full_name: String,
    pub email: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    Pro,
    Elite,
}

impl Plan {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Pro => "Pro",
            Self::Elite => "Elite",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Trial,
    Suspended,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub uid: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
    pub referred_by_name: Option<String>,
    pub plan: Option<String>,
    pub status: Option<String>,
    pub disabled: Option<bool>,
}

impl AdminUser {
    /// Plan label; users without a recognized plan are on the basic plan.
    #[must_use]
    pub fn plan_label(&self) -> &'static str {
        match self.plan.as_deref() {
            Some("elite") => Plan::Elite.label(),
            Some("pro") => Plan::Pro.label(),
            _ => Plan::Basic.label(),
        }
    }

    /// Status label; falls back to the `disabled` flag when no status is set.
    #[must_use]
    pub fn status_label(&self) -> &'static str {
        match self.status.as_deref() {
            Some("TRIAL") => "Trial",
            Some("SUSPENDED") => "Suspended",
            Some("ACTIVE") => "Active",
            _ if self.disabled.unwrap_or(false) => "Suspended",
            _ => "Active",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AdminUsersResponse {
    #[serde(default)]
    pub users: Vec<AdminUser>,
}

/// Body of `PATCH /admin/users/{uid}`; absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl AdminUserUpdate {
    /// Activates the account on `plan`.
    #[must_use]
    pub fn activate(plan: Plan) -> Self {
        Self {
            plan: Some(plan),
            status: Some(AccountStatus::Active),
            disabled: Some(false),
        }
    }

    /// Changes the plan without touching the status.
    #[must_use]
    pub fn plan_only(plan: Plan) -> Self {
        Self {
            plan: Some(plan),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn trial() -> Self {
        Self {
            plan: None,
            status: Some(AccountStatus::Trial),
            disabled: Some(false),
        }
    }

    #[must_use]
    pub fn suspend() -> Self {
        Self {
            plan: None,
            status: Some(AccountStatus::Suspended),
            disabled: Some(true),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plan.is_none() && self.status.is_none() && self.disabled.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub color: Option<String>,
}

impl Tool {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ToolsResponse {
    #[serde(default)]
    pub tools: Vec<Tool>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bootstrap_request_omits_absent_fields() {
        let empty = serde_json::to_value(BootstrapRequest::default()).unwrap();
        assert_eq!(empty, json!({}));

        let full = serde_json::to_value(BootstrapRequest::from_form(Some(" Ana "), Some("R1"))).unwrap();
        assert_eq!(full, json!({ "fullName": "Ana", "referrerCode": "R1" }));

        let blank = BootstrapRequest::from_form(Some("  "), None);
        assert_eq!(blank, BootstrapRequest::default());
    }

    #[test]
    fn admin_update_presets_serialize_like_the_admin_console() {
        assert_eq!(
            serde_json::to_value(AdminUserUpdate::activate(Plan::Pro)).unwrap(),
            json!({ "plan": "pro", "status": "ACTIVE", "disabled": false })
        );
        assert_eq!(
            serde_json::to_value(AdminUserUpdate::plan_only(Plan::Elite)).unwrap(),
            json!({ "plan": "elite" })
        );
        assert_eq!(
            serde_json::to_value(AdminUserUpdate::suspend()).unwrap(),
            json!({ "status": "SUSPENDED", "disabled": true })
        );
        assert!(AdminUserUpdate::default().is_empty());
    }

    #[test]
    fn admin_user_labels_fall_back() {
        let user: AdminUser = serde_json::from_value(json!({
            "uid": "u1",
            "email": "a@x.com",
            "fullName": "Ana",
            "disabled": true
        }))
        .unwrap();
        assert_eq!(user.full_name.as_deref(), Some("Ana"));
        assert_eq!(user.plan_label(), "Basic");
        assert_eq!(user.status_label(), "Suspended");

        let trial = AdminUser {
            plan: Some("elite".to_string()),
            status: Some("TRIAL".to_string()),
            ..AdminUser::default()
        };
        assert_eq!(trial.plan_label(), "Elite");
        assert_eq!(trial.status_label(), "Trial");
    }
}
