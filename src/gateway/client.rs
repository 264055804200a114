//! Client helpers for the backend endpoints. These functions keep endpoint
//! paths centralized and assume the backend enforces authorization.

use super::{
    types::{
        AdminUser, AdminUserUpdate, AdminUsersResponse, BootstrapRequest, ProfileSync, Tool,
        ToolsResponse,
    },
    BackendGateway, GatewayError, Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

fn encode<T: Serialize>(body: &T) -> Result<Value, GatewayError> {
    serde_json::to_value(body)
        .map_err(|err| GatewayError::Encode(format!("Failed to encode request: {err}")))
}

fn decode<T: DeserializeOwned + Default>(value: Value) -> Result<T, GatewayError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value)
        .map_err(|err| GatewayError::Decode(format!("Failed to decode response: {err}")))
}

fn user_path(uid: &str) -> Result<String, GatewayError> {
    let trimmed = uid.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::Config("User id is required.".to_string()));
    }
    Ok(format!("/admin/users/{trimmed}"))
}

/// Ensures the backend holds a user record for the signed-in identity.
///
/// # Errors
/// Returns the gateway error of the failed call.
pub async fn bootstrap_user(
    gateway: &dyn BackendGateway,
    request: &BootstrapRequest,
) -> Result<(), GatewayError> {
    gateway
        .request(Method::POST, "/users/bootstrap", Some(encode(request)?))
        .await
        .map(|_| ())
}

/// Propagates profile changes to the backend record.
///
/// # Errors
/// Returns the gateway error of the failed call.
pub async fn update_me(gateway: &dyn BackendGateway, profile: &ProfileSync) -> Result<(), GatewayError> {
    gateway
        .request(Method::PATCH, "/me", Some(encode(profile)?))
        .await
        .map(|_| ())
}

/// # Errors
/// Returns the gateway error of the failed call.
pub async fn list_admin_users(gateway: &dyn BackendGateway) -> Result<Vec<AdminUser>, GatewayError> {
    let value = gateway.request(Method::GET, "/admin/users", None).await?;
    decode::<AdminUsersResponse>(value).map(|response| response.users)
}

/// # Errors
/// Returns `Config` for an empty uid or update, otherwise the gateway error.
pub async fn update_admin_user(
    gateway: &dyn BackendGateway,
    uid: &str,
    update: &AdminUserUpdate,
) -> Result<(), GatewayError> {
    if update.is_empty() {
        return Err(GatewayError::Config("Nothing to update.".to_string()));
    }
    let path = user_path(uid)?;
    gateway
        .request(Method::PATCH, &path, Some(encode(update)?))
        .await
        .map(|_| ())
}

/// # Errors
/// Returns `Config` for an empty uid, otherwise the gateway error.
pub async fn delete_admin_user(gateway: &dyn BackendGateway, uid: &str) -> Result<(), GatewayError> {
    let path = user_path(uid)?;
    gateway.request(Method::DELETE, &path, None).await.map(|_| ())
}

/// # Errors
/// Returns the gateway error of the failed call.
pub async fn list_tools(gateway: &dyn BackendGateway) -> Result<Vec<Tool>, GatewayError> {
    let value = gateway.request(Method::GET, "/tools", None).await?;
    decode::<ToolsResponse>(value).map(|response| response.tools)
}

/// Case-insensitive search over email, full name and referral code.
#[must_use]
pub fn filter_admin_users<'a>(users: &'a [AdminUser], query: &str) -> Vec<&'a AdminUser> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return users.iter().collect();
    }
    let matches = |field: &Option<String>| {
        field
            .as_deref()
            .is_some_and(|value| value.to_lowercase().contains(&query))
    };
    users
        .iter()
        .filter(|user| matches(&user.email) || matches(&user.full_name) || matches(&user.referral_code))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(uid: &str, email: &str, name: &str, code: &str) -> AdminUser {
        AdminUser {
            uid: uid.to_string(),
            email: Some(email.to_string()),
            full_name: Some(name.to_string()),
            referral_code: Some(code.to_string()),
            ..AdminUser::default()
        }
    }

    #[test]
    fn filter_matches_any_searchable_field() {
        let users = vec![
            user("1", "ana@x.com", "Ana Perez", "ANA1"),
            user("2", "bob@y.com", "Bob", "REF-77"),
        ];

        assert_eq!(filter_admin_users(&users, "").len(), 2);
        assert_eq!(filter_admin_users(&users, "ANA@")[0].uid, "1");
        assert_eq!(filter_admin_users(&users, "perez")[0].uid, "1");
        assert_eq!(filter_admin_users(&users, "ref-77")[0].uid, "2");
        assert!(filter_admin_users(&users, "nobody").is_empty());
    }

    #[test]
    fn user_path_rejects_blank_ids() {
        assert_eq!(user_path(" u1 "), Ok("/admin/users/u1".to_string()));
        assert!(matches!(user_path("  "), Err(GatewayError::Config(_))));
    }

    #[test]
    fn decode_treats_null_as_empty() {
        let response: ToolsResponse = decode(Value::Null).unwrap_or_default();
        assert!(response.tools.is_empty());
    }
}
