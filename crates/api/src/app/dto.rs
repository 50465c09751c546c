use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};

use tenantry_apps::{App, AppFields, AppPatch, AppType, Framework};
use tenantry_auth::UserAccount;
use tenantry_core::{AppId, PlanId, UserId};
use tenantry_subscriptions::{Plan, Subscription, SubscriptionDraft, SubscriptionPatch};

use crate::app::errors;

// -------------------------
// Extractor
// -------------------------

/// `Json<T>` whose rejections (bad syntax, wrong content type, wrong field
/// types) all become 400 with the usual error body.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                rejection.body_text(),
            )),
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Create / full update of an app. `user` is the claimed owner.
#[derive(Debug, Deserialize)]
pub struct AppRequest {
    #[serde(default)]
    pub user: Option<UserId>,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub app_type: AppType,
    pub framework: Framework,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl AppRequest {
    pub fn into_parts(self) -> (Option<UserId>, AppFields) {
        let fields = AppFields {
            name: self.name,
            description: self.description,
            app_type: self.app_type,
            framework: self.framework,
            domain_name: self.domain_name,
            screenshot: self.screenshot,
        };
        (self.user, fields)
    }
}

#[derive(Debug, Deserialize)]
pub struct AppPatchRequest {
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub app_type: Option<AppType>,
    #[serde(default)]
    pub framework: Option<Framework>,
    #[serde(default, deserialize_with = "present")]
    pub domain_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub screenshot: Option<Option<String>>,
}

impl AppPatchRequest {
    pub fn into_parts(self) -> (Option<UserId>, AppPatch) {
        let patch = AppPatch {
            name: self.name,
            description: self.description,
            app_type: self.app_type,
            framework: self.framework,
            domain_name: self.domain_name,
            screenshot: self.screenshot,
        };
        (self.user, patch)
    }
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    #[serde(default)]
    pub user: Option<UserId>,
    pub plan: PlanId,
    #[serde(default)]
    pub app: Option<AppId>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub active: bool,
}

impl From<SubscriptionRequest> for SubscriptionDraft {
    fn from(req: SubscriptionRequest) -> Self {
        SubscriptionDraft {
            user: req.user,
            plan: req.plan,
            app: req.app,
            active: req.active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionPatchRequest {
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub plan: Option<PlanId>,
    #[serde(default)]
    pub app: Option<AppId>,
    #[serde(default, deserialize_with = "lenient_bool_opt")]
    pub active: Option<bool>,
}

impl From<SubscriptionPatchRequest> for SubscriptionPatch {
    fn from(req: SubscriptionPatchRequest) -> Self {
        SubscriptionPatch {
            user: req.user,
            plan: req.plan,
            app: req.app,
            active: req.active,
        }
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Text(String),
}

/// JSON bool, or the strings `"true"` / `"false"` (form-style clients).
fn lenient_bool<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match BoolLike::deserialize(de)? {
        BoolLike::Bool(b) => Ok(b),
        BoolLike::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(serde::de::Error::custom(format!("\"{s}\" is not a valid boolean"))),
        },
    }
}

fn lenient_bool_opt<'de, D>(de: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_bool(de).map(Some)
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn user_to_json(user: &UserAccount) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
    })
}

pub fn plan_to_json(plan: Plan) -> serde_json::Value {
    serde_json::json!({
        "id": plan.id,
        "name": plan.name,
        "description": plan.description,
        "price": plan.price,
        "created_at": plan.created_at,
        "updated_at": plan.updated_at,
    })
}

pub fn app_to_json(app: App) -> serde_json::Value {
    serde_json::json!({
        "id": app.id,
        "name": app.fields.name,
        "description": app.fields.description,
        "type": app.fields.app_type,
        "framework": app.fields.framework,
        "domain_name": app.fields.domain_name,
        "screenshot": app.fields.screenshot,
        "user": app.owner,
        "created_at": app.created_at,
        "updated_at": app.updated_at,
    })
}

pub fn subscription_to_json(sub: Subscription) -> serde_json::Value {
    serde_json::json!({
        "id": sub.id,
        "user": sub.owner,
        "plan": sub.plan,
        "app": sub.app,
        "active": sub.active,
        "created_at": sub.created_at,
        "updated_at": sub.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn app_patch_distinguishes_null_from_absent() {
        let req: AppPatchRequest = serde_json::from_value(json!({
            "description": "Patched",
            "domain_name": null,
        }))
        .unwrap();
        let (user, patch) = req.into_parts();
        assert_eq!(user, None);
        assert_eq!(patch.domain_name, Some(None));
        assert_eq!(patch.screenshot, None);
    }

    #[test]
    fn app_request_accepts_legacy_choice_keys() {
        let req: AppRequest = serde_json::from_value(json!({
            "name": "App One",
            "description": "First Application",
            "type": "ty1",
            "framework": "fw2",
            "user": 1,
        }))
        .unwrap();
        let (user, fields) = req.into_parts();
        assert_eq!(user, Some(UserId::new(1)));
        assert_eq!(fields.app_type, AppType::Web);
        assert_eq!(fields.framework, Framework::ReactNative);
    }

    #[test]
    fn app_request_rejects_unknown_types() {
        let res = serde_json::from_value::<AppRequest>(json!({
            "name": "x", "description": "x", "type": "Desktop", "framework": "Django",
        }));
        assert!(res.is_err());
    }

    #[test]
    fn subscription_active_accepts_strings_and_defaults_to_false() {
        let req: SubscriptionRequest =
            serde_json::from_value(json!({"user": 1, "plan": 1, "app": 2, "active": "true"})).unwrap();
        assert!(req.active);

        let req: SubscriptionRequest = serde_json::from_value(json!({"user": 1, "plan": 1, "app": 2})).unwrap();
        assert!(!req.active);

        assert!(serde_json::from_value::<SubscriptionRequest>(json!({"plan": 1, "active": "maybe"})).is_err());
    }

    #[test]
    fn subscription_json_uses_wire_names() {
        let now = chrono::Utc::now();
        let value = subscription_to_json(Subscription {
            id: tenantry_core::SubscriptionId::new(4),
            owner: UserId::new(1),
            plan: PlanId::new(2),
            app: AppId::new(3),
            active: true,
            created_at: now,
            updated_at: now,
        });
        assert_eq!(value["user"], 1);
        assert_eq!(value["plan"], 2);
        assert_eq!(value["app"], 3);
    }
}
