use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenantry_core::{AppId, DomainError, DomainResult, Entity, UserId};

pub const NAME_MAX_LEN: usize = 50;
pub const DESCRIPTION_MAX_LEN: usize = 50;
pub const DOMAIN_NAME_MAX_LEN: usize = 50;
pub const SCREENSHOT_MAX_LEN: usize = 100;

/// Kind of application being registered.
///
/// The legacy choice keys (`ty1`, `ty2`) are still accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppType {
    #[serde(alias = "ty1", alias = "web", alias = "WEB")]
    Web,
    #[serde(alias = "ty2", alias = "mobile", alias = "MOBILE")]
    Mobile,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Web => "Web",
            AppType::Mobile => "Mobile",
        }
    }

    /// Parse the stored representation (same as the serialized one).
    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "Web" | "ty1" => Ok(AppType::Web),
            "Mobile" | "ty2" => Ok(AppType::Mobile),
            other => Err(DomainError::validation(format!("\"{other}\" is not a valid app type"))),
        }
    }
}

/// Framework the application is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    #[serde(alias = "fw1", alias = "django")]
    Django,
    #[serde(alias = "fw2", alias = "react_native", alias = "react-native")]
    ReactNative,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Django => "Django",
            Framework::ReactNative => "ReactNative",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "Django" | "fw1" => Ok(Framework::Django),
            "ReactNative" | "fw2" => Ok(Framework::ReactNative),
            other => Err(DomainError::validation(format!("\"{other}\" is not a valid framework"))),
        }
    }
}

/// The owner-editable fields of an app.
///
/// Both create and full update carry a complete `AppFields`; partial updates are
/// merged into the current fields first (see [`AppPatch::merge_into`]) and then
/// validated the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppFields {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub app_type: AppType,
    pub framework: Framework,
    pub domain_name: Option<String>,
    pub screenshot: Option<String>,
}

impl AppFields {
    /// Validate field values and return the normalized fields (trimmed name).
    ///
    /// Name uniqueness is a storage-level rule and is not checked here.
    pub fn validated(mut self) -> DomainResult<Self> {
        self.name = self.name.trim().to_string();
        require_text("name", &self.name, NAME_MAX_LEN)?;
        require_text("description", &self.description, DESCRIPTION_MAX_LEN)?;

        if let Some(domain) = &self.domain_name {
            require_text("domain_name", domain, DOMAIN_NAME_MAX_LEN)?;
        }
        if let Some(screenshot) = &self.screenshot {
            require_text("screenshot", screenshot, SCREENSHOT_MAX_LEN)?;
            validate_url(screenshot)?;
        }

        Ok(self)
    }
}

/// Aggregate root: App.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: AppId,
    pub owner: UserId,
    pub fields: AppFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }
}

impl Entity for App {
    type Id = AppId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn owner(&self) -> Option<UserId> {
        Some(self.owner)
    }
}

/// Partial update of an app. Absent fields keep their current value.
///
/// The nullable fields use `Option<Option<_>>`: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub app_type: Option<AppType>,
    pub framework: Option<Framework>,
    pub domain_name: Option<Option<String>>,
    pub screenshot: Option<Option<String>>,
}

impl AppPatch {
    pub fn is_empty(&self) -> bool {
        *self == AppPatch::default()
    }

    /// Overlay the present fields on top of `current`.
    pub fn merge_into(self, current: &AppFields) -> AppFields {
        AppFields {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            description: self.description.unwrap_or_else(|| current.description.clone()),
            app_type: self.app_type.unwrap_or(current.app_type),
            framework: self.framework.unwrap_or(current.framework),
            domain_name: self.domain_name.unwrap_or_else(|| current.domain_name.clone()),
            screenshot: self.screenshot.unwrap_or_else(|| current.screenshot.clone()),
        }
    }
}

fn require_text(field: &str, value: &str, max_len: usize) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} may not be blank")));
    }
    if value.chars().count() > max_len {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(())
}

fn validate_url(raw: &str) -> DomainResult<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| DomainError::validation(format!("screenshot is not a valid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(DomainError::validation(format!(
                "screenshot URL scheme '{other}' is not allowed"
            )));
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(DomainError::validation("screenshot URL must include a host"));
    }

    Ok(())
}
