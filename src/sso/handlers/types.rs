use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of the login form post.
#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginForm {
    pub email: Option<String>,
    pub pw: Option<String>,
    /// Present when the "to admin" button submitted the form.
    #[serde(default, rename = "submitAdmin")]
    pub submit_admin: Option<String>,
    #[serde(default, rename = "submitWebmail")]
    pub submit_webmail: Option<String>,
}

/// What the login page needs to render itself.
#[derive(ToSchema, Serialize, Debug)]
pub struct LoginPageResponse {
    pub admin_path: String,
    pub webmail_path: String,
    pub oidc_enabled: bool,
    pub oidc_redirect_url: Option<String>,
}
