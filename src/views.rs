//! Server-rendered pages. Plain markup; styling belongs to the client bundle.

use askama::Template;
use askama_web::WebTemplate;

use crate::{auth::CurrentAdmin, models::AdminSection};

// =============================================================================
// Templates
// =============================================================================

/// Login page. Credentials are posted straight to the Identity Backend.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub login_action: String,
}

impl LoginTemplate {
    pub fn new(identity_url: &str) -> Self {
        Self {
            login_action: format!("{identity_url}/admin/login"),
        }
    }
}

/// Dashboard listing the sections the admin's capabilities open.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin: CurrentAdmin,
    pub sections: Vec<AdminSection>,
}

impl DashboardTemplate {
    pub fn new(admin: CurrentAdmin) -> Self {
        let sections = AdminSection::ALL
            .into_iter()
            .filter(|section| admin.can(section.required_capability()))
            .collect();
        Self { admin, sections }
    }
}

/// One console section.
#[derive(Template, WebTemplate)]
#[template(path = "section.html")]
pub struct SectionTemplate {
    pub admin: CurrentAdmin,
    pub section: AdminSection,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdminIdentity, AdminRole, CapabilitySet};
    use uuid::Uuid;

    fn admin(username: &str, role: AdminRole, access_level: u8) -> CurrentAdmin {
        let identity = AdminIdentity {
            admin_id: Uuid::from_u128(7),
            username: username.to_string(),
            role,
            access_level,
        };
        CurrentAdmin {
            capabilities: CapabilitySet::for_identity(&identity),
            identity,
            resolved_at: None,
        }
    }

    #[test]
    fn dashboard_escapes_username() {
        let html = DashboardTemplate::new(admin("<b>ops</b>", AdminRole::Support, 0))
            .render()
            .unwrap();

        assert!(html.contains("&lt;b&gt;ops&lt;/b&gt;"));
        assert!(!html.contains("<b>ops</b>"));
    }

    #[test]
    fn dashboard_links_only_permitted_sections() {
        let html = DashboardTemplate::new(admin("finn", AdminRole::Finance, 2))
            .render()
            .unwrap();

        assert!(html.contains("/admin/sections/payments"));
        assert!(html.contains("/admin/sections/refunds"));
        assert!(!html.contains("/admin/sections/admins"));
    }

    #[test]
    fn login_form_posts_to_identity_backend() {
        let html = LoginTemplate::new("https://identity.internal").render().unwrap();
        assert!(html.contains("action=\"https://identity.internal/admin/login\""));
    }
}
