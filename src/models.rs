use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Admin Identity (Identity Backend payload) ---

/// AdminRole
///
/// The RBAC role carried by an administrator account. Wire form is snake_case
/// (`super_admin`, `admin`, ...). Unknown strings never deserialize into a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AdminRole {
    SuperAdmin,
    Admin,
    Moderator,
    Finance,
    Support,
}

impl AdminRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AdminRole::SuperAdmin => "super_admin",
            AdminRole::Admin => "admin",
            AdminRole::Moderator => "moderator",
            AdminRole::Finance => "finance",
            AdminRole::Support => "support",
        }
    }

    /// Capabilities this role may hold, before access-level filtering.
    fn grants(self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            AdminRole::SuperAdmin => true,
            AdminRole::Admin => matches!(
                capability,
                ViewDashboard | ViewPayments | ReviewReports | ManageUsers | ManageJobs
            ),
            AdminRole::Moderator => {
                matches!(capability, ViewDashboard | ReviewReports | ManageJobs)
            }
            AdminRole::Finance => {
                matches!(capability, ViewDashboard | ViewPayments | IssueRefunds)
            }
            AdminRole::Support => {
                matches!(capability, ViewDashboard | ReviewReports | ManageUsers)
            }
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(AdminRole::SuperAdmin),
            "admin" => Ok(AdminRole::Admin),
            "moderator" => Ok(AdminRole::Moderator),
            "finance" => Ok(AdminRole::Finance),
            "support" => Ok(AdminRole::Support),
            other => Err(format!("unknown admin role {other:?}")),
        }
    }
}

/// AdminIdentity
///
/// The resolved administrator behind an authenticated session. Present on an
/// `AdminSession` if and only if its status is `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminIdentity {
    pub admin_id: Uuid,
    pub username: String,
    pub role: AdminRole,
    // Higher levels unlock write capabilities (see `Capability::min_access_level`).
    pub access_level: u8,
}

// --- Capabilities ---

/// Capability
///
/// A single permission evaluated once per resolution from the identity's role and
/// access level. Views check capabilities, never roles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Capability {
    ViewDashboard,
    ViewPayments,
    ReviewReports,
    ManageUsers,
    ManageJobs,
    IssueRefunds,
    ManageAdmins,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::ViewDashboard,
        Capability::ViewPayments,
        Capability::ReviewReports,
        Capability::ManageUsers,
        Capability::ManageJobs,
        Capability::IssueRefunds,
        Capability::ManageAdmins,
    ];

    pub fn min_access_level(self) -> u8 {
        match self {
            Capability::ViewDashboard => 0,
            Capability::ViewPayments | Capability::ReviewReports => 1,
            Capability::ManageUsers | Capability::ManageJobs | Capability::IssueRefunds => 2,
            Capability::ManageAdmins => 3,
        }
    }
}

/// CapabilitySet
///
/// The capabilities granted to one resolved identity. An empty set grants nothing,
/// which is what every non-authenticated session carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn for_identity(identity: &AdminIdentity) -> Self {
        Self(
            Capability::ALL
                .into_iter()
                .filter(|cap| identity.role.grants(*cap))
                .filter(|cap| identity.access_level >= cap.min_access_level())
                .collect(),
        )
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

// --- Admin Sections (the protected views) ---

/// AdminSection
///
/// One area of the console. Each section is gated by exactly one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AdminSection {
    Users,
    Jobs,
    Payments,
    Refunds,
    Reports,
    Admins,
}

impl AdminSection {
    pub const ALL: [AdminSection; 6] = [
        AdminSection::Users,
        AdminSection::Jobs,
        AdminSection::Payments,
        AdminSection::Refunds,
        AdminSection::Reports,
        AdminSection::Admins,
    ];

    pub fn required_capability(self) -> Capability {
        match self {
            AdminSection::Users => Capability::ManageUsers,
            AdminSection::Jobs => Capability::ManageJobs,
            AdminSection::Payments => Capability::ViewPayments,
            AdminSection::Refunds => Capability::IssueRefunds,
            AdminSection::Reports => Capability::ReviewReports,
            AdminSection::Admins => Capability::ManageAdmins,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            AdminSection::Users => "users",
            AdminSection::Jobs => "jobs",
            AdminSection::Payments => "payments",
            AdminSection::Refunds => "refunds",
            AdminSection::Reports => "reports",
            AdminSection::Admins => "admins",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            AdminSection::Users => "Users",
            AdminSection::Jobs => "Job Postings",
            AdminSection::Payments => "Payments",
            AdminSection::Refunds => "Refunds",
            AdminSection::Reports => "Reports",
            AdminSection::Admins => "Admin Accounts",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.slug() == slug)
    }
}

// --- Response Payloads (Output Schemas) ---

/// SessionStatus
///
/// The three states of the admin session machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SessionStatus {
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// SessionView
///
/// The session as exposed to client-rendered views (GET /admin/api/session).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionView {
    pub status: SessionStatus,
    pub admin: Option<AdminIdentity>,
    pub capabilities: Vec<Capability>,
    #[ts(type = "string | null")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// SectionSummary
///
/// One entry of the navigation listing (GET /admin/api/sections).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SectionSummary {
    pub section: AdminSection,
    pub title: String,
    pub path: String,
    pub allowed: bool,
}
