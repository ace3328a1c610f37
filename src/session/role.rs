use serde::{Deserialize, Serialize};

/// Roles issued by the dashboard backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    StateOfficer,
    DistrictOfficer,
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistrictReach {
    All,
    Assigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissions {
    pub can_view_all: bool,
    pub can_export: bool,
    pub can_manage_users: bool,
    pub can_import_data: bool,
    pub districts: DistrictReach,
}

impl Role {
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "admin" => Some(Role::Admin),
            "state_officer" => Some(Role::StateOfficer),
            "district_officer" => Some(Role::DistrictOfficer),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::StateOfficer => "state_officer",
            Role::DistrictOfficer => "district_officer",
            Role::Viewer => "viewer",
        }
    }

    pub fn permissions(&self) -> RolePermissions {
        match self {
            Role::Admin => RolePermissions {
                can_view_all: true,
                can_export: true,
                can_manage_users: true,
                can_import_data: true,
                districts: DistrictReach::All,
            },
            Role::StateOfficer => RolePermissions {
                can_view_all: true,
                can_export: true,
                can_manage_users: false,
                can_import_data: false,
                districts: DistrictReach::All,
            },
            Role::DistrictOfficer => RolePermissions {
                can_view_all: false,
                can_export: true,
                can_manage_users: false,
                can_import_data: false,
                districts: DistrictReach::Assigned,
            },
            Role::Viewer => RolePermissions {
                can_view_all: true,
                can_export: false,
                can_manage_users: false,
                can_import_data: false,
                districts: DistrictReach::All,
            },
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
