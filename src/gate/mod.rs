//! Route authorization gate.
//!
//! Decides per navigation whether a page renders, given the current session.
//! Unauthenticated users go to login; authenticated users missing a role go
//! to the landing page.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::RouteConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_requires_auth")]
    pub requires_auth: bool,
    /// `None` means any authenticated user; `Some([])` admits nobody
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    /// API paths the page loads, relative to the backend origin
    #[serde(default)]
    pub endpoints: Vec<String>,
}

fn default_requires_auth() -> bool {
    true
}

impl Route {
    pub fn protected(path: &str, title: &str, endpoints: &[&str]) -> Self {
        Self {
            path: path.to_string(),
            title: title.to_string(),
            requires_auth: true,
            allowed_roles: None,
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn public(path: &str, title: &str) -> Self {
        Self {
            path: path.to_string(),
            title: title.to_string(),
            requires_auth: false,
            allowed_roles: None,
            endpoints: Vec::new(),
        }
    }

    pub fn restricted_to(mut self, roles: &[&str]) -> Self {
        self.allowed_roles = Some(roles.iter().map(|r| r.to_string()).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "to", rename_all = "snake_case")]
pub enum Decision {
    /// Session restore has not finished; show a neutral loading state
    Loading,
    Render,
    Redirect(String),
}

static DEFAULT_ROUTES: Lazy<Vec<Route>> = Lazy::new(|| {
    vec![
        Route::public("/login", "Sign in"),
        Route::protected(
            "/",
            "Executive Dashboard",
            &[
                "/api/executive/overview",
                "/api/executive/student-identity",
                "/api/executive/infrastructure-facilities",
                "/api/executive/teacher-staffing",
                "/api/executive/operational-performance",
                "/api/executive/school-health-index",
            ],
        ),
        Route::protected(
            "/enrolment",
            "Enrolment Analytics",
            &[
                "/api/enrolment/overview",
                "/api/enrolment/class-wise",
                "/api/enrolment/stage-wise",
                "/api/enrolment/block-wise",
            ],
        ),
        Route::protected(
            "/age-enrolment",
            "Age-wise Enrolment",
            &["/api/age-enrolment/overview"],
        ),
        Route::protected(
            "/aadhaar",
            "Aadhaar Analytics",
            &[
                "/api/aadhaar/overview",
                "/api/aadhaar/block-wise",
                "/api/aadhaar/status-distribution",
            ],
        ),
        Route::protected("/apaar", "APAAR Status", &["/api/apaar/overview"]),
        Route::protected(
            "/infrastructure",
            "Infrastructure",
            &[
                "/api/infrastructure/overview",
                "/api/infrastructure/block-wise",
                "/api/infrastructure/water-distribution",
            ],
        ),
        Route::protected(
            "/classrooms-toilets",
            "Classrooms & Toilets",
            &["/api/classrooms-toilets/overview"],
        ),
        Route::protected("/teachers", "Teacher Analytics", &["/api/teacher/overview"]),
        Route::protected("/ctteacher", "CT Teacher Analytics", &["/api/ctteacher/overview"]),
        Route::protected("/data-entry", "Data Entry Status", &["/api/data-entry/overview"]),
        Route::protected("/dropbox", "Dropbox Remarks", &["/api/dropbox/overview"]),
        Route::protected(
            "/analytics",
            "Advanced Analytics",
            &[
                "/api/analytics/predictions/dropout-risk",
                "/api/analytics/predictions/teacher-shortage",
            ],
        ),
        Route::protected("/export", "Export", &[])
            .restricted_to(&["admin", "state_officer", "district_officer"]),
        Route::protected("/admin/users", "User Management", &["/api/auth/users"])
            .restricted_to(&["admin"]),
        Route::protected("/admin/import", "Data Import", &[]).restricted_to(&["admin"]),
    ]
});

/// Declarative path → access mapping consumed by the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Built-in dashboard pages
    pub fn defaults() -> Self {
        Self::new(DEFAULT_ROUTES.clone())
    }

    pub fn from_json(raw: &str) -> ClientResult<Self> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    /// Load `routes.json` from `dir` when present, else the defaults
    pub fn load(dir: &Path) -> ClientResult<Self> {
        let file = dir.join("routes.json");
        if !file.exists() {
            return Ok(Self::defaults());
        }
        let content = fs::read_to_string(&file)?;
        let table = Self::from_json(&content)?;
        tracing::debug!("Loaded {} routes from {}", table.routes.len(), file.display());
        Ok(table)
    }

    pub fn find(&self, path: &str) -> ClientResult<&Route> {
        let normalized = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        self.routes
            .iter()
            .find(|r| r.path == normalized)
            .ok_or_else(|| ClientError::RouteNotFound(path.to_string()))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

#[derive(Debug, Clone)]
pub struct RouteGate {
    login_path: String,
    landing_path: String,
}

impl RouteGate {
    pub fn new(config: &RouteConfig) -> Self {
        Self {
            login_path: config.login_path.clone(),
            landing_path: config.landing_path.clone(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    pub fn evaluate(&self, session: &SessionSnapshot, route: &Route) -> Decision {
        if !session.is_ready() {
            return Decision::Loading;
        }

        if route.path == self.login_path {
            return match &session.user {
                Some(_) => Decision::Redirect(self.landing_path.clone()),
                None => Decision::Render,
            };
        }

        if !route.requires_auth {
            return Decision::Render;
        }

        let Some(user) = &session.user else {
            return Decision::Redirect(self.login_path.clone());
        };

        match &route.allowed_roles {
            None => Decision::Render,
            Some(roles) if roles.iter().any(|r| r == &user.role) => Decision::Render,
            Some(_) => {
                tracing::debug!("Role '{}' may not open {}", user.role, route.path);
                Decision::Redirect(self.landing_path.clone())
            }
        }
    }
}
