//! Role-based route gating for UPSC Tracker.
//!
//! [`RouteGate`] turns a [`SessionState`] and a [`GateRequirement`] into a
//! [`GateDecision`]. It never talks to the backend and never mutates
//! state; the caller renders whatever the decision says.
//!
//! Checks run in a fixed order: error, loading, identity, role.
//!
//! ```text
//! error set            → Failed (error view with retry)
//! loading              → Loading
//! nobody signed in     → Redirect(login)
//! no profile yet       → ProfileMissing
//! admin required       → Redirect(student home) unless admin
//! student required     → Redirect(admin home) unless student
//! otherwise            → Render
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;
use upsc_auth::Role;
use upsc_session::{AuthError, SessionState};

// ---------------------------------------------------------------------------
// GateRoutes
// ---------------------------------------------------------------------------

/// Where the gate sends people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateRoutes {
    /// Sign-in page for anonymous visitors.
    pub login: String,

    /// Landing page for students.
    pub student_home: String,

    /// Landing page for admins.
    pub admin_home: String,
}

impl Default for GateRoutes {
    fn default() -> Self {
        Self {
            login: "/login".into(),
            student_home: "/dashboard".into(),
            admin_home: "/admin".into(),
        }
    }
}

impl GateRoutes {
    /// The landing page for `role`.
    pub fn home_for(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin_home,
            Role::Student => &self.student_home,
        }
    }
}

// ---------------------------------------------------------------------------
// GateRequirement
// ---------------------------------------------------------------------------

/// What a protected route demands of the current user.
///
/// With neither flag set, any signed-in user with a profile passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRequirement {
    pub require_admin: bool,
    pub require_student: bool,
}

impl GateRequirement {
    /// Any signed-in user with a profile.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn admin() -> Self {
        Self {
            require_admin: true,
            require_student: false,
        }
    }

    pub fn student() -> Self {
        Self {
            require_admin: false,
            require_student: true,
        }
    }
}

// ---------------------------------------------------------------------------
// GateDecision
// ---------------------------------------------------------------------------

/// What to show for a protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Initialization failed. Show the error with a retry action;
    /// `retryable` hints whether retrying without changes can help.
    Failed { error: AuthError, retryable: bool },

    /// Session restore still running.
    Loading,

    /// Send the visitor elsewhere.
    Redirect(String),

    /// Signed in, but the profile isn't there (yet). Show a
    /// "profile not found" view with a manual refresh.
    ProfileMissing,

    /// Show the protected content.
    Render,
}

impl GateDecision {
    /// Returns `true` if the protected content may be shown.
    pub fn is_render(&self) -> bool {
        matches!(self, Self::Render)
    }

    /// The redirect target, if this decision is a redirect.
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Redirect(path) => Some(path),
            _ => None,
        }
    }
}

impl std::fmt::Display for GateDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { error, .. } => write!(f, "Failed({error})"),
            Self::Loading => write!(f, "Loading"),
            Self::Redirect(path) => write!(f, "Redirect({path})"),
            Self::ProfileMissing => write!(f, "ProfileMissing"),
            Self::Render => write!(f, "Render"),
        }
    }
}

// ---------------------------------------------------------------------------
// RouteGate
// ---------------------------------------------------------------------------

/// Pure access decision over session state.
#[derive(Debug, Clone, Default)]
pub struct RouteGate {
    routes: GateRoutes,
}

impl RouteGate {
    pub fn new(routes: GateRoutes) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &GateRoutes {
        &self.routes
    }

    /// The landing page for `role`.
    pub fn home_for(&self, role: Role) -> &str {
        self.routes.home_for(role)
    }

    /// Decides what a route guarded by `requirement` should show.
    pub fn evaluate(&self, state: &SessionState, requirement: GateRequirement) -> GateDecision {
        let decision = self.decide(state, requirement);
        debug!(
            user_id = ?state.user_id(),
            ?requirement,
            %decision,
            "route gate evaluated"
        );
        decision
    }

    fn decide(&self, state: &SessionState, requirement: GateRequirement) -> GateDecision {
        if let Some(error) = &state.error {
            return GateDecision::Failed {
                error: error.clone(),
                retryable: error.is_retryable(),
            };
        }
        if state.loading {
            return GateDecision::Loading;
        }
        if state.user.is_none() {
            return GateDecision::Redirect(self.routes.login.clone());
        }
        let Some(role) = state.role() else {
            return GateDecision::ProfileMissing;
        };

        if requirement.require_admin && role != Role::Admin {
            return GateDecision::Redirect(self.routes.student_home.clone());
        }
        if requirement.require_student && role != Role::Student {
            return GateDecision::Redirect(self.routes.admin_home.clone());
        }
        GateDecision::Render
    }
}
