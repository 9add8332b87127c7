//! Caller identity as seen by the registries.

use uuid::Uuid;

/// Identity of the request being served.
///
/// The transport layer decides who is an admin; the registries only consume
/// the answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub is_admin: bool,
    /// Project the caller is acting in, if known
    pub project: Option<Uuid>,
}

impl RequestContext {
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            project: None,
        }
    }

    pub fn user(project: Uuid) -> Self {
        Self {
            is_admin: false,
            project: Some(project),
        }
    }

    /// Non-admin caller with no project identity
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether the caller may use a scoped tag of `project`.
    pub fn may_use_scope(&self, project: Uuid) -> bool {
        self.is_admin || self.project.map_or(true, |p| p == project)
    }
}
