use std::collections::HashSet;

use super::domain::UserId;

/// Admin-authorization collaborator consulted before privileged operations.
pub trait AdminAuthorizer: Send + Sync {
    fn is_admin(&self, user: &UserId) -> bool;
}

/// Fixed allow-list of admin accounts.
#[derive(Debug, Clone, Default)]
pub struct StaticAdminList {
    admins: HashSet<UserId>,
}

impl StaticAdminList {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(|id| UserId(id.into())).collect(),
        }
    }
}

impl AdminAuthorizer for StaticAdminList {
    fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }
}
