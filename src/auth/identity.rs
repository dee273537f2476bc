use std::collections::HashMap;

/// Lookup of users owned by a host application, for forums running in
/// inherited identity mode.
pub trait IdentitySource: Send + Sync {
    /// Display name of the host identity, or `None` when it does not exist.
    fn find_identity(&self, id: &str) -> Option<String>;
}

/// Host identities listed in the `[identity.users]` config table.
pub struct ConfiguredIdentities {
    users: HashMap<String, String>,
}

impl ConfiguredIdentities {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }
}

impl IdentitySource for ConfiguredIdentities {
    fn find_identity(&self, id: &str) -> Option<String> {
        self.users.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_configured_users_only() {
        let source = ConfiguredIdentities::new(HashMap::from([(
            "42".to_string(),
            "alice".to_string(),
        )]));
        assert_eq!(source.find_identity("42").as_deref(), Some("alice"));
        assert!(source.find_identity("7").is_none());
    }
}
