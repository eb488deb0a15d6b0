// Scope: the context object threaded explicitly through every serialize/deserialize call
//
// The walkers only ever read `password`. Scopes can also appear inside a value tree
// (resources keep a handle to the scope that owns them); such nodes are process
// context and are never persisted.

use std::fmt;

/// Context supplying the password used for secret encryption and decryption.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Scope {
    name: String,
    password: Option<String>,
}

impl Scope {
    /// Creates a scope with no password.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: None,
        }
    }

    /// Returns this scope with the given password attached.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The password, if one is configured. An empty string counts as absent.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_password() {
        let scope = Scope::new("app");
        assert_eq!(scope.name(), "app");
        assert_eq!(scope.password(), None);

        let scope = scope.with_password("hunter2");
        assert_eq!(scope.password(), Some("hunter2"));

        // An empty password is treated as missing
        let scope = Scope::new("app").with_password("");
        assert_eq!(scope.password(), None);
    }

    #[test]
    fn test_scope_debug_redacts_password() {
        let scope = Scope::new("app").with_password("hunter2");
        let printed = format!("{:?}", scope);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
