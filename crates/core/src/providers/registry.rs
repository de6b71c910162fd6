//! Provider registry and inheritance resolver

use std::collections::HashMap;

use tokenkeeper_domain::{KeeperError, ProviderRegistration, Result};
use tracing::debug;

use super::builtin::builtin_registrations;

/// Immutable table of named provider registrations
///
/// Built once at startup. Resolution never mutates the table.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderRegistration>,
}

impl ProviderRegistry {
    /// Build a registry from explicit registrations. Later entries with the
    /// same name replace earlier ones.
    pub fn from_registrations(registrations: impl IntoIterator<Item = ProviderRegistration>) -> Self {
        let providers = registrations.into_iter().map(|reg| (reg.name.clone(), reg)).collect();
        Self { providers }
    }

    /// The built-in table
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_registrations(builtin_registrations())
    }

    /// The built-in table with `declared` registrations layered on top.
    ///
    /// A declared provider replaces a built-in one of the same name
    /// entirely; it does not merge with it (use `inherits` for that).
    #[must_use]
    pub fn with_declared(mut self, declared: impl IntoIterator<Item = ProviderRegistration>) -> Self {
        for reg in declared {
            debug!(event = "providers.declared", provider = %reg.name);
            self.providers.insert(reg.name.clone(), reg);
        }
        self
    }

    /// Registered provider names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Resolve `name` into a fully merged registration.
    ///
    /// The parent chain is resolved first and the child's present fields are
    /// overlaid on it. The result has no `inherits` field.
    ///
    /// # Errors
    /// `KeeperError::Configuration` if `name` or any ancestor is unknown, or
    /// if the ancestry contains a cycle.
    pub fn resolve(&self, name: &str) -> Result<ProviderRegistration> {
        let mut visited = Vec::new();
        self.resolve_inner(name, &mut visited)
    }

    fn resolve_inner(&self, name: &str, visited: &mut Vec<String>) -> Result<ProviderRegistration> {
        if visited.iter().any(|seen| seen == name) {
            visited.push(name.to_string());
            return Err(KeeperError::Configuration(format!(
                "provider '{name}' inherits from itself ({})",
                visited.join(" -> ")
            )));
        }

        let registration = self.providers.get(name).ok_or_else(|| match visited.last() {
            Some(child) => KeeperError::Configuration(format!(
                "provider '{child}' inherits from unknown provider '{name}'"
            )),
            None => KeeperError::Configuration(format!("unknown provider '{name}'")),
        })?;

        let Some(parent_name) = registration.inherits.as_deref() else {
            return Ok(registration.clone());
        };

        visited.push(name.to_string());
        let parent = self.resolve_inner(parent_name, visited)?;
        Ok(registration.overlay_on(&parent))
    }

    /// Resolve every registration once so a broken graph is reported before
    /// anything else happens.
    ///
    /// # Errors
    /// The first resolution error, in name order.
    pub fn validate(&self) -> Result<()> {
        for name in self.names() {
            self.resolve(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(name: &str, inherits: Option<&str>) -> ProviderRegistration {
        ProviderRegistration {
            inherits: inherits.map(str::to_string),
            ..ProviderRegistration::named(name)
        }
    }

    #[test]
    fn test_child_overrides_parent_sasl_method() {
        let mut parent = reg("parent", None);
        parent.sasl_method = Some("A".to_string());
        let mut child = reg("child", Some("parent"));
        child.sasl_method = Some("B".to_string());

        let registry = ProviderRegistry::from_registrations([parent, child]);
        let resolved = registry.resolve("child").unwrap();

        assert_eq!(resolved.sasl_method.as_deref(), Some("B"));
        assert_eq!(resolved.name, "child");
        assert!(resolved.inherits.is_none());
    }

    #[test]
    fn test_without_inherits_returns_unchanged() {
        let mut plain = reg("plain", None);
        plain.client_id = Some("id".to_string());
        let registry = ProviderRegistry::from_registrations([plain.clone()]);
        assert_eq!(registry.resolve("plain").unwrap(), plain);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = ProviderRegistry::builtin();
        let first = registry.resolve("office365").unwrap();
        let second = registry.resolve("office365").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_multi_level_chain() {
        let mut root = reg("root", None);
        root.token_endpoint = Some("https://root/token".to_string());
        root.tenant = Some("root-tenant".to_string());
        let mut middle = reg("middle", Some("root"));
        middle.tenant = Some("middle-tenant".to_string());
        let leaf = reg("leaf", Some("middle"));

        let registry = ProviderRegistry::from_registrations([root, middle, leaf]);
        let resolved = registry.resolve("leaf").unwrap();
        assert_eq!(resolved.token_endpoint.as_deref(), Some("https://root/token"));
        assert_eq!(resolved.tenant.as_deref(), Some("middle-tenant"));
    }

    #[test]
    fn test_two_node_cycle_is_configuration_error() {
        let registry =
            ProviderRegistry::from_registrations([reg("a", Some("b")), reg("b", Some("a"))]);

        let err = registry.resolve("a").unwrap_err();
        assert!(matches!(err, KeeperError::Configuration(_)));
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_self_cycle() {
        let registry = ProviderRegistry::from_registrations([reg("loop", Some("loop"))]);
        assert!(matches!(registry.resolve("loop"), Err(KeeperError::Configuration(_))));
    }

    #[test]
    fn test_unknown_parent() {
        let registry = ProviderRegistry::from_registrations([reg("orphan", Some("ghost"))]);
        let err = registry.resolve("orphan").unwrap_err();
        assert!(matches!(err, KeeperError::Configuration(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_unknown_name() {
        let err = ProviderRegistry::builtin().resolve("yahoo").unwrap_err();
        assert!(err.to_string().contains("unknown provider 'yahoo'"));
    }

    #[test]
    fn test_builtin_table_validates() {
        let registry = ProviderRegistry::builtin();
        registry.validate().unwrap();
        assert_eq!(registry.names(), vec!["google", "microsoft", "office365", "outlook.com"]);
    }

    #[test]
    fn test_builtin_office365_inherits_microsoft() {
        let resolved = ProviderRegistry::builtin().resolve("office365").unwrap();
        assert_eq!(resolved.tenant.as_deref(), Some("organizations"));
        assert_eq!(resolved.sasl_method.as_deref(), Some("XOAUTH2"));

        let token = resolved.expand_tenant(resolved.token_endpoint.as_deref().unwrap());
        assert_eq!(token, "https://login.microsoftonline.com/organizations/oauth2/v2.0/token");
    }

    #[test]
    fn test_declared_provider_replaces_builtin() {
        let mut custom = reg("google", None);
        custom.client_id = Some("mine".to_string());

        let registry = ProviderRegistry::builtin().with_declared([custom]);
        let resolved = registry.resolve("google").unwrap();
        assert_eq!(resolved.client_id.as_deref(), Some("mine"));
        assert!(resolved.token_endpoint.is_none());
    }

    #[test]
    fn test_validate_reports_broken_declaration() {
        let registry = ProviderRegistry::builtin().with_declared([reg("work", Some("offce365"))]);
        assert!(registry.validate().is_err());
    }
}
