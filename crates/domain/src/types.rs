//! Common data types used throughout tokenkeeper

use serde::{Deserialize, Serialize};

use crate::impl_keyword_conversions;

/// Declarative OAuth2 provider registration
///
/// Every field except `name` is optional: a field that is present with an
/// empty value is different from an absent field when registrations are
/// merged along an `inherits` chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRegistration {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorize_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devicecode_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Ordered scopes requested during authorization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imap_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_endpoint: Option<String>,

    /// SASL mechanism the mail client should use (e.g. `XOAUTH2`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl ProviderRegistration {
    /// Create an empty registration with only a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Overlay `self` (the child) on `parent`.
    ///
    /// Any field present on the child wins, even when its value is empty.
    /// The merged record keeps the child's name and has no `inherits`.
    #[must_use]
    pub fn overlay_on(&self, parent: &Self) -> Self {
        fn pick<T: Clone>(child: &Option<T>, parent: &Option<T>) -> Option<T> {
            child.as_ref().or(parent.as_ref()).cloned()
        }

        Self {
            name: self.name.clone(),
            inherits: None,
            authorize_endpoint: pick(&self.authorize_endpoint, &parent.authorize_endpoint),
            devicecode_endpoint: pick(&self.devicecode_endpoint, &parent.devicecode_endpoint),
            token_endpoint: pick(&self.token_endpoint, &parent.token_endpoint),
            redirect_uri: pick(&self.redirect_uri, &parent.redirect_uri),
            scope: pick(&self.scope, &parent.scope),
            imap_endpoint: pick(&self.imap_endpoint, &parent.imap_endpoint),
            pop_endpoint: pick(&self.pop_endpoint, &parent.pop_endpoint),
            smtp_endpoint: pick(&self.smtp_endpoint, &parent.smtp_endpoint),
            sasl_method: pick(&self.sasl_method, &parent.sasl_method),
            client_id: pick(&self.client_id, &parent.client_id),
            client_secret: pick(&self.client_secret, &parent.client_secret),
            tenant: pick(&self.tenant, &parent.tenant),
        }
    }

    /// Expand a `{tenant}` placeholder with the registration's tenant.
    ///
    /// Strings without the placeholder are returned unchanged.
    #[must_use]
    pub fn expand_tenant(&self, template: &str) -> String {
        match &self.tenant {
            Some(tenant) => template.replace("{tenant}", tenant),
            None => template.to_string(),
        }
    }
}

/// OAuth client credentials stored with the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// The two token outputs a running daemon can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Unix-domain socket answering with the current token
    Socket,
    /// Plain file rewritten with the current token
    File,
}

impl_keyword_conversions!(ListenerKind {
    Socket => "socket",
    File => "file",
});
