//! Built-in provider registrations
//!
//! Endpoint strings may carry a `{tenant}` placeholder; it is expanded with
//! the resolved registration's tenant when the OAuth client is configured.

use tokenkeeper_domain::ProviderRegistration;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

fn some(value: &str) -> Option<String> {
    Some(value.to_string())
}

fn google() -> ProviderRegistration {
    ProviderRegistration {
        authorize_endpoint: some("https://accounts.google.com/o/oauth2/auth"),
        devicecode_endpoint: some("https://oauth2.googleapis.com/device/code"),
        token_endpoint: some("https://accounts.google.com/o/oauth2/token"),
        redirect_uri: some("http://localhost/"),
        scope: Some(strings(&["https://mail.google.com/"])),
        imap_endpoint: some("imap.gmail.com"),
        pop_endpoint: some("pop.gmail.com"),
        smtp_endpoint: some("smtp.gmail.com"),
        sasl_method: some("OAUTHBEARER"),
        ..ProviderRegistration::named("google")
    }
}

fn microsoft() -> ProviderRegistration {
    ProviderRegistration {
        authorize_endpoint: some(
            "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/authorize",
        ),
        devicecode_endpoint: some(
            "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/devicecode",
        ),
        token_endpoint: some("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"),
        redirect_uri: some("http://localhost/"),
        scope: Some(strings(&[
            "offline_access",
            "https://outlook.office.com/IMAP.AccessAsUser.All",
            "https://outlook.office.com/POP.AccessAsUser.All",
            "https://outlook.office.com/SMTP.Send",
        ])),
        imap_endpoint: some("outlook.office365.com"),
        pop_endpoint: some("outlook.office365.com"),
        smtp_endpoint: some("smtp.office365.com"),
        sasl_method: some("XOAUTH2"),
        tenant: some("common"),
        ..ProviderRegistration::named("microsoft")
    }
}

fn office365() -> ProviderRegistration {
    ProviderRegistration {
        inherits: some("microsoft"),
        tenant: some("organizations"),
        ..ProviderRegistration::named("office365")
    }
}

fn outlook_com() -> ProviderRegistration {
    ProviderRegistration {
        inherits: some("microsoft"),
        tenant: some("consumers"),
        smtp_endpoint: some("smtp-mail.outlook.com"),
        ..ProviderRegistration::named("outlook.com")
    }
}

/// The registrations shipped with the binary.
#[must_use]
pub fn builtin_registrations() -> Vec<ProviderRegistration> {
    vec![google(), microsoft(), office365(), outlook_com()]
}
