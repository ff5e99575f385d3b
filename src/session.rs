use crate::{
    error::ConsoleError,
    printer_client::{ConsolePage, ConsoleTransport, DeviceEndpoint},
};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;

/// Substring the console embeds in an otherwise successful (HTTP 200) login
/// response when the credentials were wrong. There is no status-code signal.
pub const AUTH_FAILURE_MARKER: &str = "Incorrect password";

/// Positional field index the login form uses for the username.
const USERNAME_FIELD: &str = "0";
/// Positional field index the login form uses for the password.
const PASSWORD_FIELD: &str = "1";

#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// Field combinations the login form is retried with.
///
/// Firmware revisions disagree on which fields the login form requires, so a
/// run walks a fixed ladder until one combination is accepted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialVariant {
    PasswordOnly,
    UsernameOnly,
    Both,
}

impl CredentialVariant {
    /// Ladder order, most common firmware first.
    pub const NEGOTIATION_ORDER: [CredentialVariant; 3] = [
        CredentialVariant::PasswordOnly,
        CredentialVariant::UsernameOnly,
        CredentialVariant::Both,
    ];

    pub fn form_fields(&self, credentials: &Credentials) -> Vec<(String, String)> {
        let username = (USERNAME_FIELD.to_string(), credentials.username.clone());
        let password = (PASSWORD_FIELD.to_string(), credentials.password.clone());

        match self {
            CredentialVariant::PasswordOnly => vec![password],
            CredentialVariant::UsernameOnly => vec![username],
            CredentialVariant::Both => vec![username, password],
        }
    }
}

impl fmt::Display for CredentialVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CredentialVariant::PasswordOnly => "password-only",
            CredentialVariant::UsernameOnly => "username-only",
            CredentialVariant::Both => "username-and-password",
        };
        write!(f, "{label}")
    }
}

/// Authenticated console session for one configuration run.
///
/// The adopted variant is fixed for the rest of the run; the console keeps the
/// session alive via cookies, so no step re-negotiates.
#[derive(Debug)]
pub struct DeviceSession {
    pub variant: CredentialVariant,
    pub login_response: String,
}

/// Log in to the console, walking the credential ladder in order.
///
/// A device rejection (failure marker or non-2xx status) moves on to the next
/// variant; a transport failure aborts the whole negotiation since retrying an
/// unreachable printer with different fields cannot succeed.
pub async fn login<T: ConsoleTransport>(
    transport: &T,
    endpoint: &DeviceEndpoint,
    credentials: &Credentials,
) -> Result<DeviceSession, ConsoleError> {
    let url = endpoint.url_for(ConsolePage::Settings);
    let mut last_rejection = String::new();

    for variant in CredentialVariant::NEGOTIATION_ORDER {
        debug!("attempting login with variant {variant}");

        let response = transport
            .post_form(&url, &variant.form_fields(credentials))
            .await?;

        if !response.is_success() {
            warn!("login variant {variant} answered status {}", response.status);
            last_rejection = format!("variant {variant} answered status {}", response.status);
            continue;
        }

        if response.body.contains(AUTH_FAILURE_MARKER) {
            debug!("login variant {variant} rejected by device");
            last_rejection = format!("variant {variant} rejected with {AUTH_FAILURE_MARKER:?}");
            continue;
        }

        info!("login accepted with variant {variant}");
        return Ok(DeviceSession {
            variant,
            login_response: response.body,
        });
    }

    Err(ConsoleError::AuthFailure {
        detail: last_rejection,
    })
}
