use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::AUTHORIZATION, RequestBuilder};

use crate::credentials::Credentials;

/// `Authorization` header value for HTTP Basic auth.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Attaches the session's credentials to an outgoing request: a Basic-auth
/// header for username/password credentials, or the consumer key pair as
/// query parameters for the public API variant.
pub(crate) fn authorize(builder: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
    match credentials {
        Credentials::Basic {
            username, password, ..
        } => builder.header(AUTHORIZATION, basic_auth_header(username, password)),
        Credentials::ConsumerKey {
            consumer_key,
            consumer_secret,
            ..
        } => builder.query(&[
            ("consumer_key", consumer_key.as_str()),
            ("consumer_secret", consumer_secret.as_str()),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_basic_auth_header() {
        assert_eq!(
            basic_auth_header("Aladdin", "open sesame"),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn encodes_non_ascii_credentials_as_utf8() {
        let header = basic_auth_header("zoë", "pässword");
        let encoded = header.strip_prefix("Basic ").expect("scheme prefix");
        let decoded = STANDARD.decode(encoded).expect("base64");
        assert_eq!(String::from_utf8(decoded).expect("utf8"), "zoë:pässword");
    }
}
