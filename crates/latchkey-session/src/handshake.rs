//! Channel-open authorization.
//!
//! A client that wants a channel first gets a short-lived handshake token
//! (from login or from a refresh call) and presents it when opening the
//! channel, either as a query parameter or as a bearer header. The query
//! parameter wins when both are present.

use std::borrow::Cow;
use std::sync::Arc;

use latchkey_token::{ClaimSet, Clock, SignatureService, Token, TokenCodec, UserId};
use latchkey_transport::HandshakeRequest;
use serde::Deserialize;

use crate::SessionError;

const BEARER_PREFIX: &str = "Bearer ";

/// Handshake token settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Lifetime of a handshake token. Default: 5 seconds.
    pub token_ttl_secs: u64,
    /// Query parameter carrying the token. Default: `token`.
    pub query_param: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 5,
            query_param: "token".to_string(),
        }
    }
}

/// Mints handshake tokens and checks them at channel-open time.
#[derive(Debug, Clone)]
pub struct HandshakeAuthorizer {
    codec: TokenCodec,
    config: HandshakeConfig,
}

impl HandshakeAuthorizer {
    /// # Errors
    /// Returns [`SessionError::Token`] if `secret` is too short.
    pub fn new(
        secret: &str,
        config: HandshakeConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let codec = TokenCodec::new(SignatureService::new(secret)?, clock);
        Ok(Self { codec, config })
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Mints a handshake token carrying `userId`.
    pub fn issue(&self, user_id: &UserId) -> Result<Token, SessionError> {
        let claims = ClaimSet::new().with("userId", user_id.as_str());
        Ok(self.codec.encode(&claims, self.config.token_ttl_secs)?)
    }

    /// Checks the token on an upgrade request and returns whose it is.
    ///
    /// # Errors
    /// [`SessionError::HandshakeRejected`] when no token is present, when it
    /// fails to decode, when it has expired, or when it names no user.
    pub fn authorize(&self, request: &HandshakeRequest) -> Result<UserId, SessionError> {
        let token = self.extract_token(request)?;
        let claims = self
            .codec
            .verify(&token)
            .map_err(|e| SessionError::HandshakeRejected(e.to_string()))?;
        let user_id = claims
            .user_id()
            .ok_or_else(|| SessionError::HandshakeRejected("token names no user".into()))?;
        tracing::debug!(%user_id, "handshake authorized");
        Ok(user_id)
    }

    fn extract_token<'a>(
        &self,
        request: &'a HandshakeRequest,
    ) -> Result<Cow<'a, str>, SessionError> {
        if let Some(token) = request.query_param(&self.config.query_param) {
            if token.is_empty() {
                return Err(SessionError::HandshakeRejected("empty token".into()));
            }
            return Ok(token);
        }
        match request.header("authorization") {
            Some(value) => match value.strip_prefix(BEARER_PREFIX) {
                Some(token) if !token.is_empty() => Ok(Cow::Borrowed(token)),
                _ => Err(SessionError::HandshakeRejected(
                    "malformed authorization header".into(),
                )),
            },
            None => Err(SessionError::HandshakeRejected("missing token".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use latchkey_token::ManualClock;

    use super::*;

    const SECRET: &str = "handshake-secret-0123456789abcdefgh";

    fn authorizer() -> (HandshakeAuthorizer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let auth = HandshakeAuthorizer::new(SECRET, HandshakeConfig::default(), clock.clone())
            .unwrap();
        (auth, clock)
    }

    fn query(token: &str) -> HandshakeRequest {
        HandshakeRequest::new(Some(format!("token={token}")), vec![])
    }

    fn rejected(result: Result<UserId, SessionError>) -> bool {
        matches!(result, Err(SessionError::HandshakeRejected(_)))
    }

    #[test]
    fn test_authorize_query_token_returns_user() {
        let (auth, _) = authorizer();
        let token = auth.issue(&UserId::new("7")).unwrap();

        let user = auth.authorize(&query(token.as_str())).unwrap();
        assert_eq!(user, UserId::new("7"));
    }

    #[test]
    fn test_authorize_bearer_header_returns_user() {
        let (auth, _) = authorizer();
        let token = auth.issue(&UserId::new("7")).unwrap();
        let req = HandshakeRequest::default()
            .with_header("Authorization", format!("Bearer {}", token.as_str()));

        assert_eq!(auth.authorize(&req).unwrap(), UserId::new("7"));
    }

    #[test]
    fn test_authorize_query_takes_precedence_over_header() {
        let (auth, _) = authorizer();
        let from_query = auth.issue(&UserId::new("query-user")).unwrap();
        let from_header = auth.issue(&UserId::new("header-user")).unwrap();
        let req = query(from_query.as_str())
            .with_header("Authorization", format!("Bearer {}", from_header.as_str()));

        assert_eq!(auth.authorize(&req).unwrap(), UserId::new("query-user"));
    }

    #[test]
    fn test_authorize_bad_query_token_does_not_fall_back_to_header() {
        let (auth, _) = authorizer();
        let good = auth.issue(&UserId::new("7")).unwrap();
        let req = query("garbage").with_header("Authorization", format!("Bearer {}", good.as_str()));

        assert!(rejected(auth.authorize(&req)));
    }

    #[test]
    fn test_authorize_missing_token_rejected() {
        let (auth, _) = authorizer();
        assert!(rejected(auth.authorize(&HandshakeRequest::default())));
    }

    #[test]
    fn test_authorize_empty_query_token_rejected() {
        let (auth, _) = authorizer();
        assert!(rejected(auth.authorize(&query(""))));
    }

    #[test]
    fn test_authorize_header_without_bearer_prefix_rejected() {
        let (auth, _) = authorizer();
        let token = auth.issue(&UserId::new("7")).unwrap();
        let req = HandshakeRequest::default().with_header("Authorization", token.as_str());
        assert!(rejected(auth.authorize(&req)));
    }

    #[test]
    fn test_authorize_expired_token_rejected() {
        let (auth, clock) = authorizer();
        let token = auth.issue(&UserId::new("7")).unwrap();
        clock.advance(5);

        assert!(rejected(auth.authorize(&query(token.as_str()))));
    }

    #[test]
    fn test_authorize_token_from_other_secret_rejected() {
        let (auth, clock) = authorizer();
        let other =
            HandshakeAuthorizer::new("other-secret-0123456789abcdefghijklm", HandshakeConfig::default(), clock)
                .unwrap();
        let token = other.issue(&UserId::new("7")).unwrap();

        assert!(rejected(auth.authorize(&query(token.as_str()))));
    }

    #[test]
    fn test_authorize_numeric_user_id_accepted() {
        let clock = Arc::new(ManualClock::new(1_000));
        let codec = TokenCodec::new(SignatureService::new(SECRET).unwrap(), clock.clone());
        let token = codec
            .encode(&ClaimSet::new().with("userId", 99_i64), 5)
            .unwrap();
        let auth = HandshakeAuthorizer::new(SECRET, HandshakeConfig::default(), clock).unwrap();

        assert_eq!(auth.authorize(&query(token.as_str())).unwrap(), UserId::new("99"));
    }

    #[test]
    fn test_authorize_token_without_user_rejected() {
        let clock = Arc::new(ManualClock::new(1_000));
        let codec = TokenCodec::new(SignatureService::new(SECRET).unwrap(), clock.clone());
        let token = codec
            .encode(&ClaimSet::new().with("email", "x@example.com"), 5)
            .unwrap();
        let auth = HandshakeAuthorizer::new(SECRET, HandshakeConfig::default(), clock).unwrap();

        assert!(rejected(auth.authorize(&query(token.as_str()))));
    }

    #[test]
    fn test_authorize_percent_encoded_query_token_accepted() {
        let (auth, _) = authorizer();
        let token = auth.issue(&UserId::new("7")).unwrap();
        let encoded = token.as_str().replace('.', "%2E");

        assert_eq!(auth.authorize(&query(&encoded)).unwrap(), UserId::new("7"));
    }

    #[test]
    fn test_authorize_custom_query_param_is_used() {
        let clock = Arc::new(ManualClock::new(1_000));
        let config = HandshakeConfig {
            query_param: "t".into(),
            ..Default::default()
        };
        let auth = HandshakeAuthorizer::new(SECRET, config, clock).unwrap();
        let token = auth.issue(&UserId::new("7")).unwrap();
        let req = HandshakeRequest::new(Some(format!("t={}", token.as_str())), vec![]);

        assert_eq!(auth.authorize(&req).unwrap(), UserId::new("7"));
    }
}
