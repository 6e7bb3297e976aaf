//! End-to-end session flow driven by a manual clock.
//!
//! Plays the browser with `MemoryExchange::next_request`: every cookie the
//! server writes is carried into the next request, cleared cookies are
//! dropped from the jar.

use std::sync::Arc;

use latchkey_session::{
    AuthOutcome, CookieExchange, HandshakeAuthorizer, HandshakeConfig, MemoryExchange, Secrets,
    SessionConfig, SessionManager,
};
use latchkey_token::{ClaimSet, ManualClock, UserId};
use latchkey_transport::HandshakeRequest;

const START: i64 = 1_700_000_000;

fn secrets() -> Secrets {
    Secrets {
        access: "access-secret-0123456789abcdefghijkl".into(),
        refresh: "refresh-secret-0123456789abcdefghijk".into(),
        cookie: "cookie-secret-0123456789abcdefghijkl".into(),
        handshake: "handshake-secret-0123456789abcdefgh".into(),
    }
}

fn base_claims() -> ClaimSet {
    ClaimSet::new()
        .with("userId", "42")
        .with("email", "ada@example.com")
        .with("firstName", "Ada")
        .with("lastName", "Lovelace")
}

#[test]
fn test_session_survives_access_expiry_through_rotation() {
    let clock = Arc::new(ManualClock::new(START));
    let sessions = SessionManager::new(SessionConfig::default(), &secrets(), clock.clone()).unwrap();

    // Login: both cookies issued with their configured lifetimes.
    let mut login = MemoryExchange::new();
    sessions.login(&base_claims(), &mut login).unwrap();
    let headers = login.set_cookie_headers();
    assert_eq!(headers.len(), 2);
    assert!(headers[0].starts_with("access_token="));
    assert!(headers[0].contains("Max-Age=300"));
    assert!(headers[0].contains("HttpOnly"));
    assert!(headers[0].contains("Secure"));
    assert!(headers[0].contains("Path=/"));
    assert!(headers[1].starts_with("refresh_token="));
    assert!(headers[1].contains("Max-Age=604800"));

    // Within the access lifetime: authenticated, nothing written.
    let mut request = login.next_request();
    clock.advance(120);
    assert!(matches!(
        sessions.authenticate(&mut request),
        AuthOutcome::Authenticated { .. }
    ));
    assert!(request.written().is_empty());

    // 301s after login the access token is dead; the refresh path fires.
    let mut request = request.next_request();
    clock.set(START + 301);
    let outcome = sessions.authenticate(&mut request);
    assert!(matches!(outcome, AuthOutcome::Refreshed { .. }));
    assert_eq!(outcome.user_id(), Some(UserId::new("42")));
    assert_eq!(request.written().len(), 2);
    let claims = outcome.claims().unwrap();
    assert_eq!(claims.get_str("firstName"), Some("Ada"));
    assert_eq!(claims.get_str("lastName"), Some("Lovelace"));

    // The rotated pair authenticates on its own.
    let mut request = request.next_request();
    let outcome = sessions.authenticate(&mut request);
    assert!(matches!(outcome, AuthOutcome::Authenticated { .. }));
    assert_eq!(outcome.user_id(), Some(UserId::new("42")));

    // Logout clears the jar; the next request is unauthenticated.
    sessions.logout(&mut request);
    let mut request = request.next_request();
    assert!(request.request_cookie("access_token").is_none());
    assert!(!sessions.authenticate(&mut request).is_authenticated());
    assert!(request.written().is_empty());
}

#[test]
fn test_refresh_lifetime_bounds_the_session() {
    let clock = Arc::new(ManualClock::new(START));
    let sessions = SessionManager::new(SessionConfig::default(), &secrets(), clock.clone()).unwrap();
    let mut login = MemoryExchange::new();
    sessions.login(&base_claims(), &mut login).unwrap();
    let stale = login.next_request();

    clock.advance(604_799);
    let mut almost = stale.clone();
    assert!(sessions.authenticate(&mut almost).is_authenticated());

    clock.advance(1);
    let mut expired = stale.clone();
    let outcome = sessions.authenticate(&mut expired);
    assert!(matches!(outcome, AuthOutcome::Unauthenticated { .. }));
    assert!(expired.written().is_empty());
}

#[test]
fn test_cookie_header_round_trip_through_parser() {
    let clock = Arc::new(ManualClock::new(START));
    let sessions = SessionManager::new(SessionConfig::default(), &secrets(), clock).unwrap();
    let mut login = MemoryExchange::new();
    let pair = sessions.login(&base_claims(), &mut login).unwrap();

    let header = format!(
        "theme=dark; access_token={}; refresh_token={}",
        pair.access, pair.refresh
    );
    let mut request = MemoryExchange::from_cookie_header(&header);
    assert!(matches!(
        sessions.authenticate(&mut request),
        AuthOutcome::Authenticated { .. }
    ));
}

#[test]
fn test_session_identity_opens_a_channel() {
    let clock = Arc::new(ManualClock::new(START));
    let sessions = SessionManager::new(SessionConfig::default(), &secrets(), clock.clone()).unwrap();
    let handshakes =
        HandshakeAuthorizer::new(&secrets().handshake, HandshakeConfig::default(), clock.clone())
            .unwrap();

    let mut login = MemoryExchange::new();
    sessions.login(&base_claims(), &mut login).unwrap();

    // A refresh-path request can still mint a handshake token.
    clock.advance(400);
    let mut request = login.next_request();
    let user = sessions.authenticate(&mut request).user_id().unwrap();
    let token = handshakes.issue(&user).unwrap();

    let upgrade = HandshakeRequest::new(Some(format!("token={token}")), vec![]);
    assert_eq!(handshakes.authorize(&upgrade).unwrap(), user);

    clock.advance(5);
    assert!(handshakes.authorize(&upgrade).is_err());
}
