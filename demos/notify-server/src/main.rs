use std::time::Duration;

use latchkey::prelude::*;
use serde::Serialize;

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_PASSWORD: &str = "demo-password";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Reads the four signing secrets through `lookup`, falling back to fixed
/// development values for any that are unset.
fn secrets_from(lookup: impl Fn(&str) -> Option<String>) -> Secrets {
    let read = |name: &str, dev: &str| {
        lookup(name).unwrap_or_else(|| {
            tracing::warn!(var = name, "unset, using a development secret");
            dev.to_string()
        })
    };
    Secrets {
        access: read("LATCHKEY_ACCESS_SECRET", "dev-access-secret-change-me-0123456789"),
        refresh: read("LATCHKEY_REFRESH_SECRET", "dev-refresh-secret-change-me-012345678"),
        cookie: read("LATCHKEY_COOKIE_SECRET", "dev-cookie-secret-change-me-0123456789"),
        handshake: read("LATCHKEY_HANDSHAKE_SECRET", "dev-handshake-secret-change-me-0123456"),
    }
}

fn demo_store() -> MemoryCredentialStore {
    MemoryCredentialStore::new(vec![CredentialRecord {
        user_id: UserId::new("1"),
        email: DEMO_EMAIL.into(),
        first_name: "Demo".into(),
        last_name: "User".into(),
        // Plain text: the demo verifier compares directly.
        password_hash: DEMO_PASSWORD.into(),
    }])
}

fn plain_verifier(plain: &str, stored: &str) -> bool {
    plain == stored
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Notification {
    kind: &'static str,
    seq: u64,
    body: String,
}

/// Pushes a numbered notification to `user` every `every`.
async fn push_loop(registry: std::sync::Arc<ConnectionRegistry>, user: UserId, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    let mut seq = 0u64;
    loop {
        ticker.tick().await;
        seq += 1;
        let note = Notification {
            kind: "heartbeat",
            seq,
            body: format!("notification #{seq}"),
        };
        let Ok(text) = serde_json::to_string(&note) else {
            continue;
        };
        match registry.send_to_user(&user, &text) {
            Ok(delivered) => tracing::info!(%user, seq, delivered, "pushed"),
            Err(RegistryError::NoActiveSession(_)) => tracing::debug!(%user, "nobody listening"),
            Err(e) => tracing::warn!(%user, error = %e, "push failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    latchkey::init_tracing();

    let bind = std::env::var("LATCHKEY_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let secrets = secrets_from(|name| std::env::var(name).ok());

    let server = LatchkeyServer::builder().bind(&bind).build(secrets).await?;
    let auth = server.auth(demo_store(), plain_verifier);

    // Log the demo user in once so there is a token to connect with.
    let mut exchange = MemoryExchange::new();
    let login = auth.login(DEMO_EMAIL, DEMO_PASSWORD, &mut exchange).await?;
    tracing::info!(
        addr = %server.local_addr()?,
        token = %login.handshake_token,
        "connect with ws://<addr>/?token=<token>"
    );

    tokio::spawn(push_loop(server.registry(), login.user_id, Duration::from_secs(10)));

    server.run().await?;
    Ok(())
}
