//! Sign-in and sign-out commands.

use anyhow::Result;
use console::style;
use serde_json::json;
use tungs_core::session::AuthOutcome;
use tungs_types::identity::{Identity, IdentityId};

use super::output::{outcome_name, print_json, print_session, session_json};
use crate::state::AppState;

/// Build the identity for `tungs login`.
///
/// Without an explicit id (or with `--local`) this is the email-only login.
pub fn login_identity(
    email: &str,
    id: Option<&str>,
    name: Option<&str>,
    local: bool,
) -> Result<Identity> {
    if email.trim().is_empty() {
        anyhow::bail!("email must not be empty");
    }
    match id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) if !local => Ok(Identity::new(
            IdentityId::new(id),
            email,
            name.unwrap_or_default(),
        )),
        _ => {
            let mut identity = Identity::local(email);
            if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
                identity.display_name = name.to_string();
            }
            Ok(identity)
        }
    }
}

/// Sign in and print the reconciled (or degraded) session.
pub async fn login(
    state: &AppState,
    email: &str,
    id: Option<&str>,
    name: Option<&str>,
    local: bool,
    json: bool,
) -> Result<()> {
    let identity = login_identity(email, id, name, local)?;
    tracing::debug!(identity_id = %identity.id, "signing in");

    let outcome = match state.engine.sign_in(identity).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if json {
                print_json(&json!({
                    "outcome": "failed",
                    "reason": e.reason(),
                    "message": e.to_string(),
                }))?;
            }
            return Err(e.into());
        }
    };

    if json {
        let mut value = json!({ "outcome": outcome_name(&outcome) });
        if let Some(session) = outcome.session() {
            value["session"] = session_json(session);
        }
        return print_json(&value);
    }

    println!();
    match &outcome {
        AuthOutcome::Ready(session) => {
            println!("  {} Signed in", style("✓").green().bold());
            println!();
            print_session(session);
        }
        AuthOutcome::Degraded(session) => {
            println!(
                "  {} Signed in offline; usage will sync when the backend is back",
                style("!").yellow().bold()
            );
            println!();
            print_session(session);
        }
        other => {
            println!("  Sign-in did not complete ({})", outcome_name(other));
        }
    }
    println!();
    Ok(())
}

/// Sign out at the identity provider and clear the local session.
pub async fn logout(state: &AppState, json: bool) -> Result<()> {
    let result = state.engine.logout().await;

    if json {
        let value = match &result {
            Ok(outcome) => json!({ "outcome": outcome_name(outcome) }),
            Err(e) => json!({
                "outcome": "cleared",
                "provider_error": e.to_string(),
            }),
        };
        print_json(&value)?;
        return result.map(|_| ()).map_err(Into::into);
    }

    match result {
        Ok(AuthOutcome::AlreadySignedOut) => {
            println!("  Not signed in.");
            Ok(())
        }
        Ok(_) => {
            println!("  {} Signed out", style("✓").green().bold());
            Ok(())
        }
        Err(e) => {
            println!(
                "  {} Local session cleared, but the identity provider reported an error",
                style("!").yellow().bold()
            );
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_with_explicit_id() {
        let identity = login_identity("ada@example.com", Some("u1"), Some("Ada"), false).unwrap();
        assert_eq!(identity.id.as_str(), "u1");
        assert_eq!(identity.display_name, "Ada");
    }

    #[test]
    fn missing_id_falls_back_to_local_login() {
        let identity = login_identity("Ada@Example.com", None, None, false).unwrap();
        assert_eq!(identity.id.as_str(), "local:ada@example.com");
        assert_eq!(identity.display_name, "ada");

        let identity = login_identity("ada@example.com", Some("  "), None, false).unwrap();
        assert!(identity.id.is_local());
    }

    #[test]
    fn local_login_keeps_given_name() {
        let identity = login_identity("ada@example.com", None, Some("Ada L"), true).unwrap();
        assert!(identity.id.is_local());
        assert_eq!(identity.display_name, "Ada L");
    }

    #[test]
    fn empty_email_is_rejected() {
        assert!(login_identity("  ", Some("u1"), None, false).is_err());
    }
}
