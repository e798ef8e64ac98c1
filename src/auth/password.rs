use super::AuthError;
use crate::config::AccountConfig;

/// Hash checked when the username is unknown so both failure paths cost the same
const DECOY_HASH: &str = "$2b$10$NWzRiiOWDLIQLlUzQpw0.uszLuACGYMBFaTAVFHCkXsgX/1aNxcUm";

/// bcrypt hash in the format stored in account config
pub fn hash(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// A malformed stored hash counts as a mismatch
pub fn verify(password: &str, stored_hash: &str) -> bool {
    match bcrypt::verify(password, stored_hash.trim()) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Unusable password hash in account config: {}", e);
            false
        }
    }
}

/// Find the account and check its password
pub fn authenticate<'a>(
    accounts: &'a [AccountConfig],
    username: &str,
    password: &str,
) -> Result<&'a AccountConfig, AuthError> {
    let account = accounts.iter().find(|a| a.username == username);

    match account {
        Some(account) if verify(password, &account.password_hash) => Ok(account),
        Some(_) => Err(AuthError::InvalidLogin),
        None => {
            let _ = bcrypt::verify(password, DECOY_HASH);
            Err(AuthError::InvalidLogin)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::types::Role;

    #[test]
    fn hash_then_verify() {
        let hashed = hash("correct horse", 4).unwrap();
        assert!(hashed.starts_with("$2b$04$"));
        assert!(verify("correct horse", &hashed));
        assert!(!verify("battery staple", &hashed));
    }

    #[test]
    fn authenticates_development_accounts() {
        let accounts = AppConfig::development().security.accounts;
        let admin = authenticate(&accounts, "admin", "admin-password").unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.subject(), "1");

        assert!(matches!(
            authenticate(&accounts, "admin", "wrong"),
            Err(AuthError::InvalidLogin)
        ));
        assert!(matches!(
            authenticate(&accounts, "nobody", "admin-password"),
            Err(AuthError::InvalidLogin)
        ));
    }

    #[test]
    fn malformed_hashes_never_match() {
        assert!(!verify("user-password", "not-a-bcrypt-hash"));
        assert!(!verify("", ""));
    }
}
