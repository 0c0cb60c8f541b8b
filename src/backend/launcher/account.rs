//! Player accounts as seen by the launch command.
//!
//! Accounts are opaque credential records: authenticating them is the
//! caller's business.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access token passed for offline play.
pub const OFFLINE_TOKEN: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    #[default]
    Offline,
    Microsoft,
    #[serde(rename = "tlauncher")]
    TLauncher,
}

impl AccountKind {
    /// Value of `${user_type}`.
    pub const fn user_type(self) -> &'static str {
        match self {
            Self::Microsoft => "msa",
            Self::Offline | Self::TLauncher => "legacy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "type", default)]
    pub kind: AccountKind,
    pub username: String,
    pub uuid: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl Account {
    /// Offline account with the name-based (v3, DNS namespace) UUID of `username`.
    pub fn offline(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            kind: AccountKind::Offline,
            uuid: offline_uuid(&username),
            username,
            token: None,
        }
    }

    pub fn user_type(&self) -> &'static str {
        self.kind.user_type()
    }

    /// Token for `${auth_access_token}`; offline accounts always use `"0"`.
    pub fn access_token(&self) -> &str {
        match (self.kind, self.token.as_deref()) {
            (AccountKind::Offline, _) | (_, None) => OFFLINE_TOKEN,
            (_, Some(token)) => token,
        }
    }
}

pub fn offline_uuid(username: &str) -> String {
    Uuid::new_v3(&Uuid::NAMESPACE_DNS, username.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_uuid_is_deterministic_v3() {
        let first = Account::offline("Steve");
        let second = Account::offline("Steve");
        assert_eq!(first.uuid, second.uuid);
        assert_ne!(first.uuid, Account::offline("Alex").uuid);

        let parsed = Uuid::parse_str(&first.uuid).unwrap();
        assert_eq!(parsed.get_version_num(), 3);
    }

    #[test]
    fn offline_accounts_use_placeholder_token() {
        let mut account = Account::offline("Steve");
        account.token = Some("secret".into());
        assert_eq!(account.access_token(), "0");
        assert_eq!(account.user_type(), "legacy");
    }

    #[test]
    fn microsoft_accounts_pass_their_token() {
        let account = Account {
            kind: AccountKind::Microsoft,
            username: "Steve".into(),
            uuid: "u".into(),
            token: Some("ey...".into()),
        };
        assert_eq!(account.access_token(), "ey...");
        assert_eq!(account.user_type(), "msa");
    }

    #[test]
    fn kind_deserializes_from_lowercase() {
        let account: Account =
            serde_json::from_str(r#"{"type": "tlauncher", "username": "a", "uuid": "b"}"#)
                .unwrap();
        assert_eq!(account.kind, AccountKind::TLauncher);
        assert_eq!(account.access_token(), "0");
    }
}
