//! User records, owned by the auth subsystem but referenced by the voting and
//! moderation operations.

use std::fmt;

/// User moderation status. Stored as a SMALLINT in the `users` collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum UserStatus {
    NotEnabled,
    Enabled,
    Admin,
}

impl UserStatus {
    pub fn as_i16(&self) -> i16 {
        match self {
            UserStatus::NotEnabled => 0,
            UserStatus::Enabled => 1,
            UserStatus::Admin => 2,
        }
    }

    pub fn from_i16(code: i16) -> Option<Self> {
        match code {
            0 => Some(UserStatus::NotEnabled),
            1 => Some(UserStatus::Enabled),
            2 => Some(UserStatus::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UserStatus::NotEnabled => "not-enabled",
            UserStatus::Enabled => "enabled",
            UserStatus::Admin => "admin",
        };
        write!(f, "{}", label)
    }
}

/// An application user. The password never leaves the store layer.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub name: String,
    pub surname: String,
    pub status: UserStatus,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        name: impl Into<String>,
        surname: impl Into<String>,
        status: UserStatus,
    ) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
            surname: surname.into(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_roundtrip() {
        for status in [UserStatus::NotEnabled, UserStatus::Enabled, UserStatus::Admin] {
            assert_eq!(UserStatus::from_i16(status.as_i16()), Some(status));
        }
        assert_eq!(UserStatus::from_i16(9), None);
    }
}
