//! Plaintext vault records as the user sees them.
//!
//! These types only ever exist on the client. Before anything leaves the
//! device each sensitive field goes through the codec.

use serde::{Deserialize, Serialize};
use std::fmt;

use cipherkeep_common::validation::{
    exceeds, is_blank, MAX_CARD_CVV_LENGTH, MAX_CARD_NUMBER_LENGTH, MAX_USERNAME_LENGTH,
};
use cipherkeep_common::{RecordId, ValidationError};

/// Account credentials used for sign-up and sign-in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields must be non-blank and the username at most 64 characters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.username) || is_blank(&self.password) {
            return Err(ValidationError::CredentialsEmpty);
        }
        if exceeds(&self.username, MAX_USERNAME_LENGTH) {
            return Err(ValidationError::UsernameTooLong);
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A stored website or application login.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Login {
    pub id: RecordId,
    pub username: String,
    pub password: String,
    pub note: String,
}

impl Login {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.username) {
            return Err(ValidationError::LoginUsernameEmpty);
        }
        if is_blank(&self.password) {
            return Err(ValidationError::LoginPasswordEmpty);
        }
        if exceeds(&self.username, MAX_USERNAME_LENGTH) {
            return Err(ValidationError::UsernameTooLong);
        }
        if is_blank(&self.note) {
            return Err(ValidationError::MetainfoEmpty);
        }
        Ok(())
    }
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// A stored bank card.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Card {
    pub id: RecordId,
    pub bank: String,
    pub number: String,
    pub expiry: String,
    pub cvv: String,
    pub note: String,
}

impl Card {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.bank) {
            return Err(ValidationError::CardBankEmpty);
        }
        if is_blank(&self.number) {
            return Err(ValidationError::CardNumberEmpty);
        }
        if exceeds(&self.number, MAX_CARD_NUMBER_LENGTH) {
            return Err(ValidationError::CardNumberTooLong);
        }
        if is_blank(&self.expiry) {
            return Err(ValidationError::CardDateEmpty);
        }
        if is_blank(&self.cvv) {
            return Err(ValidationError::CardCvvEmpty);
        }
        if exceeds(&self.cvv, MAX_CARD_CVV_LENGTH) {
            return Err(ValidationError::CardCvvTooLong);
        }
        if is_blank(&self.note) {
            return Err(ValidationError::MetainfoEmpty);
        }
        Ok(())
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("id", &self.id)
            .field("bank", &self.bank)
            .field("number", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Metadata of a stored file. The content travels separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecord {
    pub id: RecordId,
    /// Display name, usually the original file name.
    pub name: String,
    pub note: String,
}

impl FileRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.note) {
            return Err(ValidationError::MetainfoEmpty);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> Card {
        Card {
            id: RecordId::NEW,
            bank: "Good bank".into(),
            number: "4111111111111111".into(),
            expiry: "12/24".into(),
            cvv: "123".into(),
            note: "This is test message".into(),
        }
    }

    fn login() -> Login {
        Login {
            id: RecordId::NEW,
            username: "mark".into(),
            password: "secret".into(),
            note: "secret message".into(),
        }
    }

    #[test]
    fn test_card_valid() {
        assert_eq!(card().validate(), Ok(()));
    }

    #[test]
    fn test_card_rules_in_order() {
        let cases = [
            (
                Card {
                    bank: "".into(),
                    note: "x".into(),
                    ..card()
                },
                ValidationError::CardBankEmpty,
            ),
            (
                Card {
                    number: " ".into(),
                    ..card()
                },
                ValidationError::CardNumberEmpty,
            ),
            (
                Card {
                    number: "41111111111111111111".into(),
                    ..card()
                },
                ValidationError::CardNumberTooLong,
            ),
            (
                Card {
                    expiry: "".into(),
                    ..card()
                },
                ValidationError::CardDateEmpty,
            ),
            (
                Card {
                    cvv: "".into(),
                    ..card()
                },
                ValidationError::CardCvvEmpty,
            ),
            (
                Card {
                    cvv: "1234".into(),
                    ..card()
                },
                ValidationError::CardCvvTooLong,
            ),
            (
                Card {
                    note: "".into(),
                    ..card()
                },
                ValidationError::MetainfoEmpty,
            ),
        ];

        for (card, expected) in cases {
            assert_eq!(card.validate(), Err(expected), "{:?}", card);
        }
    }

    #[test]
    fn test_card_nineteen_digits_is_fine() {
        let c = Card {
            number: "4".repeat(19),
            ..card()
        };
        assert_eq!(c.validate(), Ok(()));
    }

    #[test]
    fn test_login_rules() {
        assert_eq!(login().validate(), Ok(()));
        assert_eq!(
            Login {
                password: "".into(),
                ..login()
            }
            .validate(),
            Err(ValidationError::LoginPasswordEmpty)
        );
        assert_eq!(
            Login {
                username: "".into(),
                ..login()
            }
            .validate(),
            Err(ValidationError::LoginUsernameEmpty)
        );
        assert_eq!(
            Login {
                note: "".into(),
                ..login()
            }
            .validate(),
            Err(ValidationError::MetainfoEmpty)
        );
        assert_eq!(
            Login {
                username: "longusername".repeat(6),
                ..login()
            }
            .validate(),
            Err(ValidationError::UsernameTooLong)
        );
    }

    #[test]
    fn test_file_requires_note() {
        let mut file = FileRecord {
            note: "this is test file".into(),
            ..Default::default()
        };
        assert_eq!(file.validate(), Ok(()));
        file.note.clear();
        assert_eq!(file.validate(), Err(ValidationError::MetainfoEmpty));
    }

    #[test]
    fn test_credentials_rules() {
        assert_eq!(Credentials::new("mark", "secret").validate(), Ok(()));
        for (user, pass) in [("mark", ""), ("", "secret"), ("", "")] {
            assert_eq!(
                Credentials::new(user, pass).validate(),
                Err(ValidationError::CredentialsEmpty)
            );
        }
        assert_eq!(
            Credentials::new("longusername".repeat(6), "secret").validate(),
            Err(ValidationError::UsernameTooLong)
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let shown = format!("{:?} {:?} {:?}", login(), card(), Credentials::new("u", "pw-123"));
        assert!(!shown.contains("secret"));
        assert!(!shown.contains("4111111111111111"));
        assert!(!shown.contains("pw-123"));
    }
}
