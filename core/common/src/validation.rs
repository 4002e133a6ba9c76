//! Validation failures shared by client and server.
//!
//! The same rule always produces the same variant on both ends, so a
//! rejection can be shown to the user without interpretation.

use thiserror::Error;

/// Maximum length of an account or login username.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Maximum length of a card number.
pub const MAX_CARD_NUMBER_LENGTH: usize = 19;

/// Maximum length of a card verification code.
pub const MAX_CARD_CVV_LENGTH: usize = 3;

/// A required field is blank or a field is too long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("username and/or password empty")]
    CredentialsEmpty,
    #[error("username length is more than {} characters", MAX_USERNAME_LENGTH)]
    UsernameTooLong,

    #[error("username empty")]
    LoginUsernameEmpty,
    #[error("password empty")]
    LoginPasswordEmpty,

    #[error("bank empty")]
    CardBankEmpty,
    #[error("number empty")]
    CardNumberEmpty,
    #[error("number length is more than {} characters", MAX_CARD_NUMBER_LENGTH)]
    CardNumberTooLong,
    #[error("date empty")]
    CardDateEmpty,
    #[error("cvv empty")]
    CardCvvEmpty,
    #[error("cvv length is more than {} characters", MAX_CARD_CVV_LENGTH)]
    CardCvvTooLong,

    #[error("file path empty")]
    FilePathEmpty,
    #[error("name empty")]
    FileNameEmpty,

    #[error("metainfo empty")]
    MetainfoEmpty,
}

/// Whether a field is empty or whitespace-only.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Whether a field exceeds `max` characters.
pub fn exceeds(value: &str, max: usize) -> bool {
    value.chars().count() > max
}
