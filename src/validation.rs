//! Validation of user supplied input
//!
//! Bot tokens are checked in two stages. The syntactic check here is cheap
//! and local; tokens that pass it are then verified against the Bot API by the
//! gateway (see [`crate::gateway::MessagingGateway::fetch_bot_identity`]).

/// Minimum length of a plausible bot token, separator included
pub const MIN_TOKEN_LENGTH: usize = 40;

/// Separator between the bot id and the secret part of a token
pub const TOKEN_SEPARATOR: char = ':';

/// Why a token was rejected before reaching the Bot API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFormatError {
    MissingSeparator,
    TooShort,
}

impl std::fmt::Display for TokenFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenFormatError::MissingSeparator => write!(f, "token has no '{}'", TOKEN_SEPARATOR),
            TokenFormatError::TooShort => {
                write!(f, "token is shorter than {} characters", MIN_TOKEN_LENGTH)
            }
        }
    }
}

/// Check the shape of a bot token submitted by a user
///
/// # Returns
/// * `Ok(&str)` - The trimmed token
/// * `Err(TokenFormatError)` - The first rule the token breaks
///
/// # Examples
/// ```
/// use clone_relay_bot::validation::{validate_token_format, TokenFormatError};
///
/// let token = "123456:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
/// assert_eq!(validate_token_format(&format!("  {token}\n")), Ok(token));
/// assert_eq!(validate_token_format("123456:short"), Err(TokenFormatError::TooShort));
/// ```
pub fn validate_token_format(input: &str) -> Result<&str, TokenFormatError> {
    let token = input.trim();

    if !token.contains(TOKEN_SEPARATOR) {
        return Err(TokenFormatError::MissingSeparator);
    }

    if token.chars().count() < MIN_TOKEN_LENGTH {
        return Err(TokenFormatError::TooShort);
    }

    Ok(token)
}
