//! Routing tokens and the reserved control sentinels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value returned by a step to select what runs next.
///
/// The four sentinels are a closed set; every other string is a [Token::Label]
/// resolved by the interpreter (a conditional mapping key, a function id, or a
/// key in a function's routing metadata).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Token {
  /// Restart from the first registered function.
  Init,
  /// Advance to the normal successor.
  Next,
  /// Stop the run.
  Return,
  /// Finish a streamed step and advance to the normal successor.
  Continue,
  Label(String),
}

impl Token {
  pub const INIT: &'static str = "init";
  pub const NEXT: &'static str = "next";
  pub const RETURN: &'static str = "return";
  pub const CONTINUE: &'static str = "continue";

  pub fn label(s: impl Into<String>) -> Self {
    Token::Label(s.into())
  }

  pub fn as_str(&self) -> &str {
    match self {
      Token::Init => Self::INIT,
      Token::Next => Self::NEXT,
      Token::Return => Self::RETURN,
      Token::Continue => Self::CONTINUE,
      Token::Label(s) => s,
    }
  }

  pub fn is_sentinel(&self) -> bool {
    !matches!(self, Token::Label(_))
  }

  /// True for the tokens that mean "take the normal successor".
  pub fn is_advance(&self) -> bool {
    matches!(self, Token::Next | Token::Continue)
  }

  pub fn is_reserved(s: &str) -> bool {
    Token::from(s).is_sentinel()
  }
}

impl From<&str> for Token {
  fn from(s: &str) -> Self {
    match s {
      Self::INIT => Token::Init,
      Self::NEXT => Token::Next,
      Self::RETURN => Token::Return,
      Self::CONTINUE => Token::Continue,
      other => Token::Label(other.to_string()),
    }
  }
}

impl From<String> for Token {
  fn from(s: String) -> Self {
    match Token::from(s.as_str()) {
      Token::Label(_) => Token::Label(s),
      sentinel => sentinel,
    }
  }
}

impl From<Token> for String {
  fn from(t: Token) -> Self {
    match t {
      Token::Label(s) => s,
      other => other.as_str().to_string(),
    }
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
