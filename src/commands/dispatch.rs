//! Classifies a normalized message body into exactly one command.
//!
//! Order matters and mirrors the reply vocabulary users already know:
//! embedded dice expressions win over everything, then the yes/no trigger,
//! then the first bracketed token checked against the fixed vocabulary.
//! Unknown tokens are silently ignored — no reply, no error.

use regex::Regex;

use crate::commands::dice::{self, DiceExpr};

/// Exploration token prefix, argument follows the slash.
const EXPLORE_PREFIX: &str = "탐색/";

/// A classified command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// All dice expressions found in the message, in order.
    Dice(Vec<DiceExpr>),
    /// Yes/no oracle.
    Oracle,
    /// Attendance check-in.
    Attendance,
    /// Exploration with its raw path argument.
    Explore(String),
    /// Event participation confirmation.
    Confirm,
}

/// Message classifier with its compiled patterns.
pub struct Dispatcher {
    bracket_re: Regex,
    yn_re: Regex,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            bracket_re: Regex::new(r"\[(.*?)\]").unwrap(),
            yn_re: Regex::new(r"(?i)\[\s*yn\s*\]|\byn\b").unwrap(),
        }
    }

    /// Classify a plain-text body. `None` means no reply at all.
    pub fn classify(&self, text: &str) -> Option<Command> {
        // 1) Any embedded [NdM±K] wins, all expressions evaluated.
        let exprs = dice::parse(text);
        if !exprs.is_empty() {
            return Some(Command::Dice(exprs));
        }

        // 2) Yes/no trigger, bracketed or bare, case-insensitive.
        if self.yn_re.is_match(text) {
            return Some(Command::Oracle);
        }

        // 3) First bracketed token against the fixed vocabulary.
        let token = self.bracket_re.captures(text)?.get(1)?.as_str().trim();
        if dice::is_bare_expression(token) {
            return Some(Command::Dice(dice::parse(&format!("[{token}]"))));
        }
        if token.eq_ignore_ascii_case("yn") {
            return Some(Command::Oracle);
        }
        match token {
            "출석" => Some(Command::Attendance),
            "참여 확인" => Some(Command::Confirm),
            t if t.starts_with(EXPLORE_PREFIX) => {
                Some(Command::Explore(t[EXPLORE_PREFIX.len()..].trim().to_string()))
            }
            _ => None,
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Option<Command> {
        Dispatcher::new().classify(text)
    }

    #[test]
    fn dice_anywhere_wins() {
        match classify("@bot please [2d6] and [1d4+1]").unwrap() {
            Command::Dice(exprs) => assert_eq!(exprs.len(), 2),
            other => panic!("expected Dice, got {other:?}"),
        }
    }

    #[test]
    fn dice_beats_oracle_when_both_present() {
        assert!(matches!(
            classify("[yn] or maybe [2d6]").unwrap(),
            Command::Dice(_)
        ));
    }

    #[test]
    fn oracle_triggers() {
        assert!(matches!(classify("[YN]").unwrap(), Command::Oracle));
        assert!(matches!(classify("[ yn ]").unwrap(), Command::Oracle));
        assert!(matches!(classify("hmm YN?").unwrap(), Command::Oracle));
        assert!(matches!(classify("yn").unwrap(), Command::Oracle));
    }

    #[test]
    fn bare_dice_token() {
        match classify("[3d6+2]this text[출석]").unwrap() {
            Command::Dice(exprs) => {
                assert_eq!(exprs[0].count, 3);
                assert_eq!(exprs[0].modifier, 2);
            }
            other => panic!("expected Dice, got {other:?}"),
        }
    }

    #[test]
    fn vocabulary_tokens() {
        assert!(matches!(classify("[출석]").unwrap(), Command::Attendance));
        assert!(matches!(classify("[참여 확인]").unwrap(), Command::Confirm));
        assert_eq!(
            classify("[탐색/숲/동굴]").unwrap(),
            Command::Explore("숲/동굴".to_string())
        );
        assert_eq!(classify("[탐색/]").unwrap(), Command::Explore(String::new()));
    }

    #[test]
    fn first_bracket_token_wins() {
        // Second token ignored; first is unknown → silence.
        assert!(classify("[모름] [출석]").is_none());
    }

    #[test]
    fn unknown_or_empty_is_silent() {
        assert!(classify("no brackets here").is_none());
        assert!(classify("[알수없는명령]").is_none());
        assert!(classify("[]").is_none());
    }
}
