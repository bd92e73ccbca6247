//! Dice expressions: parsing, rolling, rendering.

use std::sync::OnceLock;

use regex::Regex;

use crate::commands::Roller;

/// Most dice a single expression may roll.
pub const MAX_DICE: u32 = 100;

/// Largest die.
pub const MAX_SIDES: u32 = 1000;

/// Most expressions evaluated from one message.
pub const MAX_EXPRESSIONS: usize = 10;

/// One `NdM±K` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceExpr {
    pub count: u32,
    pub sides: u32,
    pub modifier: i64,
}

fn bracketed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\s*(\d+)[dD](\d+)(?:\s*([+-]\s*\d+))?\s*\]").unwrap())
}

fn bare_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[dD]\d+(?:\s*[+-]\s*\d+)?$").unwrap())
}

/// Extract every bracketed dice expression from a message body.
pub fn parse(text: &str) -> Vec<DiceExpr> {
    bracketed_re()
        .captures_iter(text)
        .map(|caps| {
            // Digit overflow saturates and is clamped at roll time.
            let count = caps[1].parse().unwrap_or(u32::MAX);
            let sides = caps[2].parse().unwrap_or(u32::MAX);
            let modifier = caps
                .get(3)
                .and_then(|m| m.as_str().replace(' ', "").parse().ok())
                .unwrap_or(0);
            DiceExpr {
                count,
                sides,
                modifier,
            }
        })
        .collect()
}

/// Whether a bare bracket token is a dice expression (`3d6+2`).
pub fn is_bare_expression(token: &str) -> bool {
    bare_re().is_match(token)
}

/// Roll each expression (capped) and render one result line apiece.
pub fn handle(exprs: &[DiceExpr], roller: &dyn Roller) -> Vec<String> {
    exprs
        .iter()
        .take(MAX_EXPRESSIONS)
        .map(|expr| {
            let n = expr.count.clamp(1, MAX_DICE);
            let m = expr.sides.clamp(2, MAX_SIDES);
            let rolls: Vec<u32> = (0..n).map(|_| roller.die(m)).collect();
            let subtotal: i64 = rolls.iter().map(|&r| i64::from(r)).sum();
            let total = subtotal + expr.modifier;

            let rolls_str = rolls
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let head = match expr.modifier {
                k if k > 0 => format!("[{n}d{m}+{k}]"),
                k if k < 0 => format!("[{n}d{m}{k}]"),
                _ => format!("[{n}d{m}]"),
            };

            if expr.modifier != 0 {
                format!(
                    "{head} → {rolls_str} = {subtotal} / {:+} ⇒ 총 {total}",
                    expr.modifier
                )
            } else {
                format!("{head} → {rolls_str} = 총 {total}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Roller replaying a fixed sequence of die results.
    struct FixedRoller {
        rolls: std::sync::Mutex<Vec<u32>>,
    }

    impl FixedRoller {
        fn new(rolls: &[u32]) -> Self {
            Self {
                rolls: std::sync::Mutex::new(rolls.to_vec()),
            }
        }
    }

    impl Roller for FixedRoller {
        fn die(&self, _sides: u32) -> u32 {
            let mut rolls = self.rolls.lock().unwrap();
            if rolls.is_empty() { 1 } else { rolls.remove(0) }
        }

        fn flip(&self) -> bool {
            true
        }

        fn range(&self, lo: i64, _hi: i64) -> i64 {
            lo
        }

        fn choose(&self, _n: usize) -> usize {
            0
        }
    }

    #[test]
    fn parses_expressions() {
        let exprs = parse("roll [3d6] and [1D10+2] and [4d5 - 1]");
        assert_eq!(
            exprs,
            vec![
                DiceExpr { count: 3, sides: 6, modifier: 0 },
                DiceExpr { count: 1, sides: 10, modifier: 2 },
                DiceExpr { count: 4, sides: 5, modifier: -1 },
            ]
        );
    }

    #[test]
    fn ignores_unbracketed_text() {
        assert!(parse("just 3d6 words").is_empty());
        assert!(parse("[]").is_empty());
        assert!(parse("[d6]").is_empty());
    }

    #[test]
    fn bare_expression_token() {
        assert!(is_bare_expression("3d6"));
        assert!(is_bare_expression("1D10+2"));
        assert!(is_bare_expression("4d5 - 1"));
        assert!(!is_bare_expression("3d6 extra"));
        assert!(!is_bare_expression("출석"));
    }

    #[test]
    fn renders_with_modifier() {
        let roller = FixedRoller::new(&[2, 5, 4]);
        let lines = handle(&parse("[3d6+2]"), &roller);
        assert_eq!(lines, vec!["[3d6+2] → 2,5,4 = 11 / +2 ⇒ 총 13"]);
    }

    #[test]
    fn renders_without_modifier() {
        let roller = FixedRoller::new(&[3, 4]);
        let lines = handle(&parse("[2d6]"), &roller);
        assert_eq!(lines, vec!["[2d6] → 3,4 = 총 7"]);
    }

    #[test]
    fn renders_negative_modifier() {
        let roller = FixedRoller::new(&[5]);
        let lines = handle(&parse("[1d6-2]"), &roller);
        assert_eq!(lines, vec!["[1d6-2] → 5 = 5 / -2 ⇒ 총 3"]);
    }

    #[test]
    fn clamps_counts_and_sides() {
        let roller = FixedRoller::new(&[]);
        let lines = handle(&parse("[9999d99999]"), &roller);
        // Clamped to 100 dice of 1000 sides, all rolling the fallback 1.
        assert!(lines[0].starts_with("[100d1000] → "));
        assert!(lines[0].ends_with("= 총 100"));
    }

    #[test]
    fn caps_expression_count() {
        let text = "[1d6]".repeat(MAX_EXPRESSIONS + 5);
        let roller = FixedRoller::new(&[]);
        let lines = handle(&parse(&text), &roller);
        assert_eq!(lines.len(), MAX_EXPRESSIONS);
    }
}
