//! Coding-type tokens attached to every syntax element: `f(n)`, `u(n)`,
//! `u(v)`, `ue(v)` and `se(v)`.
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::DescriptorSyntaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Descriptor {
    /// `f(n)`: fixed-pattern bit string.
    FixedCode(u32),
    /// `u(n)`: unsigned integer of `n` bits.
    UnsignedFixed(u32),
    /// `u(v)`: unsigned integer whose width depends on other syntax elements.
    UnsignedVariable,
    /// `ue(v)`
    UnsignedExpGolomb,
    /// `se(v)`
    SignedExpGolomb,
}

// Checked in this order; first match wins.
static FIXED_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^f\(\s*(\d+)\s*\)$").unwrap());
static UNSIGNED_VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^u\(\s*v\s*\)$").unwrap());
static UNSIGNED_FIXED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^u\(\s*(\d+)\s*\)$").unwrap());
static UNSIGNED_EXP_GOLOMB: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ue\(\s*v\s*\)$").unwrap());
static SIGNED_EXP_GOLOMB: Lazy<Regex> = Lazy::new(|| Regex::new(r"^se\(\s*v\s*\)$").unwrap());

impl Descriptor {
    /// Statically known width, for the fixed-width variants only.
    pub fn bits(&self) -> Option<u32> {
        match self {
            Descriptor::FixedCode(n) | Descriptor::UnsignedFixed(n) => Some(*n),
            _ => None,
        }
    }
}

impl FromStr for Descriptor {
    type Err = DescriptorSyntaxError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let trimmed = token.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}');
        let error = || DescriptorSyntaxError { token: token.to_string() };
        let width = |re: &Regex| -> Option<Result<u32, DescriptorSyntaxError>> {
            let caps = re.captures(trimmed)?;
            Some(match caps[1].parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(error()),
            })
        };

        if let Some(n) = width(&FIXED_CODE) {
            return n.map(Descriptor::FixedCode);
        }
        if UNSIGNED_VARIABLE.is_match(trimmed) {
            return Ok(Descriptor::UnsignedVariable);
        }
        if let Some(n) = width(&UNSIGNED_FIXED) {
            return n.map(Descriptor::UnsignedFixed);
        }
        if UNSIGNED_EXP_GOLOMB.is_match(trimmed) {
            return Ok(Descriptor::UnsignedExpGolomb);
        }
        if SIGNED_EXP_GOLOMB.is_match(trimmed) {
            return Ok(Descriptor::SignedExpGolomb);
        }
        Err(error())
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::FixedCode(n) => write!(f, "f({n})"),
            Descriptor::UnsignedFixed(n) => write!(f, "u({n})"),
            Descriptor::UnsignedVariable => f.write_str("u(v)"),
            Descriptor::UnsignedExpGolomb => f.write_str("ue(v)"),
            Descriptor::SignedExpGolomb => f.write_str("se(v)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("f(8)", Descriptor::FixedCode(8))]
    #[case("u(1)", Descriptor::UnsignedFixed(1))]
    #[case("u(32)", Descriptor::UnsignedFixed(32))]
    #[case("u(v)", Descriptor::UnsignedVariable)]
    #[case("ue(v)", Descriptor::UnsignedExpGolomb)]
    #[case("se(v)", Descriptor::SignedExpGolomb)]
    #[case(" u(4)\u{a0}", Descriptor::UnsignedFixed(4))]
    fn parses_known_tokens(#[case] token: &str, #[case] expected: Descriptor) {
        assert_eq!(token.parse::<Descriptor>(), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("b(8)")]
    #[case("ae(v)")]
    #[case("u(0)")]
    #[case("f(v)")]
    #[case("u(99999999999)")]
    #[case("ue(4)")]
    fn rejects_unknown_tokens(#[case] token: &str) {
        let err = token.parse::<Descriptor>().unwrap_err();
        assert_eq!(err.token, token);
    }

    #[test]
    fn only_fixed_variants_carry_a_width() {
        assert_eq!(Descriptor::FixedCode(3).bits(), Some(3));
        assert_eq!(Descriptor::UnsignedFixed(7).bits(), Some(7));
        assert_eq!(Descriptor::UnsignedVariable.bits(), None);
        assert_eq!(Descriptor::SignedExpGolomb.bits(), None);
    }

    fn canonical_token() -> impl Strategy<Value = String> {
        prop_oneof![
            (1u32..=u32::MAX).prop_map(|n| format!("f({n})")),
            (1u32..=u32::MAX).prop_map(|n| format!("u({n})")),
            Just("u(v)".to_string()),
            Just("ue(v)".to_string()),
            Just("se(v)".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn format_parse_round_trips(token in canonical_token()) {
            let parsed: Descriptor = token.parse().unwrap();
            prop_assert_eq!(parsed.to_string(), token);
        }
    }
}
