//! Dotted version ordering for `<ver>` entries and format identifiers.
//!
//! Versions are split into runs of digits and runs of letters; any other
//! character is a delimiter. Numeric runs compare numerically, so `5.10`
//! sorts after `5.9`. Words rank `other < dev < alpha < beta < rc < N < pl`;
//! two unrecognised words compare lexically.

use std::{cmp::Ordering, sync::OnceLock};

use regex::Regex;

const UNKNOWN_RANK: i8 = -1;
const NUMBER_RANK: i8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Number(&'a str),
    Word(&'a str),
}

impl<'a> Token<'a> {
    fn as_str(&self) -> &'a str {
        match self {
            Token::Number(s) | Token::Word(s) => s,
        }
    }

    fn rank(&self) -> i8 {
        match self {
            Token::Number(_) => NUMBER_RANK,
            Token::Word(word) => match word.to_ascii_lowercase().as_str() {
                "dev" => 0,
                "alpha" | "a" => 1,
                "beta" | "b" => 2,
                "rc" => 3,
                "pl" | "p" => 5,
                _ => UNKNOWN_RANK,
            },
        }
    }

    fn is_prerelease(&self) -> bool {
        self.rank() < NUMBER_RANK
    }
}

fn tokens(version: &str) -> Vec<Token<'_>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = RE.get_or_init(|| Regex::new(r"[0-9]+|[A-Za-z]+").unwrap());
    regex
        .find_iter(version)
        .map(|m| {
            let part = m.as_str();
            if part.as_bytes()[0].is_ascii_digit() {
                Token::Number(part)
            } else {
                Token::Word(part)
            }
        })
        .collect()
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_tokens(a: &Token<'_>, b: &Token<'_>) -> Ordering {
    if let (Token::Number(a), Token::Number(b)) = (a, b) {
        return compare_numbers(a, b);
    }
    match (a.rank(), b.rank()) {
        (UNKNOWN_RANK, UNKNOWN_RANK) => a.as_str().cmp(b.as_str()),
        (left, right) => left.cmp(&right),
    }
}

/// Orders two version strings component by component.
///
/// When one version is a prefix of the other the longer one is greater,
/// unless its next component is a pre-release word (`1.0beta < 1.0`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = tokens(a);
    let right = tokens(b);
    for (l, r) in left.iter().zip(&right) {
        let ord = compare_tokens(l, r);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    let tail = |extra: &Token<'_>| {
        if extra.is_prerelease() {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    };
    match left.len().cmp(&right.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Greater => tail(&left[right.len()]),
        Ordering::Less => tail(&right[left.len()]).reverse(),
    }
}

/// Sorts versions ascending; equal versions keep their relative order.
pub fn sort_versions<S: AsRef<str>>(versions: &mut [S]) {
    versions.sort_by(|a, b| compare_versions(a.as_ref(), b.as_ref()));
}

/// The greatest version in `versions`, if any.
pub fn max_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions.into_iter().max_by(|a, b| compare_versions(a, b))
}

/// True when `version` contains at least one numeric component.
pub fn has_numeric_component(version: &str) -> bool {
    tokens(version)
        .iter()
        .any(|token| matches!(token, Token::Number(_)))
}
