//! Lexical features computed from a URL string.
//!
//! The same [`extract_feature`] call feeds the training dataset and the live
//! predictor, so any change here changes the model's input space.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Four dot-separated digit groups anywhere in the host. Deliberately loose:
/// `999.999.999.999` and `a1.2.3.4b` both match.
static IP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("static regex"));

pub static LETTER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z]").expect("static regex"));

pub static DIGIT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("host {domain:?} has no root domain label")]
    NoRootDomain { domain: String },
    #[error("host {domain:?} has an empty root domain label")]
    EmptyRootDomain { domain: String },
}

/// Per-URL feature mapping. Field names are the dataset column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub domain: String,
    pub domain_char_continuation_rate: Option<f64>,
    pub domain_length: usize,
    pub is_ip: u8,
    pub tld: Option<String>,
    pub tld_length: Option<usize>,
    pub no_of_subdomain: i64,
    pub no_of_letters: usize,
    pub letter_ratio: f64,
    pub no_of_digits: usize,
    pub digit_ratio: f64,
    pub is_https: u8,
}

/// Every serialized field of [`FeatureVector`], in declaration order.
pub const FEATURE_COLUMNS: [&str; 12] = [
    "domain",
    "domain_char_continuation_rate",
    "domain_length",
    "is_ip",
    "tld",
    "tld_length",
    "no_of_subdomain",
    "no_of_letters",
    "letter_ratio",
    "no_of_digits",
    "digit_ratio",
    "is_https",
];

/// Column order of [`FeatureVector::numeric_columns`].
pub const NUMERIC_COLUMNS: [&str; 10] = [
    "domain_char_continuation_rate",
    "domain_length",
    "is_ip",
    "tld_length",
    "no_of_subdomain",
    "no_of_letters",
    "letter_ratio",
    "no_of_digits",
    "digit_ratio",
    "is_https",
];

impl FeatureVector {
    /// Classifier inputs in [`NUMERIC_COLUMNS`] order. The text columns
    /// (`domain`, `tld`) are not model inputs.
    pub fn numeric_columns(&self) -> [Option<f64>; 10] {
        [
            self.domain_char_continuation_rate,
            Some(self.domain_length as f64),
            Some(f64::from(self.is_ip)),
            self.tld_length.map(|l| l as f64),
            Some(self.no_of_subdomain as f64),
            Some(self.no_of_letters as f64),
            Some(self.letter_ratio),
            Some(self.no_of_digits as f64),
            Some(self.digit_ratio),
            Some(f64::from(self.is_https)),
        ]
    }
}

/// Returns the host part of `url`.
///
/// With a `scheme://` prefix the authority is taken and stripped of userinfo
/// and port. Without one, everything before the first `/` is the host, cut at
/// the first `:`. Never fails; degenerate input yields a degenerate host.
pub fn extract_domain(url: &str) -> String {
    if let Some((scheme, rest)) = url.split_once("://") {
        if is_scheme(scheme) {
            let authority = rest
                .split(|c| matches!(c, '/' | '?' | '#'))
                .next()
                .unwrap_or("");
            if !authority.is_empty() {
                return host_of_authority(authority).to_string();
            }
        }
    }

    let head = url.split('/').next().unwrap_or("");
    match head.split_once(':') {
        Some((host, _port)) => host.to_string(),
        None => head.to_string(),
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn host_of_authority(authority: &str) -> &str {
    let host_port = authority
        .rsplit_once('@')
        .map(|(_, hp)| hp)
        .unwrap_or(authority);
    if host_port.starts_with('[') {
        // [v6]:port
        return match host_port.find(']') {
            Some(end) => &host_port[..=end],
            None => host_port,
        };
    }
    host_port.split(':').next().unwrap_or(host_port)
}

/// True when `domain` contains something shaped like a dotted quad.
pub fn is_ip(domain: &str) -> bool {
    IP_PATTERN.is_match(domain)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Alpha,
    Numeric,
    Special,
}

/// Letters of any script (general category L).
static ALPHA_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{L}$").expect("static regex"));

/// Decimal digits of any script (general category Nd).
static DECIMAL_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{Nd}$").expect("static regex"));

/// Characters with Numeric_Type=Digit outside Nd: superscripts, subscripts,
/// circled and parenthesised digits and a few historic scripts.
const DIGIT_TYPE_RANGES: &[(char, char)] = &[
    ('\u{00B2}', '\u{00B3}'),
    ('\u{00B9}', '\u{00B9}'),
    ('\u{1369}', '\u{1371}'),
    ('\u{19DA}', '\u{19DA}'),
    ('\u{2070}', '\u{2070}'),
    ('\u{2074}', '\u{2079}'),
    ('\u{2080}', '\u{2089}'),
    ('\u{2460}', '\u{2468}'),
    ('\u{2474}', '\u{247C}'),
    ('\u{2488}', '\u{2490}'),
    ('\u{24EA}', '\u{24EA}'),
    ('\u{24F5}', '\u{24FD}'),
    ('\u{24FF}', '\u{24FF}'),
    ('\u{2776}', '\u{277E}'),
    ('\u{2780}', '\u{2788}'),
    ('\u{278A}', '\u{2792}'),
    ('\u{10A40}', '\u{10A43}'),
    ('\u{10E60}', '\u{10E68}'),
    ('\u{11052}', '\u{1105A}'),
    ('\u{1F100}', '\u{1F10A}'),
];

fn char_matches(pattern: &Regex, c: char) -> bool {
    let mut buf = [0u8; 4];
    pattern.is_match(c.encode_utf8(&mut buf))
}

impl CharClass {
    /// Alpha is category L. Numeric is Numeric_Type Decimal or Digit, so
    /// fractions such as `½` and letter numerals such as `Ⅻ` are special.
    fn of(c: char) -> Self {
        if c.is_ascii() {
            return if c.is_ascii_alphabetic() {
                CharClass::Alpha
            } else if c.is_ascii_digit() {
                CharClass::Numeric
            } else {
                CharClass::Special
            };
        }
        if char_matches(&ALPHA_CHAR, c) {
            CharClass::Alpha
        } else if char_matches(&DECIMAL_CHAR, c)
            || DIGIT_TYPE_RANGES
                .iter()
                .any(|(lo, hi)| (*lo..=*hi).contains(&c))
        {
            CharClass::Numeric
        } else {
            CharClass::Special
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Sum of the longest alphabetic, numeric and special runs divided by the
/// character count. Empty text yields `0.0`.
pub fn char_con_rate(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }

    let mut current = [0usize; 3];
    let mut longest = [0usize; 3];
    for c in text.chars() {
        let class = CharClass::of(c).index();
        for (i, run) in current.iter_mut().enumerate() {
            if i == class {
                *run += 1;
            } else {
                *run = 0;
            }
        }
        longest[class] = longest[class].max(current[class]);
    }

    longest.iter().sum::<usize>() as f64 / total as f64
}

/// Labels minus the root domain and TLD. IP hosts have none. Single-label
/// hosts go negative.
pub fn no_of_subdomain(domain: &str) -> i64 {
    if is_ip(domain) {
        return 0;
    }
    domain.split('.').count() as i64 - 2
}

/// Non-overlapping matches of `pattern` in `text`.
pub fn count_matches(text: &str, pattern: &Regex) -> usize {
    pattern.find_iter(text).count()
}

struct Composition {
    letters: usize,
    letter_ratio: f64,
    digits: usize,
    digit_ratio: f64,
}

impl Composition {
    /// `text` must be non-empty.
    fn of(text: &str) -> Self {
        let len = text.chars().count() as f64;
        let letters = count_matches(text, &LETTER_PATTERN);
        let digits = count_matches(text, &DIGIT_PATTERN);
        Self {
            letters,
            letter_ratio: letters as f64 / len,
            digits,
            digit_ratio: digits as f64 / len,
        }
    }
}

/// Computes the full feature mapping for one URL.
///
/// IP-literal hosts get the degenerate set: no TLD or continuation rate, zero
/// subdomains, composition over the whole URL and `is_https = 0` whatever the
/// scheme. Otherwise composition covers the root domain label only and
/// `is_https` requires the exact lowercase `https://` prefix.
pub fn extract_feature(url: &str) -> Result<FeatureVector, FeatureError> {
    let domain = extract_domain(url);
    let domain_length = domain.chars().count();

    if is_ip(&domain) {
        // An IP match implies at least seven characters in the URL.
        let comp = Composition::of(url);
        return Ok(FeatureVector {
            domain,
            domain_char_continuation_rate: None,
            domain_length,
            is_ip: 1,
            tld: None,
            tld_length: None,
            no_of_subdomain: 0,
            no_of_letters: comp.letters,
            letter_ratio: comp.letter_ratio,
            no_of_digits: comp.digits,
            digit_ratio: comp.digit_ratio,
            is_https: 0,
        });
    }

    let mut labels = domain.rsplit('.');
    let tld = labels.next().unwrap_or_default();
    let Some(root) = labels.next() else {
        return Err(FeatureError::NoRootDomain {
            domain: domain.clone(),
        });
    };
    if root.is_empty() {
        return Err(FeatureError::EmptyRootDomain {
            domain: domain.clone(),
        });
    }

    let comp = Composition::of(root);
    let tld = tld.to_string();
    let tld_length = tld.chars().count();

    Ok(FeatureVector {
        domain_char_continuation_rate: Some(char_con_rate(root)),
        domain_length,
        is_ip: 0,
        tld_length: Some(tld_length),
        tld: Some(tld),
        no_of_subdomain: no_of_subdomain(&domain),
        no_of_letters: comp.letters,
        letter_ratio: comp.letter_ratio,
        no_of_digits: comp.digits,
        digit_ratio: comp.digit_ratio,
        is_https: u8::from(url.starts_with("https://")),
        domain,
    })
}
