//! Title-code recognition and query-variant expansion.
//!
//! Different sources index the same title under different zero padding and
//! punctuation (`ABC-00012`, `ABC012`, `abc_012`). [`expand_key`] produces the
//! ordered list of spellings to try, and [`recognize`] pulls a title code out
//! of a file-like name before any of that happens.

use std::sync::LazyLock;

use regex::Regex;

macro_rules! regex {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).unwrap());
    };
}

// Vendor-prefixed codes such as `300MIUM-123`.
regex!(PREFIXED_KEY, r"(?i)^[0-9][a-z]+[-_a-z0-9]+$");
regex!(PADDED_KEY, r"(?i)^(?P<prefix>[a-z0-9]{3,5})(?P<sep>[-_ ]*)(?P<digits>0{1,2}[0-9]{3,5})$");
regex!(FC2_ID, r"(?i)fc2[-_ ]*(?:ppv)?[-_ ]*(?P<id>\d{5,8})");
regex!(
    CODE_IN_NAME,
    r"(?i)(?:^|[^a-z0-9])(?P<letters>\d*[a-z]{2,6})[-_ ]?(?P<digits>\d{2,6})(?:[^0-9]|$)"
);
regex!(PLAIN_NAME, r"(?i)^[-_ a-z0-9]+$");

/// Longest unrecognized name still sent to providers.
const MAX_UNRECOGNIZED_LEN: usize = 12;

/// Expand a raw key into the ordered, duplicate-free list of query variants.
///
/// The original key is always present. Order matters: callers stop at the
/// first variant that yields results.
///
/// # Examples
///
/// ```
/// use metaforge::keys::expand_key;
///
/// let keys = expand_key("ABC-00012");
/// assert!(keys.contains(&"ABC-00012".to_string()));
/// assert!(keys.contains(&"ABC-012".to_string()));
/// assert!(keys.contains(&"ABC012".to_string()));
/// assert!(keys.contains(&"ABC_012".to_string()));
/// ```
pub fn expand_key(key: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();

    if PREFIXED_KEY.is_match(key) {
        // Leading byte is an ASCII digit, so slicing at 1 is on a boundary.
        push_unique(&mut keys, key[1..].to_string());
    }

    push_unique(&mut keys, key.to_string());

    if let Some(caps) = PADDED_KEY.captures(key) {
        let prefix = &caps["prefix"];
        let digits = &caps["digits"];
        let end = digits.trim_start_matches('0');
        let zeros = digits.len() - end.len();
        for i in 0..zeros {
            let pad = "0".repeat(i);
            push_unique(&mut keys, format!("{prefix}{pad}{end}"));
            push_unique(&mut keys, format!("{prefix}-{pad}{end}"));
            push_unique(&mut keys, format!("{prefix}_{pad}{end}"));
        }
    }

    if key.find('-').is_some_and(|i| i > 0) {
        push_unique(&mut keys, key.replace('-', "_"));
    }
    if key.find('_').is_some_and(|i| i > 0) {
        push_unique(&mut keys, key.replace('_', "-"));
    }

    if keys.len() > 1 {
        push_unique(&mut keys, key.replace(['-', '_'], ""));
    }

    keys
}

fn push_unique(keys: &mut Vec<String>, key: String) {
    if !keys.contains(&key) {
        keys.push(key);
    }
}

/// A title code recognized in a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleId {
    pub kind: TitleIdKind,
    /// Canonical spelling, e.g. `ABC-123` or `FC2-1234567`.
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleIdKind {
    /// Letters followed by a number, optionally vendor-prefixed.
    Standard,
    /// FC2 marketplace id; not served by the bundled providers.
    Fc2,
}

/// Extract a title code from a file name or free-form label.
///
/// Directory components and a short trailing extension are ignored.
///
/// # Examples
///
/// ```
/// use metaforge::keys::{recognize, TitleIdKind};
///
/// let id = recognize("/media/abc-123-C.mp4").unwrap();
/// assert_eq!(id.id, "ABC-123");
/// assert_eq!(recognize("FC2-PPV-1234567").unwrap().kind, TitleIdKind::Fc2);
/// ```
pub fn recognize(name: &str) -> Option<TitleId> {
    let stem = file_stem(name);

    if let Some(caps) = FC2_ID.captures(stem) {
        return Some(TitleId {
            kind: TitleIdKind::Fc2,
            id: format!("FC2-{}", &caps["id"]),
        });
    }

    CODE_IN_NAME.captures(stem).map(|caps| TitleId {
        kind: TitleIdKind::Standard,
        id: format!(
            "{}-{}",
            caps["letters"].to_ascii_uppercase(),
            &caps["digits"]
        ),
    })
}

/// Whether a key names an FC2 title.
pub fn is_fc2(key: &str) -> bool {
    matches!(recognize(key), Some(TitleId { kind: TitleIdKind::Fc2, .. }))
}

/// Whether a name is worth sending to providers at all.
///
/// Automatic scans pass folder names that are not title codes; those are
/// rejected unless they are short and made of code characters only.
pub fn is_plausible(name: &str) -> bool {
    recognize(name).is_some()
        || (name.chars().count() <= MAX_UNRECOGNIZED_LEN && PLAIN_NAME.is_match(name))
}

/// Last path component of `name` without a short file extension.
pub fn file_stem(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => base,
    }
}
