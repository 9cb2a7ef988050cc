//! Pure pattern matching functions for cache keys.
//!
//! Patterns follow the glob dialect of the Redis `KEYS` command:
//! `*` matches any sequence, `?` matches one byte, `[...]` matches a class
//! (`^` negates, `a-z` ranges), and `\` escapes the next character.
//! A pattern must match the whole key. Matching is byte-wise, like Redis.

/// Checks if a cache key matches a glob pattern.
///
/// # Examples
///
/// ```
/// use ck_core::cache::pattern_matches;
///
/// assert!(pattern_matches("APP_USER_INFO::*", "APP_USER_INFO::42"));
/// assert!(pattern_matches("USER::?", "USER::1"));
/// assert!(pattern_matches("USER::[12]", "USER::2"));
/// assert!(!pattern_matches("USER::[^12]", "USER::2"));
/// assert!(!pattern_matches("USER::*", "ARTICLE::1"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    matches_bytes(pattern.as_bytes(), key.as_bytes())
}

fn matches_bytes(pattern: &[u8], key: &[u8]) -> bool {
    let mut p = 0;
    let mut k = 0;
    // Pattern position after the last `*`, and the key position it is tried from
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        let step = match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p + 1, k));
                p += 1;
                continue;
            }
            Some(b'?') => Some(p + 1),
            Some(b'[') => {
                let (matched, next) = match_class(pattern, p, key[k]);
                matched.then_some(next)
            }
            Some(b'\\') if p + 1 < pattern.len() => (pattern[p + 1] == key[k]).then_some(p + 2),
            Some(&literal) => (literal == key[k]).then_some(p + 1),
            None => None,
        };

        match (step, backtrack) {
            (Some(next), _) => {
                p = next;
                k += 1;
            }
            (None, Some((star_next, star_key))) => {
                // let the last `*` swallow one more byte
                backtrack = Some((star_next, star_key + 1));
                p = star_next;
                k = star_key + 1;
            }
            (None, None) => return false,
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

/// Match `c` against the class starting at `pattern[start] == b'['`.
///
/// Returns whether it matched and the pattern position after the class.
/// An unterminated class extends to the end of the pattern.
fn match_class(pattern: &[u8], start: usize, c: u8) -> (bool, usize) {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (low, high) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            matched |= (low..=high).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    if i < pattern.len() {
        // closing bracket
        i += 1;
    }

    (matched != negate, i)
}
