//! Text normalization for responsibility statements.

use unicode_normalization::UnicodeNormalization;

const BULLETS: &[char] = &['-', '*', '•', '·', '–', '—', '+', '>'];
const TRAILING: &[char] = &['.', ';', ':', ',', '!', '?'];

/// Normalize a duty statement: NFKC, lowercase, strip leading bullets or
/// numbering, collapse whitespace, strip trailing punctuation.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let folded: String = raw.nfkc().collect::<String>().to_lowercase();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = strip_list_marker(&collapsed);
    stripped.trim_end_matches(TRAILING).trim().to_string()
}

fn strip_list_marker(text: &str) -> &str {
    let mut rest = text.trim_start();
    loop {
        let before = rest;
        rest = rest.trim_start_matches(BULLETS).trim_start();
        rest = strip_enumerator(rest);
        if rest == before {
            return rest;
        }
    }
}

/// Strip `1.`, `12)`, `a)` style prefixes.
fn strip_enumerator(text: &str) -> &str {
    let marker_len = text
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .count();
    let marker_len = if marker_len == 0 {
        usize::from(
            text.chars().next().is_some_and(|c| c.is_ascii_lowercase())
                && text[1..].starts_with(')'),
        )
    } else {
        marker_len
    };
    if marker_len == 0 {
        return text;
    }
    match text[marker_len..].chars().next() {
        Some('.' | ')') => {
            let after = &text[marker_len + 1..];
            if after.is_empty() || after.starts_with(' ') {
                after.trim_start()
            } else {
                text
            }
        }
        _ => text,
    }
}

/// Lowercase slug with `-` separators, used for generated ids.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for ch in text.nfkc().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            slug.push(ch);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_lowercases() {
        assert_eq!(
            normalize("  Design   REST\tAPIs for the Platform.  "),
            "design rest apis for the platform"
        );
    }

    #[test]
    fn normalize_strips_bullets_and_numbering() {
        assert_eq!(normalize("- Maintain CI pipelines"), "maintain ci pipelines");
        assert_eq!(normalize("• Review code;"), "review code");
        assert_eq!(normalize("3. Own the on-call rota"), "own the on-call rota");
        assert_eq!(normalize("b) Write runbooks!"), "write runbooks");
        assert_eq!(normalize("12) Plan capacity"), "plan capacity");
    }

    #[test]
    fn normalize_keeps_leading_version_numbers() {
        assert_eq!(normalize("3.5 years of budgeting"), "3.5 years of budgeting");
    }

    #[test]
    fn normalize_applies_nfkc() {
        // Fullwidth letters fold to ASCII.
        assert_eq!(normalize("ＡＰＩ design"), "api design");
    }

    #[test]
    fn normalize_empty_and_punctuation_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  - ."), "");
    }

    #[test]
    fn slugify_builds_dash_separated_ids() {
        assert_eq!(slugify("Incident Response & Recovery"), "incident-response-recovery");
        assert_eq!(slugify("  API  "), "api");
    }
}
