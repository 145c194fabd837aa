/// Case-insensitive whole-term search.
///
/// A term matches only when it is bounded by non-alphanumeric characters,
/// so "Anxiety" is found in "Social Anxiety" but "Trans" is not found in
/// "Life Transitions".
pub fn contains_term(haystack: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();

    let mut start = 0;
    while let Some(offset) = haystack[start..].find(&term) {
        let begin = start + offset;
        let end = begin + term.len();

        let open = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let close = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());

        if open && close {
            return true;
        }

        start = begin + haystack[begin..].chars().next().map_or(1, char::len_utf8);
    }

    false
}

/// True if any value in `values` contains `term`
#[inline]
pub fn any_contains_term(values: &[String], term: &str) -> bool {
    values.iter().any(|value| contains_term(value, term))
}

/// Case-insensitive equality after trimming
#[inline]
pub fn same_word(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Join items as prose: "a", "a and b", "a, b and c"
pub fn join_natural<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [head @ .., last] => {
            let head: Vec<&str> = head.iter().map(AsRef::as_ref).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}
