//! Matching a module path from a log against canonical module names.
//!
//! The install location of Spring differs per user, so only the tail of the
//! path is compared. Skirmish AIs all ship a library with the same file name,
//! so for those the AI's directory is part of the comparison key.

/// File name shared by every Skirmish AI library
pub const SKIRMISH_AI_LIBRARY: &str = "SkirmishAI.dll";

/// Treat `\` and `/` as equal
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Suffix that a canonical name must end with to match `needle`
///
/// `c:/Spring/AI/Skirmish/NullAI/0.1/SkirmishAI.dll` -> `NullAI/SkirmishAI.dll`
/// (third-from-last segment plus file name); anything else -> last segment.
pub fn comparison_key(needle: &str) -> Option<String> {
    let normalized = normalize_separators(needle);
    let segments: Vec<&str> = normalized.split('/').collect();

    let file_name = *segments.last()?;
    if file_name.is_empty() {
        return None;
    }

    if file_name == SKIRMISH_AI_LIBRARY && segments.len() >= 3 {
        let ai_dir = segments[segments.len() - 3];
        if !ai_dir.is_empty() {
            return Some(format!("{ai_dir}/{file_name}"));
        }
    }

    Some(file_name.to_string())
}

/// First entry of `haystack` whose name ends with the needle's comparison key
///
/// `None` is an ordinary outcome: third-party libraries and modules without
/// published symbols simply don't match.
///
/// ```
/// use stacktrace_translator::symbols::best_match;
///
/// let modules = ["spring.exe", "AI/Skirmish/NullAI/SkirmishAI.dll"];
/// assert_eq!(best_match("c:/Program Files/Spring/spring.exe", &modules), Some("spring.exe"));
/// ```
pub fn best_match<'a, S: AsRef<str>>(needle: &str, haystack: &'a [S]) -> Option<&'a str> {
    let key = comparison_key(needle)?;
    haystack
        .iter()
        .map(|candidate| -> &'a str { candidate.as_ref() })
        .find(|candidate| normalize_separators(candidate).ends_with(&key))
}
