//! Text rendering utilities for human-friendly diagnostics.
//!
//! Provides helpers to format resolution paths, type names,
//! and helpful suggestions in error output.

/// Renders a resolution path as a readable chain.
///
/// # Examples
/// ```
/// use miftah_support::rendering::render_chain;
///
/// let path = vec!["UserService", "AuthService", "UserService"];
/// assert_eq!(render_chain(&path), "UserService → AuthService → UserService");
/// ```
pub fn render_chain(path: &[impl AsRef<str>]) -> String {
    path.iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Shortens a fully qualified type name for display.
///
/// Keeps generic structure readable while dropping module paths:
///
/// ```
/// use miftah_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::services::UserService"), "UserService");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>"),
///     "Arc<dyn Logger>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                // path prefix ends here, keep only what follows
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Generates "did you mean?" suggestions from the set of registered names.
///
/// Compares the requested name against the available ones and returns
/// the closest matches, best first.
pub fn suggest_similar(
    requested: &str,
    available: &[impl AsRef<str>],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| *name != requested)
        .filter_map(|name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short) || requested_short.contains(&name_short) {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_simple_chain() {
        let path = vec!["A", "B", "A"];
        assert_eq!(render_chain(&path), "A → B → A");
    }

    #[test]
    fn render_single_entry() {
        assert_eq!(render_chain(&["A"]), "A");
    }

    #[test]
    fn render_empty_path() {
        let path: Vec<&str> = vec![];
        assert_eq!(render_chain(&path), "");
    }

    #[test]
    fn shorten_plain_path() {
        assert_eq!(
            shorten_type_name("my_app::services::UserService"),
            "UserService"
        );
    }

    #[test]
    fn shorten_generic_path() {
        assert_eq!(
            shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>"),
            "Arc<dyn Logger>"
        );
    }

    #[test]
    fn shorten_bare_name() {
        assert_eq!(shorten_type_name("String"), "String");
    }

    #[test]
    fn suggest_close_names() {
        let available = vec![
            "my_app::UserService",
            "my_app::UserRepository",
            "my_app::Logger",
        ];

        let suggestions = suggest_similar("UserServise", &available, 3);
        assert!(!suggestions.is_empty());
        assert!(suggestions[0].contains("UserService"));
    }

    #[test]
    fn suggest_nothing_for_unrelated() {
        let available = vec!["my_app::Database"];
        assert!(suggest_similar("XyzAbcDef", &available, 3).is_empty());
    }
}
