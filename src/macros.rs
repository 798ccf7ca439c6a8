/// Compile a regex once and hand out a `&'static Regex`.
///
/// Patterns are string literals checked by the tests that exercise them.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}
