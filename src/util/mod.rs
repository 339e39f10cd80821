//! Shared utilities.

pub mod process;
pub mod shell;

pub use shell::Shell;

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub static TEST_ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Convert a package name into the identifier used in generated
/// preprocessor macros: letters are uppercased, digits kept, anything
/// else becomes `_`.
pub fn to_macro_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphabetic() {
                c.to_ascii_uppercase()
            } else if c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_macro_name() {
        assert_eq!(to_macro_name("cabin"), "CABIN");
        assert_eq!(to_macro_name("my-pkg2"), "MY_PKG2");
        assert_eq!(to_macro_name("a.b+c"), "A_B_C");
    }
}
