//! Error plumbing shared by every crate in the workspace.
//!
//! Crates declare their own typed error enums. Where an error leaves a crate
//! boundary it is wrapped in a rootcause `Report`, which keeps the typed
//! context inspectable while carrying the chain of causes with it.

use rootcause::Report;

/// Result alias carrying a rootcause `Report` with a typed context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    fn fails() -> Result<u8, Boom> {
        Err(Boom.into())
    }

    #[test]
    fn report_keeps_typed_context() {
        let report = fails().unwrap_err();
        assert_eq!(report.current_context().to_string(), "boom");
    }
}
