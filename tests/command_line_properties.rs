//! Property tests for whitespace command-line splitting.

use std::ffi::OsString;

use piperun::CommandSpec;
use proptest::prelude::*;

proptest! {
    /// Whitespace-free tokens joined by single spaces come back verbatim,
    /// first token as the program.
    #[test]
    fn parse_preserves_whitespace_free_tokens(
        tokens in proptest::collection::vec("[\\x21-\\x7e]{1,12}", 1..8)
    ) {
        let line = tokens.join(" ");
        let spec = CommandSpec::parse(&line).unwrap();

        prop_assert_eq!(&spec.program, &OsString::from(&tokens[0]));
        prop_assert_eq!(spec.args.len(), tokens.len() - 1);
        for (arg, token) in spec.args.iter().zip(&tokens[1..]) {
            prop_assert_eq!(arg, &OsString::from(token));
        }
    }

    /// The width of the whitespace runs between tokens never changes the
    /// parse.
    #[test]
    fn parse_is_insensitive_to_whitespace_runs(
        tokens in proptest::collection::vec("[\\x21-\\x7e]{1,12}", 1..8),
        gaps in proptest::collection::vec(1usize..4, 0..8)
    ) {
        let mut line = String::new();
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                let gap = gaps.get(i - 1).copied().unwrap_or(1);
                line.push_str(&" ".repeat(gap));
            }
            line.push_str(token);
        }

        let reference = CommandSpec::parse(&tokens.join(" ")).unwrap();
        let spec = CommandSpec::parse(&line).unwrap();

        prop_assert_eq!(spec.program, reference.program);
        prop_assert_eq!(spec.args, reference.args);
    }
}
