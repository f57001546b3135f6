//! Exit code constants for the baton CLI.
//!
//! Callers must be able to tell "this request was denied" apart from
//! "the coordination store itself is unavailable or damaged":
//! - 0: Success
//! - 1: Operation failure (conflict, not found, capacity, instance limit,
//!   already extended, vetoed)
//! - 2: Usage error (invalid arguments or configuration)
//! - 3: Store failure (lease timeout, corruption, I/O)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// The specific request was denied; the store is healthy.
pub const OPERATION_FAILURE: i32 = 1;

/// Invalid arguments or configuration. Matches clap's own parse-failure code.
pub const USAGE_ERROR: i32 = 2;

/// Lease timeout, corruption, or I/O failure in the coordination substrate.
pub const STORE_FAILURE: i32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, OPERATION_FAILURE, USAGE_ERROR, STORE_FAILURE];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn exit_codes_match_convention() {
        assert_eq!(SUCCESS, 0);
        assert_eq!(OPERATION_FAILURE, 1);
        assert_eq!(USAGE_ERROR, 2);
        assert_eq!(STORE_FAILURE, 3);
    }
}
