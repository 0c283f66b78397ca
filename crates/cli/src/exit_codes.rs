//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Code | Domain    | Description                                        |
//! |------|-----------|----------------------------------------------------|
//! | 0    | Universal | Success                                            |
//! | 1    | Universal | General error (unspecified)                        |
//! | 2    | Universal | CLI usage error (bad args)                         |
//! | 3    | run       | Observations could not be read or parsed           |
//! | 4    | run       | Invalid inference config                           |
//! | 5    | run       | Integrity violation, no output written             |
//! | 6    | run       | Output could not be written                        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// Raised by clap itself before any command runs.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (3-9)
// =============================================================================

/// Observation CSV missing, unreadable, or holding an unparseable row.
pub const EXIT_RUN_INPUT: u8 = 3;

/// Config unreadable, malformed TOML, or failing validation.
pub const EXIT_RUN_INVALID_CONFIG: u8 = 4;

/// The pipeline aborted: a breakdown disagrees with its total beyond
/// tolerance, or the model produced a negative count.
pub const EXIT_RUN_INTEGRITY: u8 = 5;

/// Output CSV, JSON or summary files could not be written.
pub const EXIT_RUN_OUTPUT: u8 = 6;
