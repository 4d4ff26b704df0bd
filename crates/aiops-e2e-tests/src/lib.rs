//! End-to-end scenario tests for the AIOps workspace.
//!
//! The tests live under `tests/`; this library is intentionally empty.
