//! Library events producer integration tests.

mod producer;
