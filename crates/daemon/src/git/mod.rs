// Git process plumbing: executable discovery and command runner.

pub mod locator;
pub mod runner;
