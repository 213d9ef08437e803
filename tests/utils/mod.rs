#![allow(dead_code)]

pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use mocks::{RecordingEmailSender, UnreachableTaskQueue, VerificationCall};
#[allow(unused_imports)]
pub use setup::{body_json, cookie_value, set_cookies, TestSetup, TestSetupBuilder};
