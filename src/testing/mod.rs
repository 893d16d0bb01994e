//! Test doubles for exercising the messaging client without a live broker

pub mod mocks;

pub use mocks::*;
