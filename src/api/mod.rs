//! Shared plumbing for the Google REST APIs.

pub(crate) mod rest;
