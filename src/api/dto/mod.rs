//! Data Transfer Objects for API response deserialization.

pub mod rtm_dto;

pub use rtm_dto::*;
