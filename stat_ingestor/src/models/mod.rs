//! Data types exchanged between the source client and its consumers.

pub mod raw_page;
pub mod request;
