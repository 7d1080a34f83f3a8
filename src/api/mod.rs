//! Wire types shared by the gateway and its clients.

pub mod action;
pub mod requests;
pub mod responses;

pub use action::Action;
