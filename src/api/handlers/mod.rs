//! API handlers for gardi.
//!
//! `admin` holds the authenticated control plane; `health` is the only public
//! route.

pub mod admin;
pub mod health;
