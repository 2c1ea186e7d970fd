//! Request / response contract for the Armada control plane.
//!
//! Every `(action, subaction)` pair in the catalog is a request struct
//! under [api], resolving to a typed response. [entities] holds the
//! plain records those responses are made of, and [error] the error
//! taxonomy every failure is normalized into.

pub mod api;
pub mod entities;
pub mod error;
