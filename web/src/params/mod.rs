//! This module holds typed parameters for endpoint inputs.
//!
//! By using typed parameters, inputs are validated (by type) before they reach the
//! handler logic.

pub(crate) mod sse;
