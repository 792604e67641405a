//! Method routing layer
//!
//! [`ApiRouter`] maps topic prefixes to async handlers and plugs into the
//! broker as its [`BrokerHooks`](crate::hooks::BrokerHooks). A handler may
//! return an [`AutoResponse`] to have the broker reply or broadcast on its
//! behalf.

mod response;
mod router;

pub use response::AutoResponse;
pub use router::{ApiRouter, MethodCall, MethodFuture};
