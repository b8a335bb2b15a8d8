#[allow(unused_imports)]
pub(crate) use anyhow::Context;
#[allow(unused_imports)]
pub(crate) use tracing::{debug, debug_span, error, info, instrument, trace, warn};
