//! Code shared between the `gangway` deployment tools.

#![warn(missing_docs)]

pub mod errors;
pub mod exec_mode;
pub mod orchestrator;
pub mod secrets;
pub mod tracing_support;

/// Common imports used by many modules.
pub mod prelude {
    pub use anyhow::{format_err, Context, Error, Result};
    pub use serde::{Deserialize, Serialize};
    pub use std::{collections::HashMap, fmt};
    pub use tracing::{debug, error, info, trace, warn};
    pub use url::Url;

    pub use crate::errors::{
        CredentialUnavailable, StatusCheckTimedOut, SubmissionFailed,
    };
    pub use crate::exec_mode::ExecutionMode;
}
