//! The `check` subcommand.

use gangway_common::{prelude::*, secrets};

/// Resolve credentials without submitting anything. CI pipelines run this
/// as a preflight so a broken secret store fails the build before any job
/// description is touched.
pub fn run() -> Result<()> {
    let providers = secrets::default_providers();
    let resolved = secrets::resolve(&providers)?;
    println!("credentials resolved via {}", resolved.provider);
    println!("orchestrator address: {}", resolved.orchestrator.address);
    Ok(())
}
