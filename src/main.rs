//! # Templated Secret Controller
//!
//! A Kubernetes controller that materializes Secrets from `TemplatedSecret`
//! resources.
//!
//! Each `TemplatedSecret` carries a map of template strings. References of
//! the form `$(secret > key)` or `$(namespace > secret > key)` are replaced
//! by the value of that key in that Secret, and the result is written to a
//! Secret owned by the `TemplatedSecret`. The output is kept up to date as
//! the template or any referenced Secret changes.
//!
//! ## Configuration
//!
//! All settings come from environment variables, see [`templated_secret_controller::config`].

use anyhow::Result;
use templated_secret_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init).await
}
