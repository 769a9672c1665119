//! # CRD Generator
//!
//! Prints the `TemplatedSecret` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/templatedsecret.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use templated_secret_controller::TemplatedSecret;

fn main() {
    match serde_yaml::to_string(&TemplatedSecret::crd()) {
        Ok(yaml) => print!("{yaml}"),
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
