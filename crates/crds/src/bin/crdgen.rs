//! Prints the ImmortalDB CustomResourceDefinition as YAML.
//!
//! ```sh
//! cargo run -p crds --bin crdgen | kubectl apply -f -
//! ```

use crds::ImmortalDB;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = serde_yaml::to_string(&ImmortalDB::crd())?;
    print!("{crd}");
    Ok(())
}
