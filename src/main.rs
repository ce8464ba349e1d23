use kube::{Client, CustomResourceExt};

use kindling_operator::dse::crd::DevStagingEnvironment;
use kindling_operator::runner::crd::CIRunnerPool;
use kindling_operator::{dse, runner, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    if std::env::var("PRINT_CRD").is_ok() {
        print_crds_without_formats()?;
        return Ok(());
    }

    let client = Client::try_default().await?;

    tokio::try_join!(
        tokio::spawn(dse::controller::run(client.clone())),
        tokio::spawn(runner::controller::run(client)),
    )?;

    Ok(())
}

/// Emits both CRDs without schemars `format` annotations that OLM dislikes.
fn print_crds_without_formats() -> anyhow::Result<()> {
    for crd_value in [serde_json::to_value(DevStagingEnvironment::crd())?, serde_json::to_value(CIRunnerPool::crd())?] {
        let mut v = crd_value;
        strip_format_keys(&mut v);
        println!("---");
        println!("{}", serde_yaml::to_string(&v)?);
    }
    Ok(())
}

fn strip_format_keys(v: &mut serde_json::Value) {
    use serde_json::Value::*;
    match v {
        Object(map) => {
            map.remove("format");
            for val in map.values_mut() {
                strip_format_keys(val);
            }
        }
        Array(arr) => {
            for val in arr {
                strip_format_keys(val);
            }
        }
        _ => {}
    }
}
