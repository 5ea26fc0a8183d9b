use std::process::ExitCode;
use std::sync::Arc;

use courier::demo::{HELLO_SERVICE, PERSON_TYPE, Person, STRING_TYPE, hello_registry};
use courier::transport::memory::MemoryBroker;
use courier::{
    ContainerError, Courier, HealthReporter, RegistryError, RpcError, StructuredHealthReporter,
    SystemConfigLoader, bootstrap_with,
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info};

const DEMO_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::demo");

#[derive(Debug, Error)]
enum DemoError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Call(#[from] RpcError),
    #[error("failed to encode argument: {0}")]
    Argument(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
    // Bootstrap failures are already reported through the health reporter.
    let Ok(runtime) = bootstrap_with(&SystemConfigLoader, reporter) else {
        return ExitCode::FAILURE;
    };
    match run(&runtime) {
        Ok(()) => ExitCode::SUCCESS,
        Err(demo_error) => {
            error!(target: DEMO_TARGET, error = %demo_error, "demo failed");
            ExitCode::FAILURE
        }
    }
}

fn run(runtime: &Courier) -> Result<(), DemoError> {
    let broker = Arc::new(MemoryBroker::new());
    let container = runtime.listener_container(broker.clone(), hello_registry()?)?;
    container.start()?;

    let client = runtime.client(broker);
    let default = client.proxy(HELLO_SERVICE, "");
    let v2 = client.proxy(HELLO_SERVICE, "v2");

    let greeting = default.invoke("hello", &[STRING_TYPE], vec![json!("World")])?;
    info!(target: DEMO_TARGET, %greeting, "default hello(string) answered");

    let person = serde_json::to_value(Person::new("zhao", "hui"))?;
    let structured = v2.invoke("hello", &[PERSON_TYPE], vec![person])?;
    info!(target: DEMO_TARGET, %structured, "v2 hello(demo.Person) answered");

    for proxy in [&default, &v2] {
        let version: String = proxy.invoke_as("version", &[], Vec::<Value>::new())?;
        info!(target: DEMO_TARGET, binding = %proxy.target(), %version, "binding answered");
    }

    container.stop();
    Ok(())
}
