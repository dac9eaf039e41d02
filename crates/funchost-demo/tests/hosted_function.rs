//! The greeting function hosted through the real controller.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use funchost_core::{HarnessSettings, InstanceRequest, InstanceState};
use funchost_runtime::{FunctionsController, FunctionsScope, PortOracle};
use tempfile::TempDir;

const RUNTIME: &str = "net8.0";
const PROJECT: &str = "Demo.Functions";

struct Layout {
    root: TempDir,
}

impl Layout {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("Specs/bin/Debug").join(RUNTIME)).unwrap();
        fs::create_dir_all(root.path().join(PROJECT).join("bin/debug").join(RUNTIME)).unwrap();
        Self { root }
    }

    fn settings(&self) -> HarnessSettings {
        HarnessSettings::default()
            .with_func_path(PathBuf::from(env!("CARGO_BIN_EXE_funchost-demo")))
            .with_search_root(self.root.path().join("Specs/bin/Debug").join(RUNTIME))
            .with_startup_timeout(Duration::from_secs(30))
    }
}

fn free_port_other_than(taken: &[u16]) -> u16 {
    let oracle = PortOracle::system();
    loop {
        let port = oracle.find_available_port(None, None).unwrap();
        if !taken.contains(&port) {
            return port;
        }
    }
}

#[tokio::test]
async fn greets_by_name_and_rejects_missing_name() {
    let layout = Layout::new();
    let mut scope = FunctionsScope::new(layout.settings());
    scope
        .configuration_mut()
        .set("ResponseMessage", "Welcome, {name}");

    let port = free_port_other_than(&[]);
    let instance = scope
        .start(InstanceRequest::new(PROJECT, port, RUNTIME))
        .await
        .unwrap();
    assert_eq!(instance.state(), InstanceState::Running);

    let client = reqwest::Client::new();
    let url = format!("http://localhost:{port}/api/SampleFunction-Get");

    let response = client.get(format!("{url}?name=Jon")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Welcome, Jon");

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let response = client
        .post(&url)
        .body(r#"{"name":"Jon"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "Welcome, Jon");

    scope.teardown().await.unwrap();
    assert_eq!(instance.state(), InstanceState::Terminated);
    assert!(!PortOracle::system().is_listening(port).unwrap());
}

#[tokio::test]
async fn concurrent_instances_keep_separate_state() {
    let layout = Layout::new();
    let controller = FunctionsController::new(layout.settings());

    let first_port = free_port_other_than(&[]);
    let second_port = free_port_other_than(&[first_port]);

    let (first, second) = tokio::join!(
        controller.start_instance(InstanceRequest::new(PROJECT, first_port, RUNTIME)),
        controller.start_instance(InstanceRequest::new(PROJECT, second_port, RUNTIME)),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(controller.instance_count(), 2);
    assert_ne!(first.pid(), second.pid());
    assert_eq!(first.port(), first_port);
    assert_eq!(second.port(), second_port);

    assert!(first.buffer().stdout().contains(&format!("localhost:{first_port}/")));
    assert!(!first.buffer().stdout().contains(&format!("localhost:{second_port}/")));
    assert!(second.buffer().stdout().contains(&format!("localhost:{second_port}/")));

    for port in [first_port, second_port] {
        let body = reqwest::get(format!("http://localhost:{port}/?name=Jon"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "Hello, Jon");
    }

    controller.teardown_all().await.unwrap();
    assert!(first.has_exited());
    assert!(second.has_exited());
}
