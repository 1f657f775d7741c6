//! Containerized server lifecycle against a scripted container runtime

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use strcalc_e2e::fake::{FakeRunner, Invocation};
use strcalc_e2e::{
    CommandSpec, ContainerRuntime, E2eError, Readiness, RemoteServerConfig, RemoteTestServer,
};

const IMAGE: &str = "sha256:5d0da3dc9764";

fn runner() -> Arc<FakeRunner> {
    strcalc_e2e::init_logging();
    let runner = Arc::new(FakeRunner::new());
    runner.succeed("rev-parse", "/home/dev/strcalc\n");
    runner.succeed("build", &format!("{}\n", IMAGE));
    runner
}

fn server(runner: &Arc<FakeRunner>, config: RemoteServerConfig) -> RemoteTestServer {
    RemoteTestServer::new(runner.clone(), ContainerRuntime::Docker, config)
        .with_start_dir("/home/dev/strcalc/crates/e2e")
}

fn count(runner: &FakeRunner, subcommand: &str) -> usize {
    runner.subcommands().iter().filter(|s| *s == subcommand).count()
}

#[tokio::test]
async fn build_failure_reports_build_output_and_stays_idle() {
    let runner = runner();
    runner.fail("build", 1, "no such file: Dockerfile.missing");
    let mut server = server(
        &runner,
        RemoteServerConfig {
            build_file: PathBuf::from("Dockerfile.missing"),
            ..Default::default()
        },
    );

    let err = server.start(Duration::ZERO).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("failed to create temporary Docker image:"), "{}", msg);
    assert!(msg.contains("no such file: Dockerfile.missing"), "{}", msg);

    assert!(!server.is_running());
    assert!(server.base_url().is_none());
    assert_eq!(runner.subcommands(), vec!["info", "rev-parse", "build"]);
}

#[tokio::test]
async fn build_runs_from_repository_root() {
    let runner = runner();
    let mut server = server(&runner, RemoteServerConfig::default());
    server.start(Duration::ZERO).await.unwrap();

    let build = runner
        .invocations()
        .into_iter()
        .find_map(|inv| match inv {
            Invocation::Run(cmd) if cmd.args.first().map(String::as_str) == Some("build") => Some(cmd),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        build,
        CommandSpec::new("docker")
            .args(["build", "-q", "-f", "dockerfiles/Dockerfile.strcalc", "."])
            .current_dir("/home/dev/strcalc")
    );

    server.stop(Duration::ZERO).await.unwrap();
}

#[tokio::test]
async fn start_twice_returns_same_address() {
    let runner = runner();
    let mut server = server(&runner, RemoteServerConfig::default());

    let first = server.start(Duration::ZERO).await.unwrap();
    let port = server.port().unwrap();
    let second = server.start(Duration::ZERO).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.as_str(), format!("http://localhost:{}/", port));
    assert_eq!(server.port(), Some(port));
    assert_eq!(count(&runner, "build"), 1);
    assert_eq!(count(&runner, "run"), 1);

    server.stop(Duration::ZERO).await.unwrap();
}

#[tokio::test]
async fn port_mapping_targets_container_port() {
    let runner = runner();
    let mut server = server(
        &runner,
        RemoteServerConfig {
            container_port: 9090,
            ..Default::default()
        },
    );
    server.start(Duration::ZERO).await.unwrap();
    let port = server.port().unwrap();

    let spawned = runner
        .invocations()
        .into_iter()
        .find_map(|inv| match inv {
            Invocation::Spawn(cmd) => Some(cmd),
            _ => None,
        })
        .unwrap();
    let mapping = format!("{}:9090", port);
    assert_eq!(spawned.args, vec!["run", "--rm", "-p", mapping.as_str(), IMAGE]);

    server.stop(Duration::ZERO).await.unwrap();
}

#[tokio::test]
async fn base_path_is_appended_to_address() {
    let runner = runner();
    let mut server = server(
        &runner,
        RemoteServerConfig {
            base_path: "/strcalc".to_string(),
            ..Default::default()
        },
    );

    let url = server.start(Duration::ZERO).await.unwrap();
    assert!(url.as_str().ends_with("/strcalc"), "{}", url);
    server.stop(Duration::ZERO).await.unwrap();
}

#[tokio::test]
async fn stop_when_idle_does_nothing() {
    let runner = runner();
    let mut server = server(&runner, RemoteServerConfig::default());

    server.stop(Duration::ZERO).await.unwrap();
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn stop_terminates_process_then_removes_image() {
    let runner = runner();
    let mut server = server(&runner, RemoteServerConfig::default());
    server.start(Duration::ZERO).await.unwrap();

    server.stop(Duration::ZERO).await.unwrap();
    assert!(!server.is_running());
    assert!(server.port().is_none());

    let calls = runner.invocations();
    let tail = &calls[calls.len() - 2..];
    assert!(matches!(tail[0], Invocation::Terminate(_)));
    assert_eq!(
        tail[1],
        Invocation::Run(CommandSpec::new("docker").args(["rmi", IMAGE]))
    );

    // Handles were released exactly once
    server.stop(Duration::ZERO).await.unwrap();
    assert_eq!(runner.terminated().len(), 1);
    assert_eq!(count(&runner, "rmi"), 1);
}

#[tokio::test]
async fn restart_after_stop_builds_again() {
    let runner = runner();
    let mut server = server(&runner, RemoteServerConfig::default());

    server.start(Duration::ZERO).await.unwrap();
    server.stop(Duration::ZERO).await.unwrap();
    server.start(Duration::ZERO).await.unwrap();

    assert_eq!(count(&runner, "build"), 2);
    server.stop(Duration::ZERO).await.unwrap();
}

#[tokio::test]
async fn unavailable_runtime_fails_before_building() {
    let runner = runner();
    runner.spawn_error("info", "No such file or directory (os error 2)");
    let mut server = server(&runner, RemoteServerConfig::default());

    let err = server.start(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, E2eError::DockerUnavailable(_)));
    assert!(err.to_string().starts_with("Docker not available: docker:"));
    assert_eq!(runner.subcommands(), vec!["info"]);
}

#[tokio::test]
async fn repository_lookup_failure() {
    let runner = runner();
    runner.fail("rev-parse", 128, "fatal: not a git repository");
    let mut server = server(&runner, RemoteServerConfig::default());

    let err = server.start(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, E2eError::RepositoryRoot(_)));
    assert_eq!(count(&runner, "build"), 0);
}

#[tokio::test]
async fn launch_failure_removes_built_image() {
    let runner = runner();
    runner.spawn_error("run", "fork failed");
    let mut server = server(&runner, RemoteServerConfig::default());

    let err = server.start(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, E2eError::ImageRun(_)));
    assert!(err.to_string().starts_with("error running Docker image:"));

    assert!(!server.is_running());
    assert_eq!(
        runner.invocations().last().unwrap(),
        &Invocation::Run(CommandSpec::new("docker").args(["rmi", IMAGE]))
    );
}

#[tokio::test]
async fn launch_failure_keeps_launch_error_when_removal_fails() {
    let runner = runner();
    runner.spawn_error("run", "fork failed");
    runner.fail("rmi", 1, "image is being used by running container");
    let mut server = server(&runner, RemoteServerConfig::default());

    let err = server.start(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, E2eError::ImageRun(_)));
}

#[tokio::test]
async fn readiness_timeout_tears_down() {
    let runner = runner();
    let mut server = server(
        &runner,
        RemoteServerConfig {
            readiness: Some(Readiness {
                path: "/strcalc/".to_string(),
                timeout: Duration::from_millis(300),
            }),
            ..Default::default()
        },
    );

    // Nothing listens on the published port, so the readiness check never succeeds
    let err = server.start(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, E2eError::ServerHealthCheck { .. }));
    assert!(!server.is_running());
    assert_eq!(runner.terminated().len(), 1);
    assert_eq!(count(&runner, "rmi"), 1);
}

#[tokio::test]
async fn image_removal_failure_is_reported_by_stop() {
    let runner = runner();
    runner.fail("rmi", 1, "conflict: unable to remove repository reference");
    let mut server = server(&runner, RemoteServerConfig::default());
    server.start(Duration::ZERO).await.unwrap();

    let err = server.stop(Duration::ZERO).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to destroy Docker image: conflict: unable to remove repository reference"
    );
    assert!(!server.is_running());
    assert_eq!(runner.terminated().len(), 1);
}

#[tokio::test]
async fn bad_readiness_path_never_launches_container() {
    let runner = runner();
    let mut server = server(
        &runner,
        RemoteServerConfig {
            readiness: Some(Readiness {
                path: "strcalc/".to_string(),
                timeout: Duration::from_millis(300),
            }),
            ..Default::default()
        },
    );

    let err = server.start(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, E2eError::Config(_)));
    assert!(!server.is_running());

    // Rejected before `run`, so there is no container left holding the port
    assert_eq!(runner.subcommands(), vec!["info", "rev-parse", "build", "rmi"]);
    let spawned = runner
        .invocations()
        .iter()
        .filter(|inv| matches!(inv, Invocation::Spawn(_)))
        .count();
    assert_eq!(spawned, 0);
    assert!(runner.terminated().is_empty());
}
