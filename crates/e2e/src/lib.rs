//! strcalc ephemeral test environments
//!
//! Stands up a running strcalc instance for the duration of a test and tears
//! it down afterward, without leaking ports, processes, images or
//! directories.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Test code                           │
//! │        start() -> Url   ...HTTP requests...   stop()         │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │  RemoteTestServer            │  EmbeddedTestServer           │
//! │    ├── Docker                │    ├── Provisioning           │
//! │    │     ├── build_image     │    │     ├── BuildInputs      │
//! │    │     ├── run_image       │    │     ├── Handler          │
//! │    │     └── destroy_image   │    │     └── Artifact         │
//! │    ├── repository_root       │    ├── strcalc_web::serve     │
//! │    └── pick_unused_port      │    └── base dir cleanup       │
//! ├──────────────────────────────┴───────────────────────────────┤
//! │  ProcessRunner (TokioProcessRunner | fake::FakeRunner)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod docker;
pub mod embedded;
pub mod error;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod git;
pub mod health;
pub mod logging;
pub mod port;
pub mod process;
pub mod remote;

pub use config::TestEnvConfig;
pub use docker::{ContainerRuntime, Docker, ImageId, PortMapping};
pub use embedded::{BuildInputs, EmbeddedTestServer, HandlerSpec, HostedContext, Provisioning};
pub use error::{E2eError, E2eResult};
pub use git::repository_root;
pub use health::wait_until_ready;
pub use logging::init_logging;
pub use port::pick_unused_port;
pub use process::{CommandSpec, ProcessOutput, ProcessRunner, RunningProcess, TokioProcessRunner};
pub use remote::{Readiness, RemoteServerConfig, RemoteTestServer};
