//! # drill-docker
//!
//! Docker Compose backed cluster driver for stormdrill.
//!
//! [`ComposeCluster`] implements every collaborator trait of `drill-runner`
//! on top of a local compose project:
//!
//! | Cluster concept | Compose equivalent |
//! |-----------------|--------------------|
//! | zone | service named `<zone_prefix>*` |
//! | node | replica labelled `stormdrill.role=node` |
//! | storage driver node | replica labelled `stormdrill.storage-driver=true` |
//! | application | containers labelled `stormdrill.app=<key>` |
//! | autoscaler resize | `docker compose up -d --no-recreate --scale` |
//! | node delete | force-remove the container |
//! | node reboot | restart the container |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod containers;
pub mod harness;

pub use harness::{ComposeCluster, ComposeError};
