//! Client library for the ERU container orchestration control plane
//!
//! This crate provides:
//! - An HTTP client covering the app, deploy, container, pod, host and
//!   network endpoints
//! - WebSocket tailing of build and container logs
//! - Autoscaling helpers that grow or shrink an application cohort by
//!   cohort

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod scaling;
pub mod stream;

pub use client::{DeployOptions, EruClient};
pub use config::{ClientConfig, EruClientBuilder};
pub use error::{EruError, EruResult};
pub use models::*;
pub use scaling::{
    bounded_increment, group_cohorts, most_common_pod, select_victims, Cohort, ScaleInOptions,
    ScaleOutOptions, DEFAULT_CEILING, DEFAULT_FLOOR,
};
pub use stream::{LogLine, LogStream};
