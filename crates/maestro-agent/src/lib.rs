//! Agents, their inference backends, and the agent descriptor registry.
//!
//! An [`Agent`] is a stateful worker with a fixed capability set and a
//! concurrency limit. Its behaviour comes from one of the closed set of
//! [`AgentKind`]s, which turn a task into a prompt for the
//! [`InferenceBackend`] and shape the reply into a structured result.
//!
//! # Main types
//!
//! - [`Agent`]: Worker with load tracking and running performance metrics.
//! - [`AgentKind`]: Research, Code, Creative, Analysis, Communication.
//! - [`AgentRegistry`]: Agent types and task categories consumed at startup.
//! - [`InferenceBackend`]: Text-generation collaborator trait.
//! - [`InferenceClient`]: Provider dispatch with optional failover.

/// Agent worker, status and metrics.
pub mod agent;
/// Inference backends per provider.
pub mod backends;
/// Provider dispatch.
pub mod client;
/// Model and provider configuration.
pub mod config;
/// Retry and failover across backends.
pub mod failover;
/// Agent kinds and their prompts.
pub mod kinds;
/// Agent descriptors and task categories.
pub mod registry;

pub use agent::{Agent, AgentMetrics, AgentStatus, AgentSummary, ExecutionOutcome, FAILURE_DECAY};
pub use backends::echo::EchoBackend;
pub use backends::InferenceBackend;
pub use client::InferenceClient;
pub use config::{LlmProvider, ModelConfig};
pub use failover::{FailoverBackend, RetryPolicy};
pub use kinds::AgentKind;
pub use registry::{AgentDescriptor, AgentRegistry};
