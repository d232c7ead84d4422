#![allow(clippy::doc_markdown)] // Allow technical terms like WS-HumanTask in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Human Task Core
//!
//! Coordination engine for units of work that must be performed by people
//! rather than automated components. Tasks move through an explicit
//! lifecycle (created, ready, reserved, in progress, and a family of
//! terminal states), carry potential-owner and administrator assignments,
//! and may form parent/child hierarchies whose completion and abort
//! behavior is governed by per-task strategies.
//!
//! ## Architecture
//!
//! The service side owns all task state: an atomic per-task lifecycle
//! engine, authorization over every operation, a content store for opaque
//! payloads, and hierarchical cascade propagation between parents and
//! sub-tasks. The client side is a correlated asynchronous protocol:
//! callers attach response handlers, requests and responses travel over
//! channels, and blocking adapter handlers let synchronous callers wait
//! with a timeout.
//!
//! ## Module Organization
//!
//! - [`models`] - Task records, summaries, organizational entities
//! - [`state_machine`] - Lifecycle states, events, and transitions
//! - [`authorization`] - Who may perform which operation in which state
//! - [`repository`] - Task storage trait and in-memory implementation
//! - [`content_store`] - Opaque payload storage keyed by content id
//! - [`directory`] - Group membership resolution
//! - [`service`] - Server loop, wire protocol, cascade propagation
//! - [`client`] - Correlated client and response handlers
//! - [`bridge`] - Work-item integration with process engines
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging initialization
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use humantask_core::client::{BlockingAddTaskResponseHandler, TaskClient};
//! use humantask_core::config::HumanTaskConfig;
//! use humantask_core::directory::StaticDirectory;
//! use humantask_core::models::NewTask;
//! use humantask_core::service::TaskService;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> humantask_core::error::Result<()> {
//! let service = TaskService::in_memory(
//!     Arc::new(StaticDirectory::new()),
//!     HumanTaskConfig::default(),
//! );
//! let client = TaskClient::connect(&service);
//!
//! let handler = BlockingAddTaskResponseHandler::new();
//! let spec = NewTask::new("Review expense report", "", 5).with_actor("darth");
//! client.add_task(spec, handler.clone()).await?;
//! # tokio::task::yield_now().await;
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod bridge;
pub mod client;
pub mod config;
pub mod content_store;
pub mod directory;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod service;
pub mod state_machine;

pub use authorization::AuthorizationEngine;
pub use config::{HumanTaskConfig, UnclaimedSkipPolicy};
pub use content_store::ContentStore;
pub use directory::{StaticDirectory, UserDirectory};
pub use error::{Result, TaskServiceError};
pub use models::{Content, NewTask, OrganizationalEntity, SubTaskStrategy, Task, TaskSummary};
pub use repository::{InMemoryTaskRepository, TaskRepository};
pub use service::{TaskService, ADMINISTRATOR_USER};
pub use state_machine::{TaskEvent, TaskStatus};
