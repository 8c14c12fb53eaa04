// SPDX-License-Identifier: MIT OR Apache-2.0
//! Task/version data model and the up/down task executor.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod executor;
mod json_path;
mod model;
mod spec;

pub use executor::{TaskError, TaskErrorKind, TaskExecutor, TaskResult};
pub use json_path::extract as extract_json_path;
pub use model::{DownAction, Task, UpAction, Version};
pub use spec::{Body, HeaderEntry, Method, RequestSpec, ResponseSpec};
