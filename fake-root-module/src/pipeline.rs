// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resolution of a request to a response, independent of the web server
//!
//! [`FakeRoot::evaluate`] runs normalization, confinement, directory handling and
//! classification in this order. Each stage can end processing early, the result is always one
//! of the [`Outcome`] variants.

use log::{debug, error, info};
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

use crate::classify::{DeliveryDecision, DEFAULT_DANGEROUS_EXTENSIONS};
use crate::directory::{select_servable, Selection};
use crate::error::FakeRootError;
use crate::path::{NormalizedPath, VirtualRoot};

/// Name of the virtual root directory inside the upload base by default
pub const DEFAULT_SUBDIR_NAME: &str = "fake-root";

/// A response decided on by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `301 Moved Permanently` to the given location
    Redirect {
        /// Value of the `Location` header
        location: String,
    },
    /// `200 OK` with the file contents
    File {
        /// Canonical path of the file to serve
        path: PathBuf,
        /// Attributes of the file
        decision: Box<DeliveryDecision>,
    },
}

/// Result of running the pipeline for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The request is handled by this pipeline with the given response.
    Handled(Response),
    /// Nothing to do here, the host should proceed with its default processing.
    PassThrough,
    /// The request has to be terminated with an error response.
    Reject(FakeRootError),
}

/// Immutable pipeline settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRoot {
    subdir_name: String,
    dangerous_extensions: Vec<String>,
}

impl Default for FakeRoot {
    fn default() -> Self {
        Self::new(
            DEFAULT_SUBDIR_NAME,
            DEFAULT_DANGEROUS_EXTENSIONS.iter().copied(),
        )
    }
}

impl FakeRoot {
    /// Creates a pipeline serving `<upload base>/<subdir_name>` and treating the given file
    /// extensions as dangerous.
    pub fn new<I, S>(subdir_name: impl Into<String>, dangerous_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            subdir_name: subdir_name.into(),
            dangerous_extensions: dangerous_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Name of the virtual root directory inside the upload base.
    pub fn subdir_name(&self) -> &str {
        &self.subdir_name
    }

    /// Lower-case file extensions served as attachment.
    pub fn dangerous_extensions(&self) -> &[String] {
        &self.dangerous_extensions
    }

    /// Resolves a raw request URI (path with optional query) against the virtual root under
    /// `upload_base`.
    ///
    /// A missing upload base, virtual root or target file results in [`Outcome::PassThrough`],
    /// as does a directory without index file. Paths escaping the virtual root are rejected.
    pub fn evaluate(&self, upload_base: Option<&Path>, request_uri: &str) -> Outcome {
        let Some(upload_base) = upload_base else {
            debug!("no upload base for this request");
            return Outcome::PassThrough;
        };

        let request_path = request_uri
            .split_once('?')
            .map_or(request_uri, |(path, _)| path);
        let normalized = NormalizedPath::new(request_path);

        let Some(root) = VirtualRoot::locate(upload_base, &self.subdir_name) else {
            return Outcome::PassThrough;
        };

        let target = match root.confine(&normalized) {
            Ok(Some(target)) => target,
            Ok(None) => return Outcome::PassThrough,
            Err(err) => return Outcome::Reject(err),
        };
        debug!("translated {request_path} into file path {target:?}");

        let path = match select_servable(target, request_path) {
            Selection::Serve(path) => path,
            Selection::Redirect(location) => {
                info!("redirecting directory request to {location}");
                return Outcome::Handled(Response::Redirect { location });
            }
            Selection::PassThrough => return Outcome::PassThrough,
        };

        classified(
            DeliveryDecision::from_path(&path, &self.dangerous_extensions),
            path,
        )
    }
}

fn classified(decision: Result<DeliveryDecision, Error>, path: PathBuf) -> Outcome {
    match decision {
        Ok(decision) => {
            info!("successfully resolved request path: {path:?}");
            Outcome::Handled(Response::File {
                path,
                decision: Box::new(decision),
            })
        }
        // Replaced by something else since the checks, nothing to serve.
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::InvalidInput) => {
            debug!("file {path:?} disappeared: {err}");
            Outcome::PassThrough
        }
        Err(err) => {
            error!("failed classifying {path:?}: {err}");
            Outcome::Reject(FakeRootError::Io {
                path,
                kind: err.kind(),
            })
        }
    }
}
