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

//! Errors terminating a request

use http::StatusCode;
use std::fmt::Display;
use std::io::ErrorKind;
use std::path::PathBuf;

/// An error that ends processing of the current request with an error response
///
/// Unlike pass-through, these are never handed back to the host for default processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeRootError {
    /// The canonical target path is outside the virtual root.
    SandboxViolation {
        /// Canonical path the request resolved to
        target: PathBuf,
        /// Canonical path of the virtual root
        root: PathBuf,
    },
    /// The file passed all checks but could not be opened or read.
    Io {
        /// File path
        path: PathBuf,
        /// Kind of the I/O error
        kind: ErrorKind,
    },
}

impl FakeRootError {
    /// Returns the status code of the error response.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::SandboxViolation { .. } => StatusCode::BAD_REQUEST,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the plain text body of the error response.
    pub fn response_text(&self) -> &'static str {
        match self {
            Self::SandboxViolation { .. } => "Bad request",
            Self::Io { .. } => "Server error",
        }
    }
}

impl Display for FakeRootError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::SandboxViolation { target, root } => {
                write!(f, "Path {target:?} escapes the virtual root {root:?}")
            }
            Self::Io { path, kind } => write!(f, "Failed accessing file {path:?}: {kind}"),
        }
    }
}

impl std::error::Error for FakeRootError {}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn responses() {
        let err = FakeRootError::SandboxViolation {
            target: "/srv/secret.txt".into(),
            root: "/srv/uploads/fake-root".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.response_text(), "Bad request");
        assert_eq!(
            err.to_string(),
            r#"Path "/srv/secret.txt" escapes the virtual root "/srv/uploads/fake-root""#
        );

        let err = FakeRootError::Io {
            path: "/srv/uploads/fake-root/file.txt".into(),
            kind: ErrorKind::PermissionDenied,
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.response_text(), "Server error");
    }
}
