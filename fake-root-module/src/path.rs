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

//! Request path normalization and confinement to the virtual root

use log::{debug, warn};
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

use crate::error::FakeRootError;

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> &std::ffi::OsStr {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    OsStr::from_bytes(bytes)
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> String {
    // Non-Unicode file names cannot be represented here and will result in pass-through.
    String::from_utf8_lossy(bytes).into_owned()
}

/// A decoded request path relative to the virtual root
///
/// The path never starts with a slash and never contains consecutive slashes. An empty path
/// denotes the virtual root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPath(Vec<u8>);

impl NormalizedPath {
    /// Normalizes a raw request URI: strips the query, percent-decodes the remainder, collapses
    /// runs of slashes and removes the leading slash.
    ///
    /// No characters are filtered here. Sandboxing happens during canonicalization in
    /// [`VirtualRoot::confine`].
    pub fn new(request_uri: &str) -> Self {
        let path = request_uri
            .split_once('?')
            .map_or(request_uri, |(path, _)| path);
        let decoded = percent_decode_str(path).collect::<Vec<_>>();

        let mut normalized = Vec::with_capacity(decoded.len());
        for byte in decoded {
            if byte == b'/' && matches!(normalized.last(), Some(b'/') | None) {
                continue;
            }
            normalized.push(byte);
        }
        Self(normalized)
    }

    /// Checks whether this path denotes the virtual root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the decoded path bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Checks whether this path is `prefix` or located below it, comparing whole segments.
    ///
    /// `.` and `..` segments are resolved lexically on both sides, so `/x/../wp-admin` is below
    /// `/wp-admin`. The file system isn’t consulted.
    pub fn is_within(&self, prefix: &NormalizedPath) -> bool {
        lexical_segments(&self.0).starts_with(&lexical_segments(&prefix.0))
    }
}

fn lexical_segments(path: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    for segment in path.split(|byte| *byte == b'/') {
        match segment {
            b"" | b"." => {}
            b".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments
}

/// Canonical location of a site’s virtual root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualRoot {
    base: PathBuf,
}

impl VirtualRoot {
    /// Locates the virtual root `<upload_base>/<subdir_name>` and canonicalizes it.
    ///
    /// Returns `None` if the directory cannot be canonicalized, usually because it doesn’t exist.
    /// Requests for such sites are left to the host.
    pub fn locate(upload_base: &Path, subdir_name: &str) -> Option<Self> {
        let expected = upload_base.join(subdir_name);
        match expected.canonicalize() {
            Ok(base) if base.is_dir() => Some(Self { base }),
            Ok(base) => {
                debug!("virtual root {base:?} is not a directory");
                None
            }
            Err(err) => {
                debug!("failed canonicalizing virtual root {expected:?}: {err}");
                None
            }
        }
    }

    /// The canonical path of the virtual root directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolves a normalized request path against the virtual root.
    ///
    /// Returns `Ok(None)` if the target doesn’t exist or cannot be canonicalized, this is the
    /// regular “not found” case. If the canonical target lies outside the virtual root (e.g.
    /// via a symlink or `..` segments), a [`FakeRootError::SandboxViolation`] error is returned.
    pub fn confine(&self, path: &NormalizedPath) -> Result<Option<PathBuf>, FakeRootError> {
        let joined = if path.is_root() {
            self.base.clone()
        } else {
            self.base.join(path_from_bytes(path.as_bytes()))
        };

        let target = match joined.canonicalize() {
            Ok(target) => target,
            Err(err) => {
                debug!("failed canonicalizing {joined:?}: {err}");
                return Ok(None);
            }
        };

        // Path::starts_with compares whole components, so `fake-root-evil` won’t match
        // `fake-root`.
        if target.starts_with(&self.base) {
            Ok(Some(target))
        } else {
            warn!(
                "resolved path {target:?} is outside the virtual root {:?}",
                self.base
            );
            Err(FakeRootError::SandboxViolation {
                target,
                root: self.base.clone(),
            })
        }
    }
}
