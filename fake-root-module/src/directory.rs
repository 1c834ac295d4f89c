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

//! Directory handling: trailing slash redirects and index files

use log::debug;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Name of the default document in a directory
pub const INDEX_FILE: &str = "index.html";

/// Result of applying directory rules to a resolved target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Serve this regular file.
    Serve(PathBuf),
    /// Redirect permanently to this location.
    Redirect(String),
    /// Nothing servable, leave the request to the host.
    PassThrough,
}

fn is_servable(path: &Path) -> bool {
    // Opening the file checks readability, the handle is dropped right away.
    path.metadata().is_ok_and(|meta| meta.is_file()) && File::open(path).is_ok()
}

/// Decides what to serve for a resolved target.
///
/// Directories requested without a trailing slash are redirected to the same URI path with a
/// slash appended, `request_path` is the URI path without the query string. Leading slashes
/// are collapsed in the redirect target so that it cannot become a protocol-relative URL.
/// Otherwise a directory is served via its `index.html` file if one exists. No directory
/// listings are produced.
pub fn select_servable(target: PathBuf, request_path: &str) -> Selection {
    if target.is_dir() {
        if !request_path.ends_with('/') {
            let location = format!("/{}/", request_path.trim_start_matches(['/', '\\']));
            debug!("directory requested without trailing slash, redirecting to {location}");
            return Selection::Redirect(location);
        }

        let index = target.join(INDEX_FILE);
        if is_servable(&index) {
            debug!("using directory index file {index:?}");
            Selection::Serve(index)
        } else {
            debug!("no servable index file in directory {target:?}");
            Selection::PassThrough
        }
    } else if is_servable(&target) {
        Selection::Serve(target)
    } else {
        debug!("{target:?} is not a readable regular file");
        Selection::PassThrough
    }
}
