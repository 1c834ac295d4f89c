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

//! Data structures required for `FakeRootHandler` configuration

use clap::Parser;
use pandora_module_utils::{DeserializeMap, OneOrMany};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::classify::DEFAULT_DANGEROUS_EXTENSIONS;
use crate::pipeline::DEFAULT_SUBDIR_NAME;

/// Command line options of the fake root module
#[derive(Debug, Default, Parser)]
pub struct FakeRootOpt {
    /// Upload directory of the default site. The files are served from its fake root
    /// subdirectory.
    #[clap(long, value_parser = clap::value_parser!(OsString))]
    pub upload_base: Option<PathBuf>,

    /// Name of the directory inside the upload directory to serve files from.
    #[clap(long)]
    pub subdir_name: Option<String>,

    /// Let the front server transfer files, only send a header with the file path.
    #[clap(long)]
    pub use_offload_header: Option<bool>,

    /// Value of the Cache-Control max-age parameter in seconds.
    #[clap(long)]
    pub cache_max_age: Option<u64>,
}

/// Configuration file settings of the fake root module
#[derive(Debug, Clone, PartialEq, Eq, DeserializeMap)]
pub struct FakeRootConf {
    /// Upload directory of the default site, used for requests not matching any entry in
    /// `sites`.
    pub upload_base: Option<PathBuf>,

    /// Upload directories by host name for multisite setups.
    pub sites: HashMap<String, PathBuf>,

    /// Name of the directory inside the upload directory to serve files from.
    pub subdir_name: String,

    /// If `true`, file contents aren’t sent. Instead, the header configured in `offload_header`
    /// tells the front server which file to send.
    pub use_offload_header: bool,

    /// Name of the header used for offloading, e.g. `X-Sendfile` or `X-Accel-Redirect`.
    pub offload_header: String,

    /// Value of the `Cache-Control` max-age parameter in seconds. Caching is disabled by
    /// default, page caches in front of the server tend to conflict with it.
    pub cache_max_age: u64,

    /// URI path prefixes of administrative requests. These are never handled.
    pub admin_paths: OneOrMany<String>,

    /// File extensions always served as attachment.
    pub dangerous_extensions: OneOrMany<String>,
}

impl FakeRootConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: FakeRootOpt) {
        if opt.upload_base.is_some() {
            self.upload_base = opt.upload_base;
        }

        if let Some(subdir_name) = opt.subdir_name {
            self.subdir_name = subdir_name;
        }

        if let Some(use_offload_header) = opt.use_offload_header {
            self.use_offload_header = use_offload_header;
        }

        if let Some(cache_max_age) = opt.cache_max_age {
            self.cache_max_age = cache_max_age;
        }
    }
}

impl Default for FakeRootConf {
    fn default() -> Self {
        Self {
            upload_base: None,
            sites: HashMap::new(),
            subdir_name: DEFAULT_SUBDIR_NAME.to_owned(),
            use_offload_header: false,
            offload_header: "X-Sendfile".to_owned(),
            cache_max_age: 0,
            admin_paths: Default::default(),
            dangerous_extensions: DEFAULT_DANGEROUS_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_owned())
                .collect::<Vec<_>>()
                .into(),
        }
    }
}
