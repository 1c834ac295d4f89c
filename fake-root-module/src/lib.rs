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

//! # Fake Root Module for Pandora Web Server
//!
//! This crate serves files from a “fake root” directory inside a site’s upload directory as if
//! they were located at the root of the site. For example, with the upload directory
//! `/srv/uploads` a request for `/robots.txt` is answered with `/srv/uploads/fake-root/robots.txt`
//! if that file exists. Anything else is left to the subsequent handlers.
//!
//! ## Supported functionality
//!
//! * `GET` and `HEAD` requests
//! * Multiple sites with their own upload directories, selected by host name
//! * Redirecting `/dir` to `/dir/` and serving `index.html` files for directories
//! * Paths resolving outside the fake root directory, e.g. via `..` segments or symbolic links,
//!   are rejected with `400 Bad Request`
//! * Files with PHP-like extensions are always served as attachment
//! * Offloading file transfer to the front server via `X-Sendfile` or a similar header
//!
//! Directory listings are never produced. Neither are range requests or compression supported.
//!
//! ## Configuration
//!
//! ```yaml
//! upload_base: /srv/uploads
//! sites:
//!     blog.example.com: /srv/sites/2/uploads
//! subdir_name: fake-root
//! cache_max_age: 3600
//! admin_paths: /wp-admin
//! ```
//!
//! ## Code example
//!
//! You will typically create a [`FakeRootHandler`] instance and make your server call it during
//! the `request_filter` stage. Requests it doesn’t handle are passed on to the next handler.
//!
//! ```rust,no_run
//! use clap::Parser;
//! use fake_root_module::{FakeRootConf, FakeRootHandler, FakeRootOpt};
//! use pandora_module_utils::{merge_conf, merge_opt, FromYaml};
//! use startup_module::{DefaultApp, StartupConf, StartupOpt};
//!
//! #[merge_conf]
//! struct Conf {
//!     startup: StartupConf,
//!     fake_root: FakeRootConf,
//! }
//!
//! #[merge_opt]
//! struct Opt {
//!     startup: StartupOpt,
//!     fake_root: FakeRootOpt,
//! }
//!
//! let opt = Opt::parse();
//! let mut conf = Conf::load_from_files(opt.startup.conf.as_deref().unwrap_or(&[])).unwrap();
//! conf.fake_root.merge_with_opt(opt.fake_root);
//!
//! let app = DefaultApp::<FakeRootHandler>::from_conf(conf.fake_root).unwrap();
//! let server = conf.startup.into_server(app, Some(opt.startup)).unwrap();
//!
//! // Do something with the server here, e.g. call server.run_forever()
//! ```
//!
//! The request processing itself doesn’t depend on Pingora and is available via
//! [`FakeRoot::evaluate`].

mod classify;
mod configuration;
mod delivery;
mod directory;
mod error;
mod handler;
pub mod path;
mod pipeline;
mod sniff;
pub mod tenant;

pub use classify::{DeliveryDecision, Disposition, DEFAULT_DANGEROUS_EXTENSIONS};
pub use configuration::{FakeRootConf, FakeRootOpt};
pub use directory::{select_servable, Selection, INDEX_FILE};
pub use error::FakeRootError;
pub use handler::FakeRootHandler;
pub use pipeline::{FakeRoot, Outcome, Response, DEFAULT_SUBDIR_NAME};
pub use tenant::{RequestContext, SiteUploadBases, UploadBaseResolver};
