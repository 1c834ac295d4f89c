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

//! Handler for the `request_filter` phase.

use async_trait::async_trait;
use http::{HeaderName, Method, StatusCode};
use log::{debug, warn};
use pandora_module_utils::pingora::{Error, ErrorType, SessionWrapper};
use pandora_module_utils::standard_response::redirect_response;
use pandora_module_utils::{RequestFilter, RequestFilterResult};
use std::path::{Component, Path};
use std::sync::Arc;

use crate::configuration::FakeRootConf;
use crate::delivery::{error_response, file_response, DeliverySettings};
use crate::path::NormalizedPath;
use crate::pipeline::{FakeRoot, Outcome, Response};
use crate::tenant::{RequestContext, SiteUploadBases, UploadBaseResolver};

fn is_admin_path(path: &str, admin_paths: &[NormalizedPath]) -> bool {
    let path = NormalizedPath::new(path);
    admin_paths.iter().any(|prefix| path.is_within(prefix))
}

fn validate_subdir_name(name: &str) -> Result<(), Box<Error>> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(Error::explain(
            ErrorType::InternalError,
            format!("invalid fake root directory name {name:?}"),
        )),
    }
}

/// Handler for Pingora’s `request_filter` phase
#[derive(Debug, Clone)]
pub struct FakeRootHandler {
    pipeline: FakeRoot,
    resolver: Arc<dyn UploadBaseResolver>,
    settings: DeliverySettings,
    admin_paths: Vec<NormalizedPath>,
}

impl FakeRootHandler {
    /// Creates a new handler that determines upload directories with a custom resolver. The
    /// `upload_base` and `sites` configuration settings are ignored then.
    ///
    /// This will fail on an invalid `subdir_name` or `offload_header` setting.
    pub fn with_resolver(
        conf: FakeRootConf,
        resolver: Arc<dyn UploadBaseResolver>,
    ) -> Result<Self, Box<Error>> {
        validate_subdir_name(&conf.subdir_name)?;

        let offload_header = if conf.use_offload_header {
            Some(
                HeaderName::from_bytes(conf.offload_header.as_bytes()).map_err(|err| {
                    Error::because(
                        ErrorType::InternalError,
                        format!("invalid offload header name {:?}", conf.offload_header),
                        err,
                    )
                })?,
            )
        } else {
            None
        };

        let handler = Self {
            pipeline: FakeRoot::new(conf.subdir_name, conf.dangerous_extensions.into_inner()),
            resolver,
            settings: DeliverySettings::new(conf.cache_max_age, offload_header),
            admin_paths: conf
                .admin_paths
                .iter()
                .map(|prefix| NormalizedPath::new(prefix))
                .collect(),
        };
        debug!("Initialized fake root handler: {handler:#?}");
        Ok(handler)
    }
}

impl TryFrom<FakeRootConf> for FakeRootHandler {
    type Error = Box<Error>;

    fn try_from(mut conf: FakeRootConf) -> Result<Self, Self::Error> {
        let resolver =
            SiteUploadBases::new(conf.upload_base.take(), std::mem::take(&mut conf.sites));
        Self::with_resolver(conf, Arc::new(resolver))
    }
}

#[async_trait]
impl RequestFilter for FakeRootHandler {
    type Conf = FakeRootConf;

    type CTX = ();

    fn new_ctx() -> Self::CTX {}

    async fn request_filter(
        &self,
        session: &mut impl SessionWrapper,
        _ctx: &mut Self::CTX,
    ) -> Result<RequestFilterResult, Box<Error>> {
        let method = &session.req_header().method;
        if method != Method::GET && method != Method::HEAD {
            debug!("not handling {method} request");
            return Ok(RequestFilterResult::Unhandled);
        }

        let path = session.uri().path();
        if is_admin_path(path, &self.admin_paths) {
            debug!("not handling administrative request {path}");
            return Ok(RequestFilterResult::Unhandled);
        }

        let upload_base = {
            let host = session.host();
            self.resolver.upload_base(&RequestContext {
                host: host.as_deref(),
                path,
            })
        };

        let outcome = self.pipeline.evaluate(upload_base.as_deref(), path);
        match outcome {
            Outcome::PassThrough => {
                debug!("no fake root file for {path}");
                Ok(RequestFilterResult::Unhandled)
            }
            Outcome::Reject(err) => {
                warn!("rejecting request for {path}: {err}");
                error_response(session, &err).await?;
                Ok(RequestFilterResult::ResponseSent)
            }
            Outcome::Handled(Response::Redirect { location }) => {
                redirect_response(session, StatusCode::MOVED_PERMANENTLY, &location).await?;
                Ok(RequestFilterResult::ResponseSent)
            }
            Outcome::Handled(Response::File { path, decision }) => {
                file_response(session, &path, &decision, &self.settings).await?;
                Ok(RequestFilterResult::ResponseSent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn admin_paths() {
        let admin_paths = vec![
            NormalizedPath::new("/wp-admin"),
            NormalizedPath::new("/manage/"),
        ];
        assert!(is_admin_path("/wp-admin", &admin_paths));
        assert!(is_admin_path("/wp-admin/index.php", &admin_paths));
        assert!(is_admin_path("//wp-admin/index.php", &admin_paths));
        assert!(is_admin_path("/%77p-admin/index.php", &admin_paths));
        assert!(is_admin_path("/./wp-admin/../wp-admin/index.php", &admin_paths));
        assert!(is_admin_path("/manage", &admin_paths));
        assert!(is_admin_path("/manage/users", &admin_paths));
        assert!(!is_admin_path("/wp-admin-assets/logo.png", &admin_paths));
        assert!(!is_admin_path("/wp-admin/../file.txt", &admin_paths));
        assert!(!is_admin_path("/", &admin_paths));
        assert!(!is_admin_path("/file.txt", &[]));
    }

    #[test]
    fn subdir_names() {
        assert!(validate_subdir_name("fake-root").is_ok());
        assert!(validate_subdir_name(".well-known").is_ok());
        assert!(validate_subdir_name("").is_err());
        assert!(validate_subdir_name(".").is_err());
        assert!(validate_subdir_name("..").is_err());
        assert!(validate_subdir_name("a/b").is_err());
        assert!(validate_subdir_name("/abs").is_err());
    }

    #[test]
    fn invalid_conf() {
        let conf = FakeRootConf {
            subdir_name: "../escape".to_owned(),
            ..Default::default()
        };
        assert!(FakeRootHandler::try_from(conf).is_err());

        let conf = FakeRootConf {
            use_offload_header: true,
            offload_header: "Bad Header".to_owned(),
            ..Default::default()
        };
        assert!(FakeRootHandler::try_from(conf).is_err());

        let conf = FakeRootConf {
            use_offload_header: false,
            offload_header: "Bad Header".to_owned(),
            ..Default::default()
        };
        assert!(FakeRootHandler::try_from(conf).is_ok());
    }
}
