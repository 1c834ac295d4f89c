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

//! Mapping requests to the upload directory of the site they belong to

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;

/// Request properties available for site lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext<'a> {
    /// Host name from the `Host` header or request URI, possibly with port
    pub host: Option<&'a str>,
    /// URI path of the request
    pub path: &'a str,
}

/// Determines the upload base directory of the site a request belongs to
///
/// Returning `None` leaves the request to the host’s default processing.
pub trait UploadBaseResolver: Debug + Send + Sync {
    /// Returns the absolute upload base directory for the request if known.
    fn upload_base(&self, request: &RequestContext<'_>) -> Option<PathBuf>;
}

/// Upload base directories from configuration, keyed by host name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteUploadBases {
    default: Option<PathBuf>,
    sites: HashMap<String, PathBuf>,
}

impl SiteUploadBases {
    /// Creates a resolver from the upload base of the default site and upload bases of
    /// individual sites. Host names are matched case-insensitively.
    pub fn new(default: Option<PathBuf>, sites: HashMap<String, PathBuf>) -> Self {
        Self {
            default,
            sites: sites
                .into_iter()
                .map(|(host, path)| (host.to_ascii_lowercase(), path))
                .collect(),
        }
    }

    fn site(&self, host: &str) -> Option<&PathBuf> {
        let host = host.to_ascii_lowercase();
        self.sites.get(&host).or_else(|| {
            let (name, port) = host.rsplit_once(':')?;
            // IPv6 literals without port have colons as well.
            if port.bytes().all(|b| b.is_ascii_digit()) && !name.ends_with(':') {
                self.sites.get(name)
            } else {
                None
            }
        })
    }
}

impl UploadBaseResolver for SiteUploadBases {
    fn upload_base(&self, request: &RequestContext<'_>) -> Option<PathBuf> {
        request
            .host
            .and_then(|host| self.site(host))
            .or(self.default.as_ref())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn context(host: Option<&str>) -> RequestContext<'_> {
        RequestContext { host, path: "/" }
    }

    #[test]
    fn lookup() {
        let resolver = SiteUploadBases::new(
            Some("/srv/uploads".into()),
            HashMap::from([
                ("Example.com".to_owned(), "/srv/sites/2".into()),
                ("localhost:8080".to_owned(), "/srv/sites/3".into()),
                ("[::1]".to_owned(), "/srv/sites/4".into()),
            ]),
        );

        assert_eq!(
            resolver.upload_base(&context(Some("example.com"))),
            Some("/srv/sites/2".into())
        );
        assert_eq!(
            resolver.upload_base(&context(Some("EXAMPLE.COM:443"))),
            Some("/srv/sites/2".into())
        );
        assert_eq!(
            resolver.upload_base(&context(Some("localhost:8080"))),
            Some("/srv/sites/3".into())
        );
        assert_eq!(
            resolver.upload_base(&context(Some("localhost:8081"))),
            Some("/srv/uploads".into())
        );
        assert_eq!(
            resolver.upload_base(&context(Some("[::1]:8080"))),
            Some("/srv/sites/4".into())
        );
        assert_eq!(
            resolver.upload_base(&context(Some("other.example.com"))),
            Some("/srv/uploads".into())
        );
        assert_eq!(
            resolver.upload_base(&context(None)),
            Some("/srv/uploads".into())
        );
    }

    #[test]
    fn no_default() {
        let resolver = SiteUploadBases::new(
            None,
            HashMap::from([("example.com".to_owned(), "/srv/sites/2".into())]),
        );
        assert_eq!(resolver.upload_base(&context(Some("example.net"))), None);
        assert_eq!(resolver.upload_base(&context(None)), None);
    }
}
