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

//! Content type and disposition of files to be served

use log::{debug, warn};
use mime_guess::{mime, Mime};
use std::io::{Error, ErrorKind};
use std::path::Path;

use crate::sniff::sniff;

/// Extensions served as attachment by default: PHP scripts, server pages and archives
pub const DEFAULT_DANGEROUS_EXTENSIONS: &[&str] = &[
    "php", "php3", "php4", "php5", "php7", "php8", "phtml", "phar", "phps", "pht",
];

/// How the browser should treat the response body
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Display inline, the default.
    Inline,
    /// Force a download, the file is never rendered or executed.
    Attachment,
}

/// Everything the response needs to know about a file
///
/// This is computed anew for each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryDecision {
    /// MIME type of the file
    pub mime: Mime,
    /// File size in bytes
    pub size: u64,
    /// `true` if the file has one of the dangerous extensions
    pub dangerous: bool,
    /// Inline or attachment
    pub disposition: Disposition,
    /// File name for the `Content-Disposition` header
    pub file_name: String,
}

impl DeliveryDecision {
    /// Classifies the file at `path`. `dangerous_extensions` are expected to be lower-case.
    ///
    /// The MIME type is guessed from the file extension, with content sniffing as fallback.
    /// This will result in a [`ErrorKind::InvalidInput`] error if the path doesn’t point to a
    /// regular file and pass on any errors from retrieving metadata.
    pub fn from_path(path: &Path, dangerous_extensions: &[String]) -> Result<Self, Error> {
        let meta = path.metadata()?;
        if !meta.is_file() {
            return Err(ErrorKind::InvalidInput.into());
        }

        let mime = match mime_guess::from_path(path).first() {
            Some(mime) => mime,
            None => sniff(path).unwrap_or_else(|err| {
                warn!("failed sniffing content type of {path:?}: {err}");
                mime::APPLICATION_OCTET_STREAM
            }),
        };

        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let dangerous = !extension.is_empty()
            && dangerous_extensions
                .iter()
                .any(|dangerous| *dangerous == extension);
        if dangerous {
            debug!("file {path:?} has dangerous extension {extension}, serving as attachment");
        }

        Ok(Self {
            mime,
            size: meta.len(),
            dangerous,
            disposition: if dangerous {
                Disposition::Attachment
            } else {
                Disposition::Inline
            },
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    /// Produces the `Content-Disposition` header value for attachments.
    pub fn content_disposition(&self) -> Option<String> {
        match self.disposition {
            Disposition::Inline => None,
            Disposition::Attachment => {
                let mut value = String::from("attachment; filename=\"");
                for c in self.file_name.chars() {
                    match c {
                        '"' | '\\' => {
                            value.push('\\');
                            value.push(c);
                        }
                        c if c.is_control() => value.push('_'),
                        c => value.push(c),
                    }
                }
                value.push('"');
                Some(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use test_log::test;

    fn dangerous() -> Vec<String> {
        DEFAULT_DANGEROUS_EXTENSIONS
            .iter()
            .map(|ext| (*ext).to_owned())
            .collect()
    }

    #[test]
    fn mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("style.css"), "body {}").unwrap();

        let decision = DeliveryDecision::from_path(&dir.path().join("page.html"), &dangerous())
            .unwrap();
        assert_eq!(decision.mime, mime::TEXT_HTML);
        assert_eq!(decision.size, 13);
        assert!(!decision.dangerous);
        assert_eq!(decision.disposition, Disposition::Inline);
        assert_eq!(decision.content_disposition(), None);

        let decision = DeliveryDecision::from_path(&dir.path().join("style.css"), &dangerous())
            .unwrap();
        assert_eq!(decision.mime, mime::TEXT_CSS);
    }

    #[test]
    fn mime_from_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README"), "Read me!\n").unwrap();
        fs::write(dir.path().join("image.unknownext"), b"\x89PNG\r\n\x1a\n....").unwrap();
        fs::write(dir.path().join("blob"), b"\0\x01\x02").unwrap();

        let decision =
            DeliveryDecision::from_path(&dir.path().join("README"), &dangerous()).unwrap();
        assert_eq!(decision.mime, mime::TEXT_PLAIN);

        let decision =
            DeliveryDecision::from_path(&dir.path().join("image.unknownext"), &dangerous())
                .unwrap();
        assert_eq!(decision.mime, mime::IMAGE_PNG);

        let decision =
            DeliveryDecision::from_path(&dir.path().join("blob"), &dangerous()).unwrap();
        assert_eq!(decision.mime, mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn dangerous_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["index.php", "SHELL.PHP", "lib.phar", "view.phtml", "a\"b.php"] {
            fs::write(dir.path().join(name), "<?php echo 1;").unwrap();
            let decision =
                DeliveryDecision::from_path(&dir.path().join(name), &dangerous()).unwrap();
            assert!(decision.dangerous, "{name} should be dangerous");
            assert_eq!(decision.disposition, Disposition::Attachment);
        }

        let decision =
            DeliveryDecision::from_path(&dir.path().join("index.php"), &dangerous()).unwrap();
        assert_eq!(
            decision.content_disposition().as_deref(),
            Some("attachment; filename=\"index.php\"")
        );

        let decision =
            DeliveryDecision::from_path(&dir.path().join("a\"b.php"), &dangerous()).unwrap();
        assert_eq!(
            decision.content_disposition().as_deref(),
            Some("attachment; filename=\"a\\\"b.php\"")
        );

        fs::write(dir.path().join("php"), "no extension").unwrap();
        let decision = DeliveryDecision::from_path(&dir.path().join("php"), &dangerous()).unwrap();
        assert!(!decision.dangerous);
    }

    #[test]
    fn not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeliveryDecision::from_path(dir.path(), &dangerous()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err =
            DeliveryDecision::from_path(&dir.path().join("missing"), &dangerous()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
