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

//! Writing responses to Pingora session.

use bytes::BytesMut;
use http::{header, HeaderName, HeaderValue, Method, StatusCode};
use log::{error, info};
use pandora_module_utils::pingora::{Error, ErrorType, ResponseHeader, SessionWrapper};
use std::cmp::min;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::classify::DeliveryDecision;
use crate::error::FakeRootError;

const BUFFER_SIZE: usize = 64 * 1024;

/// Response settings shared by all requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeliverySettings {
    /// `Cache-Control` header value
    pub(crate) cache_control: String,
    /// Header telling the front server which file to send, if offloading is enabled
    pub(crate) offload_header: Option<HeaderName>,
}

impl DeliverySettings {
    pub(crate) fn new(cache_max_age: u64, offload_header: Option<HeaderName>) -> Self {
        Self {
            cache_control: format!("public, max-age={cache_max_age}"),
            offload_header,
        }
    }
}

fn path_header_value(path: &Path) -> Result<HeaderValue, Box<Error>> {
    HeaderValue::from_bytes(path.as_os_str().as_encoded_bytes()).map_err(|err| {
        Error::because(
            ErrorType::InternalError,
            format!("file path {path:?} cannot be used in a header"),
            err,
        )
    })
}

fn response_header(
    decision: &DeliveryDecision,
    settings: &DeliverySettings,
    content_length: u64,
) -> Result<ResponseHeader, Box<Error>> {
    let mut header = ResponseHeader::build(StatusCode::OK, Some(5))?;
    header.append_header(header::CONTENT_TYPE, decision.mime.as_ref())?;
    header.append_header(header::CONTENT_LENGTH, content_length.to_string())?;
    header.append_header(header::CACHE_CONTROL, settings.cache_control.as_str())?;
    if let Some(disposition) = decision.content_disposition() {
        header.append_header(header::CONTENT_DISPOSITION, disposition)?;
    }
    Ok(header)
}

/// Responds with a short plain text message.
pub(crate) async fn text_response(
    session: &mut impl SessionWrapper,
    status: StatusCode,
    text: &'static str,
) -> Result<(), Box<Error>> {
    let mut header = ResponseHeader::build(status, Some(2))?;
    header.append_header(header::CONTENT_TYPE, "text/plain; charset=utf-8")?;
    header.append_header(header::CONTENT_LENGTH, text.len().to_string())?;

    let send_body = session.req_header().method != Method::HEAD;
    session
        .write_response_header(Box::new(header), !send_body)
        .await?;
    if send_body {
        session.write_response_body(Some(text.into()), true).await?;
    }
    Ok(())
}

/// Responds with an error page for a failed request.
pub(crate) async fn error_response(
    session: &mut impl SessionWrapper,
    err: &FakeRootError,
) -> Result<(), Box<Error>> {
    text_response(session, err.status(), err.response_text()).await
}

/// Sends the file as response, replacing any response prepared previously.
///
/// With offloading enabled, only the headers are sent and the front server is expected to
/// substitute the body. `Content-Length` is `0` then, matching the empty body actually sent.
/// Otherwise the file is streamed in chunks. A file that cannot be opened
/// results in a `500 Internal Server Error` response.
pub(crate) async fn file_response(
    session: &mut impl SessionWrapper,
    path: &Path,
    decision: &DeliveryDecision,
    settings: &DeliverySettings,
) -> Result<(), Box<Error>> {
    if let Some(offload_header) = &settings.offload_header {
        // The body is empty here, the front server determines the actual length.
        let mut header = response_header(decision, settings, 0)?;
        header.append_header(offload_header.clone(), path_header_value(path)?)?;
        info!("offloading delivery of {path:?} via {offload_header}");
        session.write_response_header(Box::new(header), true).await?;
        return Ok(());
    }

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            let err = FakeRootError::Io {
                path: path.to_path_buf(),
                kind: err.kind(),
            };
            error!("{err}");
            return error_response(session, &err).await;
        }
    };

    let send_body = session.req_header().method != Method::HEAD && decision.size > 0;
    let header = response_header(decision, settings, decision.size)?;
    session
        .write_response_header(Box::new(header), !send_body)
        .await?;
    if !send_body {
        return Ok(());
    }

    let mut remaining = decision.size;
    while remaining > 0 {
        let mut buf = BytesMut::zeroed(min(remaining, BUFFER_SIZE as u64) as usize);
        let len = file.read(buf.as_mut()).map_err(|err| {
            error!("failed reading data from {path:?}: {err}");
            Error::new(ErrorType::ReadError)
        })?;

        if len == 0 {
            error!("file {path:?} ended with {remaining} bytes left to be written");
            return Err(Error::new(ErrorType::ReadError));
        }

        buf.truncate(len);
        remaining -= len as u64;
        session
            .write_response_body(Some(buf.freeze()), remaining == 0)
            .await?;
    }

    Ok(())
}
