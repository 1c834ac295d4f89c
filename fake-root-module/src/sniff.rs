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

//! Content sniffing for files without a known extension

use mime_guess::{mime, Mime};
use std::fs::File;
use std::io::{Error, Read};
use std::path::Path;

const SNIFF_LENGTH: u64 = 512;

// Only passive content types here, sniffing must never produce HTML or scripts.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"\0asm", "application/wasm"),
    (b"\x7fELF", "application/octet-stream"),
    (b"ID3", "audio/mpeg"),
    (b"OggS", "application/ogg"),
];

fn sniff_bytes(data: &[u8]) -> Mime {
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM);
    }

    if let Some((_, mime_type)) = SIGNATURES
        .iter()
        .find(|(signature, _)| data.starts_with(signature))
    {
        return mime_type.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM);
    }

    let text = match std::str::from_utf8(data) {
        Ok(text) => Some(text),
        // The sample might end in the middle of a multi-byte character.
        Err(err) if err.error_len().is_none() => {
            std::str::from_utf8(&data[..err.valid_up_to()]).ok()
        }
        Err(_) => None,
    };
    if text.is_some_and(|text| {
        !text.is_empty()
            && text
                .chars()
                .all(|c| !c.is_control() || matches!(c, '\t' | '\r' | '\n'))
    }) {
        mime::TEXT_PLAIN
    } else {
        mime::APPLICATION_OCTET_STREAM
    }
}

/// Determines the MIME type of a file from its first bytes.
pub(crate) fn sniff(path: &Path) -> Result<Mime, Error> {
    let mut data = Vec::new();
    File::open(path)?.take(SNIFF_LENGTH).read_to_end(&mut data)?;
    Ok(sniff_bytes(&data))
}
