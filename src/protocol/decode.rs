//! Protocol message decoding

use super::constants::{auth, tags};
use super::message::{AuthenticationMessage, BackendMessage, ErrorFields};
use bytes::Bytes;
use std::io;

/// Maximum message length (1 GB), matching PostgreSQL's own `PQ_LARGE_MESSAGE_LIMIT`.
///
/// Any message whose length field exceeds this value is rejected before allocation
/// to prevent denial-of-service via crafted length headers.
const MAX_MESSAGE_LENGTH: usize = 1_073_741_824;

/// Decode one backend message from the front of `data`.
///
/// # Returns
/// `Ok(Some((msg, consumed)))` - a full frame was decoded; the caller advances by `consumed`
/// `Ok(None)` - the buffer does not yet hold a full frame
/// `Err(e)` - the frame is malformed
pub fn decode_message(data: &[u8]) -> io::Result<Option<(BackendMessage, usize)>> {
    if data.len() < 5 {
        return Ok(None);
    }

    let tag = data[0];
    let len = i32::from_be_bytes([data[1], data[2], data[3], data[4]]);

    if len < 4 {
        return Err(invalid(format!("invalid message length {}", len)));
    }
    let len = len as usize;
    if len > MAX_MESSAGE_LENGTH {
        return Err(invalid(format!(
            "message length {} exceeds maximum allowed {}",
            len, MAX_MESSAGE_LENGTH
        )));
    }

    if data.len() < len + 1 {
        return Ok(None);
    }

    let body = &data[5..len + 1];

    let msg = match tag {
        tags::AUTHENTICATION => decode_authentication(body)?,
        tags::BACKEND_KEY_DATA => decode_backend_key_data(body)?,
        tags::ERROR_RESPONSE => BackendMessage::ErrorResponse(decode_error_fields(body)?),
        tags::NOTICE_RESPONSE => BackendMessage::NoticeResponse(decode_error_fields(body)?),
        tags::PARAMETER_STATUS => decode_parameter_status(body)?,
        tags::READY_FOR_QUERY => decode_ready_for_query(body)?,
        _ => BackendMessage::Other {
            tag,
            body: Bytes::copy_from_slice(body),
        },
    };

    Ok(Some((msg, len + 1)))
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn read_i32(data: &[u8], what: &str) -> io::Result<i32> {
    data.get(..4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| invalid(format!("truncated {}", what)))
}

/// Read a null-terminated string, returning it and the remaining bytes
fn read_cstr<'a>(data: &'a [u8], what: &str) -> io::Result<(String, &'a [u8])> {
    let end = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| invalid(format!("missing null terminator in {}", what)))?;
    let value = String::from_utf8_lossy(&data[..end]).into_owned();
    Ok((value, &data[end + 1..]))
}

fn decode_authentication(data: &[u8]) -> io::Result<BackendMessage> {
    let auth_type = read_i32(data, "auth type")?;
    let rest = &data[4..];

    let auth_msg = match auth_type {
        auth::OK => AuthenticationMessage::Ok,
        auth::CLEARTEXT_PASSWORD => AuthenticationMessage::CleartextPassword,
        auth::MD5_PASSWORD => {
            let salt: [u8; 4] = rest
                .get(..4)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| invalid("truncated salt data"))?;
            AuthenticationMessage::Md5Password { salt }
        }
        auth::SASL => {
            // Mechanism list: null-terminated names, closed by an empty name
            let mut mechanisms = Vec::new();
            let mut remaining = rest;
            while !remaining.is_empty() {
                let (mechanism, tail) = read_cstr(remaining, "SASL mechanism")?;
                if mechanism.is_empty() {
                    break;
                }
                mechanisms.push(mechanism);
                remaining = tail;
            }
            AuthenticationMessage::Sasl { mechanisms }
        }
        auth::SASL_CONTINUE => AuthenticationMessage::SaslContinue {
            data: rest.to_vec(),
        },
        auth::SASL_FINAL => AuthenticationMessage::SaslFinal {
            data: rest.to_vec(),
        },
        other => AuthenticationMessage::Unsupported(other),
    };

    Ok(BackendMessage::Authentication(auth_msg))
}

fn decode_backend_key_data(data: &[u8]) -> io::Result<BackendMessage> {
    let process_id = read_i32(data, "backend key data")? as u32;
    let secret_key = read_i32(&data[4..], "backend key data")? as u32;
    Ok(BackendMessage::BackendKeyData {
        process_id,
        secret_key,
    })
}

fn decode_error_fields(data: &[u8]) -> io::Result<ErrorFields> {
    let mut fields = ErrorFields::default();
    let mut remaining = data;

    while let Some((&field_type, rest)) = remaining.split_first() {
        if field_type == 0 {
            break;
        }
        let (value, tail) = read_cstr(rest, "error field")?;
        remaining = tail;

        let slot = match field_type {
            b'S' => &mut fields.severity,
            b'V' => &mut fields.severity_nonlocalized,
            b'C' => &mut fields.code,
            b'M' => &mut fields.message,
            b'D' => &mut fields.detail,
            b'H' => &mut fields.hint,
            b'P' => &mut fields.position,
            b'p' => &mut fields.internal_position,
            b'q' => &mut fields.internal_query,
            b'W' => &mut fields.where_,
            b's' => &mut fields.schema,
            b't' => &mut fields.table,
            b'c' => &mut fields.column,
            b'd' => &mut fields.data_type,
            b'n' => &mut fields.constraint,
            b'F' => &mut fields.file,
            b'L' => &mut fields.line,
            b'R' => &mut fields.routine,
            // Unknown field types must be ignored per the protocol docs
            _ => continue,
        };
        *slot = Some(value);
    }

    Ok(fields)
}

fn decode_parameter_status(data: &[u8]) -> io::Result<BackendMessage> {
    let (name, rest) = read_cstr(data, "parameter name")?;
    let (value, _) = read_cstr(rest, "parameter value")?;
    Ok(BackendMessage::ParameterStatus { name, value })
}

fn decode_ready_for_query(data: &[u8]) -> io::Result<BackendMessage> {
    let status = *data
        .first()
        .ok_or_else(|| invalid("missing transaction status byte"))?;
    Ok(BackendMessage::ReadyForQuery { status })
}
