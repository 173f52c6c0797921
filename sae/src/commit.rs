//! Commit message framing.
//!
//! ```text
//! group (LE16) || [anti-clogging token] || scalar || element || [password identifier]
//! ```
//!
//! The anti-clogging token has no length prefix. Its presence is inferred
//! from how many bytes remain beyond the fixed-size scalar and element.

use crate::{Error, Result, kdf::MAC_LEN};
use alloc::vec::Vec;
use tracing::debug;

/// Element ID of extension elements.
const ELEMENT_ID_EXTENSION: u8 = 255;

/// Extension element ID of the password identifier element.
const EXTENSION_ID_PASSWORD_IDENTIFIER: u8 = 33;

/// Longest identifier that fits in a single element.
pub(crate) const MAX_PASSWORD_IDENTIFIER_LEN: usize = 254;

/// Fields of a commit message body, after the group id.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct Fields<'a> {
    pub(crate) token: Option<&'a [u8]>,
    pub(crate) scalar: &'a [u8],
    pub(crate) element: &'a [u8],
    pub(crate) password_identifier: Option<&'a [u8]>,
}

/// Split the group id from the rest of the message.
pub(crate) fn split_group(msg: &[u8]) -> Result<(u16, &[u8])> {
    match msg {
        [lo, hi, rest @ ..] => Ok((u16::from_le_bytes([*lo, *hi]), rest)),
        _ => {
            debug!(len = msg.len(), "commit too short for group id");
            Err(Error::MalformedMessage)
        }
    }
}

/// Parse the body of a commit for a group with the given scalar and
/// element lengths.
pub(crate) fn parse(body: &[u8], scalar_len: usize, element_len: usize) -> Result<Fields<'_>> {
    let (token, rest) = split_token(body, scalar_len + element_len);

    if rest.len() < scalar_len {
        debug!(len = rest.len(), "commit too short for scalar");
        return Err(Error::MalformedMessage);
    }
    let (scalar, rest) = rest.split_at(scalar_len);

    if rest.len() < element_len {
        debug!(len = rest.len(), "commit too short for element");
        return Err(Error::MalformedMessage);
    }
    let (element, rest) = rest.split_at(element_len);

    let password_identifier = is_password_identifier(rest).then(|| {
        let len = usize::from(rest[1]);
        &rest[3..2 + len]
    });

    Ok(Fields {
        token,
        scalar,
        element,
        password_identifier,
    })
}

/// Separate a leading anti-clogging token, if the trailing bytes suggest one.
///
/// The split is a heuristic: whatever follows the scalar and element is
/// either a token, a password identifier element, or both, and a tail that
/// fits none of the expected shapes is treated as carrying no token.
fn split_token(body: &[u8], scalar_element_len: usize) -> (Option<&[u8]>, &[u8]) {
    if body.len() <= scalar_element_len {
        return (None, body);
    }

    let mut token_len = body.len() - scalar_element_len;
    if token_len < MAC_LEN {
        debug!(extra = token_len, "too little trailing data for a token");
        return (None, body);
    }

    // a password identifier alone accounts for all extra bytes
    if is_password_identifier(&body[scalar_element_len..]) {
        return (None, body);
    }

    // a password identifier following a token of the length we issue
    let after_token = &body[scalar_element_len + MAC_LEN..];
    if is_password_identifier(after_token) {
        token_len -= 2 + usize::from(after_token[1]);
    }

    debug!(len = token_len, "anti-clogging token present");
    let (token, rest) = body.split_at(token_len);
    (Some(token), rest)
}

/// Is `bytes` a well-formed password identifier element extending to
/// at most the end of the buffer?
pub(crate) fn is_password_identifier(bytes: &[u8]) -> bool {
    match bytes {
        [ELEMENT_ID_EXTENSION, len, EXTENSION_ID_PASSWORD_IDENTIFIER, ..] => {
            *len >= 1 && bytes.len() - 2 >= usize::from(*len)
        }
        _ => false,
    }
}

/// Append a password identifier element.
pub(crate) fn write_password_identifier(out: &mut Vec<u8>, identifier: &[u8]) -> Result<()> {
    if identifier.len() > MAX_PASSWORD_IDENTIFIER_LEN {
        return Err(Error::UnknownPasswordIdentifier);
    }

    out.push(ELEMENT_ID_EXTENSION);
    out.push(1 + identifier.len() as u8);
    out.push(EXTENSION_ID_PASSWORD_IDENTIFIER);
    out.extend_from_slice(identifier);
    Ok(())
}

/// Check a received password identifier against the expected one.
pub(crate) fn check_password_identifier(
    expected: Option<&[u8]>,
    received: Option<&[u8]>,
) -> Result<()> {
    match (expected, received) {
        (Some(_), None) => {
            debug!("password identifier expected but not included");
            Err(Error::UnknownPasswordIdentifier)
        }
        (Some(expected), Some(received)) if expected != received => {
            debug!("password identifier does not match");
            Err(Error::UnknownPasswordIdentifier)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    const SCALAR_LEN: usize = 32;
    const ELEMENT_LEN: usize = 64;

    fn body(token: &[u8], identifier: Option<&[u8]>) -> Vec<u8> {
        let mut out = token.to_vec();
        out.extend_from_slice(&[0x11; SCALAR_LEN]);
        out.extend_from_slice(&[0x22; ELEMENT_LEN]);
        if let Some(identifier) = identifier {
            write_password_identifier(&mut out, identifier).unwrap();
        }
        out
    }

    #[test]
    fn group_id_is_little_endian() {
        assert_eq!(split_group(&[0x13, 0x00, 0xaa]).unwrap(), (19, &[0xaa][..]));
        assert_eq!(split_group(&[0x13]), Err(Error::MalformedMessage));
    }

    #[test]
    fn plain_commit() {
        let msg = body(&[], None);
        let fields = parse(&msg, SCALAR_LEN, ELEMENT_LEN).unwrap();
        assert_eq!(fields.token, None);
        assert_eq!(fields.scalar, &[0x11; SCALAR_LEN]);
        assert_eq!(fields.element, &[0x22; ELEMENT_LEN]);
        assert_eq!(fields.password_identifier, None);
    }

    #[test]
    fn truncated_element() {
        let msg = body(&[], None);
        assert_eq!(
            parse(&msg[..msg.len() - 1], SCALAR_LEN, ELEMENT_LEN),
            Err(Error::MalformedMessage)
        );
        assert_eq!(parse(&msg[..10], SCALAR_LEN, ELEMENT_LEN), Err(Error::MalformedMessage));
    }

    #[test]
    fn token_only() {
        let token = [0x33; 32];
        let msg = body(&token, None);
        let fields = parse(&msg, SCALAR_LEN, ELEMENT_LEN).unwrap();
        assert_eq!(fields.token, Some(&token[..]));
        assert_eq!(fields.scalar, &[0x11; SCALAR_LEN]);
    }

    #[test]
    fn identifier_only() {
        let msg = body(&[], Some(&b"alice"[..]));
        let fields = parse(&msg, SCALAR_LEN, ELEMENT_LEN).unwrap();
        assert_eq!(fields.token, None);
        assert_eq!(fields.password_identifier, Some(&b"alice"[..]));
    }

    #[test]
    fn long_identifier_is_not_mistaken_for_token() {
        let identifier = [b'x'; 40];
        let msg = body(&[], Some(&identifier));
        let fields = parse(&msg, SCALAR_LEN, ELEMENT_LEN).unwrap();
        assert_eq!(fields.token, None);
        assert_eq!(fields.password_identifier, Some(&identifier[..]));
    }

    #[test]
    fn token_and_identifier() {
        let token = [0x44; 32];
        let msg = body(&token, Some(&b"bob"[..]));
        let fields = parse(&msg, SCALAR_LEN, ELEMENT_LEN).unwrap();
        assert_eq!(fields.token, Some(&token[..]));
        assert_eq!(fields.scalar, &[0x11; SCALAR_LEN]);
        assert_eq!(fields.password_identifier, Some(&b"bob"[..]));
    }

    #[test]
    fn short_tail_is_ignored() {
        let mut msg = body(&[], None);
        msg.extend_from_slice(&[0x55; 8]);
        let fields = parse(&msg, SCALAR_LEN, ELEMENT_LEN).unwrap();
        assert_eq!(fields.token, None);
        assert_eq!(fields.scalar, &[0x11; SCALAR_LEN]);
        assert_eq!(fields.password_identifier, None);
    }

    #[test]
    fn identifier_element_shapes() {
        assert!(is_password_identifier(&[255, 2, 33, b'a']));
        assert!(!is_password_identifier(&[255, 3, 33, b'a']));
        assert!(!is_password_identifier(&[255, 0, 33]));
        assert!(!is_password_identifier(&[255, 2, 34, b'a']));
        assert!(!is_password_identifier(&[221, 2, 33, b'a']));
        assert!(!is_password_identifier(&[255, 1]));
    }

    #[test]
    fn identifier_mismatch() {
        assert!(check_password_identifier(None, None).is_ok());
        assert!(check_password_identifier(None, Some(&b"x"[..])).is_ok());
        assert!(check_password_identifier(Some(&b"x"[..]), Some(&b"x"[..])).is_ok());
        assert_eq!(
            check_password_identifier(Some(&b"x"[..]), None),
            Err(Error::UnknownPasswordIdentifier)
        );
        assert_eq!(
            check_password_identifier(Some(&b"x"[..]), Some(&b"y"[..])),
            Err(Error::UnknownPasswordIdentifier)
        );
    }

    #[test]
    fn oversized_identifier_is_rejected() {
        let mut out = vec![];
        assert!(write_password_identifier(&mut out, &[0; 255]).is_err());
        assert!(out.is_empty());
    }
}
