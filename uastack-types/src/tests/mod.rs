// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

mod serialize;
mod variant;

use std::fmt::Debug;
use std::io::Cursor;

use crate::{BinaryDecodable, BinaryEncodable, ContextOwned};

/// Encode a value, decode it again and assert the result is identical.
pub fn serialize_test<T>(value: T)
where
    T: BinaryEncodable + BinaryDecodable + Debug + PartialEq,
{
    let ctx_owned = ContextOwned::default();
    let ctx = ctx_owned.context();
    let buf = value.encode_to_vec(&ctx);
    assert_eq!(buf.len(), value.byte_len(&ctx));
    let mut stream = Cursor::new(buf);
    let decoded = T::decode(&mut stream, &ctx).expect("decode failed");
    assert_eq!(decoded, value);
}
