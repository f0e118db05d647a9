// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `DataValue`.

use std::io::{Read, Write};

use bitflags::bitflags;

use crate::{
    date_time::DateTime,
    encoding::{
        read_u8, write_u8, BinaryDecodable, BinaryEncodable, EncodingResult, UaNullable,
    },
    status_code::StatusCode,
    variant::Variant,
    Context,
};

bitflags! {
    /// Mask of fields present in a `DataValue`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct DataValueFlags: u8 {
        /// False if the value is null.
        const HAS_VALUE = 0x1;
        /// False if the status code is Good.
        const HAS_STATUS = 0x2;
        /// False if the source timestamp is null.
        const HAS_SOURCE_TIMESTAMP = 0x4;
        /// False if the server timestamp is null.
        const HAS_SERVER_TIMESTAMP = 0x8;
        /// False if the source picoseconds interval is zero.
        const HAS_SOURCE_PICOSECONDS = 0x10;
        /// False if the server picoseconds interval is zero.
        const HAS_SERVER_PICOSECONDS = 0x20;
    }
}

/// A value with associated quality and timestamps, as read from or written to an attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value. `None` when the value is null or an error status applies.
    pub value: Option<Variant>,
    /// The status associated with the value. `None` is equivalent to Good.
    pub status: Option<StatusCode>,
    /// The time the value was produced by the source.
    pub source_timestamp: Option<DateTime>,
    /// Additional 10 picosecond resolution for the source timestamp.
    pub source_picoseconds: Option<u16>,
    /// The time the server received the value.
    pub server_timestamp: Option<DateTime>,
    /// Additional 10 picosecond resolution for the server timestamp.
    pub server_picoseconds: Option<u16>,
}

impl UaNullable for DataValue {
    fn is_ua_null(&self) -> bool {
        self.encoding_flags().is_empty()
    }
}

impl BinaryEncodable for DataValue {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        let mut size = 1;
        let encoding_flags = self.encoding_flags();
        if encoding_flags.contains(DataValueFlags::HAS_VALUE) {
            size += self.value.as_ref().unwrap().byte_len(ctx);
        }
        if encoding_flags.contains(DataValueFlags::HAS_STATUS) {
            size += 4;
        }
        if encoding_flags.contains(DataValueFlags::HAS_SOURCE_TIMESTAMP) {
            size += 8;
            if encoding_flags.contains(DataValueFlags::HAS_SOURCE_PICOSECONDS) {
                size += 2;
            }
        }
        if encoding_flags.contains(DataValueFlags::HAS_SERVER_TIMESTAMP) {
            size += 8;
            if encoding_flags.contains(DataValueFlags::HAS_SERVER_PICOSECONDS) {
                size += 2;
            }
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        let encoding_flags = self.encoding_flags();
        write_u8(stream, encoding_flags.bits())?;
        if encoding_flags.contains(DataValueFlags::HAS_VALUE) {
            self.value.as_ref().unwrap().encode(stream, ctx)?;
        }
        if encoding_flags.contains(DataValueFlags::HAS_STATUS) {
            self.status.as_ref().unwrap().encode(stream, ctx)?;
        }
        // Picoseconds are written after their timestamp, and only when the timestamp is present.
        if encoding_flags.contains(DataValueFlags::HAS_SOURCE_TIMESTAMP) {
            self.source_timestamp.as_ref().unwrap().encode(stream, ctx)?;
            if encoding_flags.contains(DataValueFlags::HAS_SOURCE_PICOSECONDS) {
                self.source_picoseconds.as_ref().unwrap().encode(stream, ctx)?;
            }
        }
        if encoding_flags.contains(DataValueFlags::HAS_SERVER_TIMESTAMP) {
            self.server_timestamp.as_ref().unwrap().encode(stream, ctx)?;
            if encoding_flags.contains(DataValueFlags::HAS_SERVER_PICOSECONDS) {
                self.server_picoseconds.as_ref().unwrap().encode(stream, ctx)?;
            }
        }
        Ok(())
    }
}

impl BinaryDecodable for DataValue {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let encoding_flags = DataValueFlags::from_bits_truncate(read_u8(stream)?);
        let value = if encoding_flags.contains(DataValueFlags::HAS_VALUE) {
            Some(Variant::decode(stream, ctx)?)
        } else {
            None
        };
        let status = if encoding_flags.contains(DataValueFlags::HAS_STATUS) {
            Some(StatusCode::decode(stream, ctx)?)
        } else {
            None
        };
        let (source_timestamp, source_picoseconds) =
            if encoding_flags.contains(DataValueFlags::HAS_SOURCE_TIMESTAMP) {
                let timestamp = DateTime::decode(stream, ctx)?;
                let picoseconds = if encoding_flags.contains(DataValueFlags::HAS_SOURCE_PICOSECONDS)
                {
                    Some(u16::decode(stream, ctx)?)
                } else {
                    None
                };
                (Some(timestamp), picoseconds)
            } else {
                (None, None)
            };
        let (server_timestamp, server_picoseconds) =
            if encoding_flags.contains(DataValueFlags::HAS_SERVER_TIMESTAMP) {
                let timestamp = DateTime::decode(stream, ctx)?;
                let picoseconds = if encoding_flags.contains(DataValueFlags::HAS_SERVER_PICOSECONDS)
                {
                    Some(u16::decode(stream, ctx)?)
                } else {
                    None
                };
                (Some(timestamp), picoseconds)
            } else {
                (None, None)
            };
        Ok(DataValue {
            value,
            status,
            source_timestamp,
            source_picoseconds,
            server_timestamp,
            server_picoseconds,
        })
    }
}

impl From<Variant> for DataValue {
    fn from(value: Variant) -> Self {
        DataValue {
            value: Some(value),
            ..Default::default()
        }
    }
}

impl DataValue {
    /// Create a data value with the supplied value and the current time as both timestamps.
    pub fn new_now(value: impl Into<Variant>) -> DataValue {
        let now = DateTime::now();
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
            ..Default::default()
        }
    }

    /// Create an empty data value.
    pub fn null() -> DataValue {
        DataValue::default()
    }

    /// The status code of the value, `Good` when absent.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// Test if the status code is good.
    pub fn is_valid(&self) -> bool {
        self.status().is_good()
    }

    fn encoding_flags(&self) -> DataValueFlags {
        let mut encoding_flags = DataValueFlags::empty();
        if self.value.is_some() {
            encoding_flags |= DataValueFlags::HAS_VALUE;
        }
        if self.status.is_some_and(|s| !s.is_good()) {
            encoding_flags |= DataValueFlags::HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            encoding_flags |= DataValueFlags::HAS_SOURCE_TIMESTAMP;
            if self.source_picoseconds.is_some() {
                encoding_flags |= DataValueFlags::HAS_SOURCE_PICOSECONDS;
            }
        }
        if self.server_timestamp.is_some() {
            encoding_flags |= DataValueFlags::HAS_SERVER_TIMESTAMP;
            if self.server_picoseconds.is_some() {
                encoding_flags |= DataValueFlags::HAS_SERVER_PICOSECONDS;
            }
        }
        encoding_flags
    }
}
