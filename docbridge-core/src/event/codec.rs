use crate::error::{Error, Result};
use crate::event::{
    Event, EventHeader, FormatDescription, HeartbeatData, LogEventType, RawEvent, RotateData,
    RowsData, TableMapData, XidData,
};
use crate::util::checksum_crc32;
use bytes_cursor::ByteCursor;
use log::debug;

/// Decodes one framed event window into a typed event.
///
/// The window must span exactly one event, header included. The caller
/// lends the format description governing the current stream; the codec
/// never keeps state of its own between events.
#[derive(Debug, Default)]
pub struct EventCodec {
    /// validate the trailing CRC32 of each checksummed event instead of
    /// only cutting it off
    pub verify_checksum: bool,
}

impl EventCodec {
    pub fn new() -> Self {
        EventCodec::default()
    }

    pub fn with_verification() -> Self {
        EventCodec {
            verify_checksum: true,
        }
    }

    pub fn decode(&self, window: &[u8], fde: &FormatDescription) -> Result<Event> {
        let mut cursor = ByteCursor::new(window);
        let header = EventHeader::read_from(&mut cursor)?;
        let event_type = LogEventType::from(header.type_code);

        if fde.has_checksum {
            if self.verify_checksum {
                verify_checksum(window)?;
            }
            if event_type != LogEventType::FormatDescriptionEvent {
                cursor.flip_end(4)?;
            }
        }

        let event = match event_type {
            LogEventType::FormatDescriptionEvent => Event::FormatDescription(RawEvent {
                header,
                data: FormatDescription::read_from(&mut cursor)?,
            }),
            LogEventType::RotateEvent => Event::Rotate(RawEvent {
                header,
                data: RotateData::read_from(&mut cursor, fde)?,
            }),
            LogEventType::TableMapEvent => Event::TableMap(RawEvent {
                header,
                data: TableMapData::read_from(&mut cursor, fde)?,
            }),
            LogEventType::WriteRowsEventV1
            | LogEventType::UpdateRowsEventV1
            | LogEventType::DeleteRowsEventV1
            | LogEventType::WriteRowsEvent
            | LogEventType::UpdateRowsEvent
            | LogEventType::DeleteRowsEvent
            | LogEventType::PartialUpdateRowsEvent => {
                let code = header.type_code;
                Event::Rows(RawEvent {
                    header,
                    data: RowsData::read_from(&mut cursor, fde, event_type, code)?,
                })
            }
            LogEventType::XidEvent => Event::Xid(RawEvent {
                header,
                data: XidData::read_from(&mut cursor)?,
            }),
            LogEventType::HeartbeatLogEvent => Event::Heartbeat(RawEvent {
                header,
                data: HeartbeatData::read_from(&mut cursor)?,
            }),
            other => {
                debug!("not decoding {:?} (code {})", other, header.type_code);
                Event::Ignored(RawEvent { header, data: () })
            }
        };
        Ok(event)
    }
}

fn verify_checksum(window: &[u8]) -> Result<()> {
    if window.len() < 4 {
        return Err(Error::protocol("event too short to carry a checksum"));
    }
    let (body, tail) = window.split_at(window.len() - 4);
    let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let actual = checksum_crc32(body);
    if expected != actual {
        return Err(Error::ChecksumMismatch { expected, actual });
    }
    Ok(())
}
