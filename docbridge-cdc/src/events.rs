//! stage two: typed events out of raw windows
use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::transport::ByteTransport;
use docbridge_core::event::{Event, EventCodec};
use log::debug;

/// Decodes each window under the format state the byte source maintains.
/// Events the conveyor has no use for are reported and dropped here, so
/// downstream stages only ever see decodable material.
pub struct EventSource<T> {
    source: ByteSource<T>,
    codec: EventCodec,
    handler: Option<Box<dyn FnMut(&Event)>>,
}

impl<T: ByteTransport> EventSource<T> {
    pub fn new(source: ByteSource<T>) -> Self {
        EventSource {
            source,
            codec: EventCodec::new(),
            handler: None,
        }
    }

    /// validate event checksums instead of only cutting them off
    pub fn verify_checksums(mut self) -> Self {
        self.codec.verify_checksum = true;
        self
    }

    /// observation hook, fired for every yielded event
    pub fn set_handler(&mut self, handler: Box<dyn FnMut(&Event)>) {
        self.handler = Some(handler);
    }

    pub fn next(&mut self) -> Result<Option<Event>> {
        loop {
            let event = {
                let (window, fde) = match self.source.next()? {
                    Some(framed) => framed,
                    None => return Ok(None),
                };
                self.codec.decode(window, fde)
            };
            let event = event.map_err(|e| {
                Error::event(self.source.current_file(), self.source.next_pos(), e)
            })?;
            if let Event::Ignored(raw) = &event {
                debug!(
                    "skipping {:?} (code {})",
                    event.event_type(),
                    raw.header.type_code
                );
                continue;
            }
            if let Some(handler) = &mut self.handler {
                handler(&event);
            }
            return Ok(Some(event));
        }
    }
}
