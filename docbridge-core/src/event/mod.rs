//! event taxonomy and per-event payload parsers
mod codec;
mod fde;
mod header;
mod metadata;
mod rotate;
mod rows;
mod table_map;
mod xid;

pub use codec::EventCodec;
pub use fde::FormatDescription;
pub use header::{EventHeader, EventHeaderFlags};
pub use metadata::MetadataType;
pub use rotate::RotateData;
pub use rows::{RowsData, RowsKind};
pub use table_map::TableMapData;
pub use xid::{HeartbeatData, XidData};

/// Event type codes of the mainline set plus the Maria extension block.
///
/// Codes the bridge does not decode still resolve to a named variant so a
/// skipped event can be reported by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEventType {
    Unknown,
    StartEventV3,
    QueryEvent,
    StopEvent,
    RotateEvent,
    IntvarEvent,
    LoadEvent,
    SlaveEvent,
    CreateFileEvent,
    AppendBlockEvent,
    ExecLoadEvent,
    DeleteFileEvent,
    NewLoadEvent,
    RandEvent,
    UserVarEvent,
    FormatDescriptionEvent,
    XidEvent,
    BeginLoadQueryEvent,
    ExecuteLoadQueryEvent,
    TableMapEvent,
    WriteRowsEventV0,
    UpdateRowsEventV0,
    DeleteRowsEventV0,
    WriteRowsEventV1,
    UpdateRowsEventV1,
    DeleteRowsEventV1,
    IncidentEvent,
    HeartbeatLogEvent,
    IgnorableLogEvent,
    RowsQueryLogEvent,
    WriteRowsEvent,
    UpdateRowsEvent,
    DeleteRowsEvent,
    GtidLogEvent,
    AnonymousGtidLogEvent,
    PreviousGtidsLogEvent,
    TransactionContextEvent,
    ViewChangeEvent,
    XaPrepareLogEvent,
    PartialUpdateRowsEvent,
    TransactionPayloadEvent,
    HeartbeatLogEventV2,
    GtidTaggedLogEvent,
    // Maria extension block, recognized by name only
    MariaAnnotateRowsEvent,
    MariaBinlogCheckpointEvent,
    MariaGtidEvent,
    MariaGtidListEvent,
    MariaStartEncryptionEvent,
    MariaQueryCompressedEvent,
    MariaWriteRowsCompressedEventV1,
    MariaUpdateRowsCompressedEventV1,
    MariaDeleteRowsCompressedEventV1,
    Invalid,
}

impl From<u8> for LogEventType {
    fn from(code: u8) -> LogEventType {
        match code {
            0 => LogEventType::Unknown,
            1 => LogEventType::StartEventV3,
            2 => LogEventType::QueryEvent,
            3 => LogEventType::StopEvent,
            4 => LogEventType::RotateEvent,
            5 => LogEventType::IntvarEvent,
            6 => LogEventType::LoadEvent,
            7 => LogEventType::SlaveEvent,
            8 => LogEventType::CreateFileEvent,
            9 => LogEventType::AppendBlockEvent,
            10 => LogEventType::ExecLoadEvent,
            11 => LogEventType::DeleteFileEvent,
            12 => LogEventType::NewLoadEvent,
            13 => LogEventType::RandEvent,
            14 => LogEventType::UserVarEvent,
            15 => LogEventType::FormatDescriptionEvent,
            16 => LogEventType::XidEvent,
            17 => LogEventType::BeginLoadQueryEvent,
            18 => LogEventType::ExecuteLoadQueryEvent,
            19 => LogEventType::TableMapEvent,
            // v0 row events, written by 5.1.0 ~ 5.1.17 only
            20 => LogEventType::WriteRowsEventV0,
            21 => LogEventType::UpdateRowsEventV0,
            22 => LogEventType::DeleteRowsEventV0,
            // v1 row events, written by 5.1.18 ~ 5.6.x and by MariaDB
            23 => LogEventType::WriteRowsEventV1,
            24 => LogEventType::UpdateRowsEventV1,
            25 => LogEventType::DeleteRowsEventV1,
            26 => LogEventType::IncidentEvent,
            27 => LogEventType::HeartbeatLogEvent,
            28 => LogEventType::IgnorableLogEvent,
            29 => LogEventType::RowsQueryLogEvent,
            30 => LogEventType::WriteRowsEvent,
            31 => LogEventType::UpdateRowsEvent,
            32 => LogEventType::DeleteRowsEvent,
            33 => LogEventType::GtidLogEvent,
            34 => LogEventType::AnonymousGtidLogEvent,
            35 => LogEventType::PreviousGtidsLogEvent,
            36 => LogEventType::TransactionContextEvent,
            37 => LogEventType::ViewChangeEvent,
            38 => LogEventType::XaPrepareLogEvent,
            39 => LogEventType::PartialUpdateRowsEvent,
            40 => LogEventType::TransactionPayloadEvent,
            41 => LogEventType::HeartbeatLogEventV2,
            42 => LogEventType::GtidTaggedLogEvent,
            160 => LogEventType::MariaAnnotateRowsEvent,
            161 => LogEventType::MariaBinlogCheckpointEvent,
            162 => LogEventType::MariaGtidEvent,
            163 => LogEventType::MariaGtidListEvent,
            164 => LogEventType::MariaStartEncryptionEvent,
            165 => LogEventType::MariaQueryCompressedEvent,
            166 => LogEventType::MariaWriteRowsCompressedEventV1,
            167 => LogEventType::MariaUpdateRowsCompressedEventV1,
            168 => LogEventType::MariaDeleteRowsCompressedEventV1,
            _ => LogEventType::Invalid,
        }
    }
}

/// one event with its common header
#[derive(Debug, Clone)]
pub struct RawEvent<D> {
    pub header: EventHeader,
    pub data: D,
}

/// Typed view of a decoded event window.
///
/// Everything the conveyor does not act on arrives as `Ignored`, which the
/// event source drops after reporting it.
#[derive(Debug, Clone)]
pub enum Event {
    FormatDescription(RawEvent<FormatDescription>),
    Rotate(RawEvent<RotateData>),
    TableMap(RawEvent<TableMapData>),
    Rows(RawEvent<RowsData>),
    Xid(RawEvent<XidData>),
    Heartbeat(RawEvent<HeartbeatData>),
    Ignored(RawEvent<()>),
}

impl Event {
    pub fn header(&self) -> &EventHeader {
        match self {
            Event::FormatDescription(ev) => &ev.header,
            Event::Rotate(ev) => &ev.header,
            Event::TableMap(ev) => &ev.header,
            Event::Rows(ev) => &ev.header,
            Event::Xid(ev) => &ev.header,
            Event::Heartbeat(ev) => &ev.header,
            Event::Ignored(ev) => &ev.header,
        }
    }

    pub fn event_type(&self) -> LogEventType {
        LogEventType::from(self.header().type_code)
    }
}
