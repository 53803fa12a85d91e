//! full-conveyor tests over synthesized binlog files
use docbridge_cdc::{
    ByteSource, DocStore, DocumentSink, Error, EventSource, MemoryStore, Params, Pipeline, Plan,
    TableDiffSource,
};
use docbridge_core::event::FormatDescription;
use docbridge_core::util::checksum_crc32;
use docbridge_core::{BINLOG_MAGIC, LOG_EVENT_HEADER_LEN, ST_SERVER_VER_LEN};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;

const FDE: u8 = 15;
const XID: u8 = 16;
const TABLE_MAP: u8 = 19;
const WRITE_ROWS: u8 = 30;
const UPDATE_ROWS: u8 = 31;
const DELETE_ROWS: u8 = 32;
const GTID: u8 = 33;
const HEARTBEAT: u8 = 27;

const TABLE_ID: u64 = 1742;

/// builds a checksummed binlog file event by event
struct BinlogFile {
    bytes: Vec<u8>,
}

impl BinlogFile {
    fn new() -> Self {
        BinlogFile {
            bytes: BINLOG_MAGIC.to_le_bytes().to_vec(),
        }
    }

    fn push_event(&mut self, type_code: u8, payload: &[u8]) {
        let size = LOG_EVENT_HEADER_LEN + payload.len() + 4;
        let log_pos = (self.bytes.len() + size) as u32;
        let mut event = Vec::with_capacity(size);
        event.extend_from_slice(&1749148873u32.to_le_bytes());
        event.push(type_code);
        event.extend_from_slice(&1u32.to_le_bytes());
        event.extend_from_slice(&(size as u32).to_le_bytes());
        event.extend_from_slice(&log_pos.to_le_bytes());
        event.extend_from_slice(&0u16.to_le_bytes());
        event.extend_from_slice(payload);
        let crc = checksum_crc32(&event);
        event.extend_from_slice(&crc.to_le_bytes());
        self.bytes.extend_from_slice(&event);
    }

    fn write(self, name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("docbridge-fixture-{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&self.bytes).unwrap();
        path
    }
}

fn fde_payload() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&4u16.to_le_bytes());
    let mut version = [0u8; ST_SERVER_VER_LEN];
    version[..6].copy_from_slice(b"8.0.41");
    payload.extend_from_slice(&version);
    payload.extend_from_slice(&1749148873u32.to_le_bytes());
    payload.push(19);
    payload.extend_from_slice(&FormatDescription::default().post_header_len);
    payload.push(1); // checksum algorithm: CRC32
    payload
}

/// `e_store.table`: _id BIGINT UNSIGNED PRIMARY KEY, s_tinyint TINYINT,
/// s_smallint SMALLINT, s_medium MEDIUMINT, s_int INT, s_bigint BIGINT,
/// double DOUBLE, bool BOOL, char CHAR(16), small_varchar VARCHAR(10),
/// big_varchar VARCHAR(300)
fn table_map_payload() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&TABLE_ID.to_le_bytes()[..6]);
    payload.extend_from_slice(&1u16.to_le_bytes());
    payload.push(7);
    payload.extend_from_slice(b"e_store\0");
    payload.push(5);
    payload.extend_from_slice(b"table\0");
    payload.push(11); // column count
    payload.extend_from_slice(&[0x08, 0x01, 0x02, 0x09, 0x03, 0x08, 0x05, 0xf4, 0xfe, 0x0f, 0x0f]);
    payload.push(7); // metadata size
    payload.push(8); // double: pack length
    payload.extend_from_slice(&[0xfe, 64]); // char(16): real type, cells * 4
    payload.extend_from_slice(&10u16.to_le_bytes()); // small_varchar max length
    payload.extend_from_slice(&300u16.to_le_bytes()); // big_varchar max length
    payload.extend_from_slice(&[0x00, 0x00]); // null bits
    // optional metadata
    payload.push(1); // signedness
    payload.push(1);
    payload.push(0x80);
    payload.push(4); // column names
    let names = [
        "_id",
        "s_tinyint",
        "s_smallint",
        "s_medium",
        "s_int",
        "s_bigint",
        "double",
        "bool",
        "char",
        "small_varchar",
        "big_varchar",
    ];
    let mut name_block = Vec::new();
    for name in &names {
        name_block.push(name.len() as u8);
        name_block.extend_from_slice(name.as_bytes());
    }
    payload.push(name_block.len() as u8);
    payload.extend_from_slice(&name_block);
    payload.push(8); // simple primary key
    payload.push(1);
    payload.push(0);
    payload
}

#[derive(Clone, Copy)]
struct Row {
    id: u64,
    s_tinyint: i8,
    s_smallint: i16,
    s_medium: i32,
    s_int: i32,
    s_bigint: i64,
    double: f64,
    flag: bool,
    fixed: &'static str,
    small: &'static str,
    big: &'static str,
}

fn encode_row(row: &Row) -> Vec<u8> {
    assert_eq!(16, row.fixed.len());
    let mut out = vec![0x00, 0x00]; // null bitmap over 11 columns
    out.extend_from_slice(&row.id.to_le_bytes());
    out.push(row.s_tinyint as u8);
    out.extend_from_slice(&(row.s_smallint as u16).to_le_bytes());
    out.extend_from_slice(&(row.s_medium as u32).to_le_bytes()[..3]);
    out.extend_from_slice(&(row.s_int as u32).to_le_bytes());
    out.extend_from_slice(&(row.s_bigint as u64).to_le_bytes());
    out.extend_from_slice(&row.double.to_le_bytes());
    out.push(row.flag as u8);
    out.push(row.fixed.len() as u8);
    out.extend_from_slice(row.fixed.as_bytes());
    out.push(row.small.len() as u8);
    out.extend_from_slice(row.small.as_bytes());
    out.extend_from_slice(&(row.big.len() as u16).to_le_bytes());
    out.extend_from_slice(row.big.as_bytes());
    out
}

fn rows_payload(type_code: u8, rows: &[&Row]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&TABLE_ID.to_le_bytes()[..6]);
    payload.extend_from_slice(&1u16.to_le_bytes());
    payload.extend_from_slice(&2u16.to_le_bytes()); // var header, no extra info
    payload.push(11); // width
    payload.extend_from_slice(&[0xff, 0x07]); // before image
    if type_code == UPDATE_ROWS {
        payload.extend_from_slice(&[0xff, 0x07]); // after image
    }
    for row in rows {
        payload.extend_from_slice(&encode_row(row));
    }
    payload
}

const ROW_1: Row = Row {
    id: 1,
    s_tinyint: i8::MIN,
    s_smallint: i16::MIN,
    s_medium: -8388608,
    s_int: i32::MIN,
    s_bigint: i64::MIN,
    double: -1.7e308,
    flag: false,
    fixed: "char_min        ",
    small: "min",
    big: "minimal",
};

const ROW_2: Row = Row {
    id: 2,
    s_tinyint: i8::MAX,
    s_smallint: i16::MAX,
    s_medium: 8388607,
    s_int: i32::MAX,
    s_bigint: i64::MAX,
    double: 1.7e308,
    flag: true,
    fixed: "char_max        ",
    small: "max",
    big: "maximal",
};

const ROW_3: Row = Row {
    id: 3,
    s_tinyint: 1,
    s_smallint: 2,
    s_medium: 3,
    s_int: 4,
    s_bigint: 5,
    double: 3.25,
    flag: true,
    fixed: "brown           ",
    small: "fox",
    big: "jumps",
};

const ROW_4: Row = Row {
    id: 4,
    s_tinyint: -1,
    s_smallint: -2,
    s_medium: -3,
    s_int: -4,
    s_bigint: -5,
    double: -0.5,
    flag: false,
    fixed: "lazy            ",
    small: "dog",
    big: "sleeps",
};

const ROW_5: Row = Row {
    id: 5,
    s_tinyint: 9,
    s_smallint: 9,
    s_medium: 9,
    s_int: 9,
    s_bigint: 9,
    double: 9.0,
    flag: true,
    fixed: "gone            ",
    small: "bye",
    big: "deleted soon",
};

const ROW_6_BEFORE: Row = Row {
    id: 6,
    s_tinyint: 10,
    s_smallint: 20,
    s_medium: 30,
    s_int: 40,
    s_bigint: 50,
    double: 6.5,
    flag: true,
    fixed: "before          ",
    small: "old",
    big: "original",
};

const ROW_6_AFTER: Row = Row {
    id: 6,
    s_tinyint: 100,
    s_smallint: 300,
    s_medium: 500,
    s_int: 700,
    s_bigint: 900,
    double: 0.12345,
    flag: false,
    fixed: "c               ",
    small: "upd",
    big: "b",
};

const ROW_7: Row = Row {
    id: 7,
    s_tinyint: 70,
    s_smallint: 700,
    s_medium: 7000,
    s_int: 70000,
    s_bigint: 700000,
    double: 7.75,
    flag: false,
    fixed: "seven           ",
    small: "vii",
    big: "seventh row",
};

/// the recorded session: seven inserts, one delete, one update
fn fixture() -> BinlogFile {
    let mut file = BinlogFile::new();
    file.push_event(FDE, &fde_payload());
    file.push_event(GTID, &[0u8; 42]);
    file.push_event(TABLE_MAP, &table_map_payload());
    file.push_event(WRITE_ROWS, &rows_payload(WRITE_ROWS, &[&ROW_1, &ROW_2]));
    file.push_event(TABLE_MAP, &table_map_payload());
    file.push_event(WRITE_ROWS, &rows_payload(WRITE_ROWS, &[&ROW_3]));
    file.push_event(TABLE_MAP, &table_map_payload());
    file.push_event(WRITE_ROWS, &rows_payload(WRITE_ROWS, &[&ROW_4]));
    file.push_event(XID, &1u64.to_le_bytes()); // commit
    file.push_event(TABLE_MAP, &table_map_payload());
    file.push_event(WRITE_ROWS, &rows_payload(WRITE_ROWS, &[&ROW_5]));
    file.push_event(TABLE_MAP, &table_map_payload());
    file.push_event(WRITE_ROWS, &rows_payload(WRITE_ROWS, &[&ROW_6_BEFORE]));
    file.push_event(TABLE_MAP, &table_map_payload());
    file.push_event(WRITE_ROWS, &rows_payload(WRITE_ROWS, &[&ROW_7]));
    file.push_event(HEARTBEAT, b"mysql-bin.000001");
    file.push_event(TABLE_MAP, &table_map_payload());
    file.push_event(DELETE_ROWS, &rows_payload(DELETE_ROWS, &[&ROW_5]));
    file.push_event(TABLE_MAP, &table_map_payload());
    file.push_event(
        UPDATE_ROWS,
        &rows_payload(UPDATE_ROWS, &[&ROW_6_BEFORE, &ROW_6_AFTER]),
    );
    file.push_event(XID, &2u64.to_le_bytes());
    file
}

fn pad(id: u64) -> String {
    format!("{:024}", id)
}

fn run_pipeline(path: &PathBuf) -> MemoryStore {
    let source = ByteSource::from_file(path).unwrap();
    let events = EventSource::new(source).verify_checksums();
    let diffs = TableDiffSource::new(events);
    let sink = DocumentSink::new(MemoryStore::new());
    let mut pipeline = Pipeline::new(diffs, sink);
    pipeline.run().unwrap();
    let (_, sink) = pipeline.into_parts();
    sink.into_store()
}

#[test]
fn test_pipeline_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = fixture().write("e2e");
    let store = run_pipeline(&path);

    let collection = store.collection("e_store", "table").unwrap();
    let ids: Vec<String> = collection.keys().cloned().collect();
    assert_eq!(vec![pad(1), pad(2), pad(3), pad(4), pad(6), pad(7)], ids);

    let doc = &collection[&pad(1)];
    assert_eq!(json!("minimal"), doc["big_varchar"]);
    assert_eq!(json!(false), doc["bool"]);
    assert_eq!(json!("char_min        "), doc["char"]);
    assert_eq!(json!(-1.7e308), doc["double"]);
    assert_eq!(json!(i64::MIN), doc["s_bigint"]);
    assert_eq!(json!(i64::from(i32::MIN)), doc["s_int"]);
    assert_eq!(json!("min"), doc["small_varchar"]);
    assert_eq!(json!(-8388608), doc["s_medium"]);
    assert_eq!(json!(-32768), doc["s_smallint"]);
    assert_eq!(json!(-128), doc["s_tinyint"]);

    let doc = &collection[&pad(2)];
    assert_eq!(json!(i64::MAX), doc["s_bigint"]);
    assert_eq!(json!(1.7e308), doc["double"]);
    assert_eq!(json!("char_max        "), doc["char"]);
    assert_eq!(json!(true), doc["bool"]);
    assert_eq!(json!(32767), doc["s_smallint"]);

    // the update path rewrote row 6 in place
    let doc = &collection[&pad(6)];
    assert_eq!(json!("upd"), doc["small_varchar"]);
    assert_eq!(json!(100), doc["s_tinyint"]);
    assert_eq!(json!(300), doc["s_smallint"]);
    assert_eq!(json!(500), doc["s_medium"]);
    assert_eq!(json!(700), doc["s_int"]);
    assert_eq!(json!(900), doc["s_bigint"]);
    assert_eq!(json!(0.12345), doc["double"]);
    assert_eq!(json!(false), doc["bool"]);
    assert_eq!(json!("c               "), doc["char"]);
    assert_eq!(json!("b"), doc["big_varchar"]);

    let doc = &collection[&pad(3)];
    assert_eq!(json!("fox"), doc["small_varchar"]);
    assert_eq!(json!(5), doc["s_bigint"]);
    let doc = &collection[&pad(7)];
    assert_eq!(json!("seventh row"), doc["big_varchar"]);
    assert_eq!(json!(7000), doc["s_medium"]);

    std::fs::remove_file(&path).ok();
}

/// plan emission is a pure function of the input stream
#[test]
fn test_pipeline_is_deterministic() {
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        log: Vec<(Plan, Params)>,
    }

    impl DocStore for RecordingStore {
        fn ensure_database(&mut self, name: &str) -> docbridge_cdc::Result<()> {
            self.inner.ensure_database(name)
        }

        fn ensure_collection(&mut self, db: &str, name: &str) -> docbridge_cdc::Result<()> {
            self.inner.ensure_collection(db, name)
        }

        fn execute(&mut self, plan: Plan, params: Params) -> docbridge_cdc::Result<()> {
            self.log.push((plan.clone(), params.clone()));
            self.inner.execute(plan, params)
        }
    }

    let path = fixture().write("determinism");
    let mut logs = Vec::new();
    for _ in 0..2 {
        let source = ByteSource::from_file(&path).unwrap();
        let events = EventSource::new(source);
        let diffs = TableDiffSource::new(events);
        let sink = DocumentSink::new(RecordingStore::default());
        let mut pipeline = Pipeline::new(diffs, sink);
        pipeline.run().unwrap();
        let (_, sink) = pipeline.into_parts();
        logs.push(sink.into_store().log);
    }
    // 6 insert batches, 1 delete, 1 update
    assert_eq!(8, logs[0].len());
    assert_eq!(logs[0], logs[1]);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_rows_without_table_map_is_fatal() {
    let mut file = BinlogFile::new();
    file.push_event(FDE, &fde_payload());
    file.push_event(WRITE_ROWS, &rows_payload(WRITE_ROWS, &[&ROW_1]));
    let path = file.write("orphan-rows");

    let source = ByteSource::from_file(&path).unwrap();
    let events = EventSource::new(source);
    let mut diffs = TableDiffSource::new(events);
    let result = loop {
        match diffs.next() {
            Ok(Some(_)) => continue,
            other => break other,
        }
    };
    assert!(matches!(result, Err(Error::TableDiff(_))));
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_truncated_tail_ends_stream_cleanly() {
    let file = fixture();
    let mut bytes = file.bytes;
    // chop into the final event
    bytes.truncate(bytes.len() - 7);
    let mut path = std::env::temp_dir();
    path.push(format!("docbridge-fixture-{}-truncated", std::process::id()));
    std::fs::File::create(&path)
        .unwrap()
        .write_all(&bytes)
        .unwrap();

    let store = run_pipeline(&path);
    // the last complete plan (the update) still landed
    let collection = store.collection("e_store", "table").unwrap();
    assert_eq!(json!("upd"), collection[&pad(6)]["small_varchar"]);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_stage_handlers_observe_without_altering() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let path = fixture().write("handlers");
    let counts = Rc::new(RefCell::new((0usize, 0usize)));

    let source = ByteSource::from_file(&path).unwrap();
    let mut events = EventSource::new(source);
    let seen = Rc::clone(&counts);
    events.set_handler(Box::new(move |_| seen.borrow_mut().0 += 1));
    let mut diffs = TableDiffSource::new(events);
    let seen = Rc::clone(&counts);
    diffs.set_handler(Box::new(move |_| seen.borrow_mut().1 += 1));
    let sink = DocumentSink::new(MemoryStore::new());
    let mut pipeline = Pipeline::new(diffs, sink);
    pipeline.run().unwrap();

    let (events_seen, diffs_seen) = *counts.borrow();
    // every typed event except the skipped gtid; one diff per rows event
    assert_eq!(20, events_seen);
    assert_eq!(8, diffs_seen);

    let (_, sink) = pipeline.into_parts();
    let store = sink.into_store();
    assert_eq!(
        6,
        store.collection("e_store", "table").unwrap().len()
    );
    std::fs::remove_file(&path).ok();
}
