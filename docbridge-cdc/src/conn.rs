//! minimal blocking MySQL client, just enough to run a replication dump
//!
//! the conveyor only ever uses this through [`ByteTransport`], so anything
//! that can produce framed binlog bytes can replace it
use crate::error::{Error, Result};
use crate::transport::ByteTransport;
use log::{debug, info};
use sha1::{Digest, Sha1};
use std::io::{Read, Write};
use std::net::TcpStream;

const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;
const CLIENT_LONG_FLAG: u32 = 0x0000_0004;
const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;
const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;

const COM_QUIT: u8 = 0x01;
const COM_BINLOG_DUMP: u8 = 0x12;
const COM_REGISTER_SLAVE: u8 = 0x15;

const MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;
const UTF8_CHARSET: u8 = 33;

/// One authenticated connection speaking the server's packet framing:
/// 3-byte little-endian length, 1-byte sequence, payload.
pub struct Conn {
    stream: TcpStream,
    seq: u8,
    buf: Vec<u8>,
}

impl Conn {
    pub fn connect(host: &str, port: u16, user: &str, password: &str, db: &str) -> Result<Conn> {
        let stream = TcpStream::connect((host, port))
            .map_err(|e| Error::Connection(format!("can't connect to {}:{}: {}", host, port, e)))?;
        let mut conn = Conn {
            stream,
            seq: 0,
            buf: Vec::new(),
        };
        let greeting = conn.read_packet()?.to_vec();
        let handshake = Handshake::parse(&greeting)?;
        debug!(
            "server {} speaks protocol {}",
            handshake.server_version, handshake.protocol_version
        );
        let response = build_handshake_response(&handshake, user, password, db);
        conn.write_packet(&response)?;
        let reply = conn.read_packet()?;
        match reply.first() {
            Some(0x00) => {}
            Some(0xff) => return Err(Error::Connection(server_error(reply))),
            _ => {
                return Err(Error::Connection(
                    "server requested an unsupported authentication method".into(),
                ))
            }
        }
        info!("connected to `{}` on {}:{}", db, host, port);
        Ok(conn)
    }

    /// announce this connection as a replica
    pub fn register_replica(&mut self, server_id: u32) -> Result<()> {
        let mut payload = Vec::new();
        payload.push(COM_REGISTER_SLAVE);
        payload.extend_from_slice(&server_id.to_le_bytes());
        payload.push(0); // hostname
        payload.push(0); // user
        payload.push(0); // password
        payload.extend_from_slice(&0u16.to_le_bytes()); // port
        payload.extend_from_slice(&0u32.to_le_bytes()); // replication rank
        payload.extend_from_slice(&0u32.to_le_bytes()); // master id
        self.command(&payload)?;
        let reply = self.read_packet()?;
        if reply.first() == Some(&0xff) {
            return Err(Error::Connection(server_error(reply)));
        }
        Ok(())
    }

    /// ask the server to start streaming binlog events; an empty file name
    /// means "from your first binlog"
    pub fn dump_binlog(&mut self, file: &str, pos: u32, server_id: u32) -> Result<()> {
        let mut payload = Vec::new();
        payload.push(COM_BINLOG_DUMP);
        payload.extend_from_slice(&pos.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes()); // flags
        payload.extend_from_slice(&server_id.to_le_bytes());
        payload.extend_from_slice(file.as_bytes());
        self.command(&payload)?;
        debug!("dump started at {}:{}", file, pos);
        Ok(())
    }

    pub fn quit(mut self) {
        let _ = self.command(&[COM_QUIT]);
    }

    /// read one framed packet; the payload stays in the reused buffer
    pub fn read_packet(&mut self) -> Result<&[u8]> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
        self.seq = header[3].wrapping_add(1);
        self.buf.clear();
        self.buf.resize(len, 0);
        self.stream.read_exact(&mut self.buf)?;
        Ok(&self.buf[..])
    }

    fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
        let len = payload.len() as u32;
        let mut packet = Vec::with_capacity(payload.len() + 4);
        packet.extend_from_slice(&len.to_le_bytes()[..3]);
        packet.push(self.seq);
        packet.extend_from_slice(payload);
        self.stream.write_all(&packet)?;
        self.seq = self.seq.wrapping_add(1);
        Ok(())
    }

    /// commands restart the packet sequence
    fn command(&mut self, payload: &[u8]) -> Result<()> {
        self.seq = 0;
        self.write_packet(payload)
    }
}

struct Handshake {
    protocol_version: u8,
    server_version: String,
    nonce: Vec<u8>,
}

impl Handshake {
    fn parse(payload: &[u8]) -> Result<Handshake> {
        if payload.first() == Some(&0xff) {
            return Err(Error::Connection(server_error(payload)));
        }
        let mut at = 0;
        let protocol_version = *payload
            .get(at)
            .ok_or_else(|| Error::Connection("handshake too short".into()))?;
        at += 1;
        let version_end = payload[at..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::Connection("unterminated server version".into()))?;
        let server_version = String::from_utf8_lossy(&payload[at..at + version_end]).to_string();
        at += version_end + 1;
        at += 4; // thread id
        need(payload, at, 8)?;
        let mut nonce = payload[at..at + 8].to_vec();
        at += 8 + 1; // auth data part 1, filler
        at += 2 + 1 + 2 + 2; // capabilities low, charset, status, capabilities high
        need(payload, at, 1)?;
        let auth_data_len = payload[at] as usize;
        at += 1 + 10; // auth data length, reserved
        // part 2 is at least 13 bytes, NUL-padded; the scramble is 20 bytes
        let part2_len = auth_data_len.saturating_sub(8).max(13);
        need(payload, at, part2_len)?;
        nonce.extend_from_slice(&payload[at..at + part2_len]);
        nonce.truncate(20);
        Ok(Handshake {
            protocol_version,
            server_version,
            nonce,
        })
    }
}

fn need(payload: &[u8], at: usize, n: usize) -> Result<()> {
    if at + n > payload.len() {
        Err(Error::Connection("handshake too short".into()))
    } else {
        Ok(())
    }
}

fn build_handshake_response(
    handshake: &Handshake,
    user: &str,
    password: &str,
    db: &str,
) -> Vec<u8> {
    let mut capabilities = CLIENT_LONG_PASSWORD
        | CLIENT_LONG_FLAG
        | CLIENT_PROTOCOL_41
        | CLIENT_SECURE_CONNECTION;
    if !db.is_empty() {
        capabilities |= CLIENT_CONNECT_WITH_DB;
    }
    let mut response = Vec::new();
    response.extend_from_slice(&capabilities.to_le_bytes());
    response.extend_from_slice(&MAX_PACKET_SIZE.to_le_bytes());
    response.push(UTF8_CHARSET);
    response.extend_from_slice(&[0u8; 23]);
    response.extend_from_slice(user.as_bytes());
    response.push(0);
    if password.is_empty() {
        response.push(0);
    } else {
        let scramble = scramble_password(password, &handshake.nonce);
        response.push(scramble.len() as u8);
        response.extend_from_slice(&scramble);
    }
    if !db.is_empty() {
        response.extend_from_slice(db.as_bytes());
        response.push(0);
    }
    response
}

/// native password proof: SHA1(pass) XOR SHA1(nonce + SHA1(SHA1(pass)))
fn scramble_password(password: &str, nonce: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    let stage1 = hasher.finalize_reset();
    hasher.update(&stage1);
    let stage2 = hasher.finalize_reset();
    hasher.update(nonce);
    hasher.update(&stage2);
    let stage3 = hasher.finalize();
    stage1.iter().zip(stage3.iter()).map(|(a, b)| a ^ b).collect()
}

/// human-readable text of an ERR packet
fn server_error(payload: &[u8]) -> String {
    if payload.len() < 3 {
        return "malformed error packet".into();
    }
    let code = u16::from_le_bytes([payload[1], payload[2]]);
    // skip the '#' + 5-byte sql state when present
    let msg_at = if payload.get(3) == Some(&b'#') { 9 } else { 3 };
    let msg = String::from_utf8_lossy(payload.get(msg_at..).unwrap_or_default());
    format!("server error {}: {}", code, msg)
}

/// Live replication session behind the transport boundary.
///
/// `open` (re)connects and starts a dump at the given file and position;
/// `fetch` hands out one event window per call, with the status byte of
/// the wrapping packet already stripped.
pub struct DbTransport {
    host: String,
    port: u16,
    user: String,
    password: String,
    db: String,
    server_id: u32,
    conn: Option<Conn>,
}

impl DbTransport {
    pub fn new(host: &str, user: &str, password: &str, db: &str, port: u16) -> Self {
        DbTransport {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
            db: db.to_string(),
            server_id: 0,
            conn: None,
        }
    }
}

impl ByteTransport for DbTransport {
    fn open(&mut self, file: &str, start_pos: u32) -> Result<()> {
        self.close();
        let mut conn = Conn::connect(&self.host, self.port, &self.user, &self.password, &self.db)?;
        conn.register_replica(self.server_id)?;
        conn.dump_binlog(file, start_pos, self.server_id)?;
        self.conn = Some(conn);
        Ok(())
    }

    fn fetch(&mut self) -> Result<Option<&[u8]>> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| Error::Connection("binlog session not open".into()))?;
        let payload = conn.read_packet()?;
        match payload.first() {
            None => Ok(None),
            Some(0x00) => Ok(Some(&payload[1..])),
            // EOF packet: nothing more for now
            Some(0xfe) if payload.len() < 9 => Ok(None),
            Some(0xff) => Err(Error::Binlog(server_error(payload))),
            Some(other) => Err(Error::Binlog(format!(
                "unexpected packet status {:#04x}",
                other
            ))),
        }
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.quit();
        }
    }
}
