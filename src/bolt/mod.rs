//! # Bolt driver connection
//!
//! A compact Bolt 5.0 client: version handshake, HELLO authentication,
//! RUN/PULL query execution over chunked PackStream messages. This is the
//! primary connection the Cypher runner speaks procedure calls over.
//!
//! TLS schemes (`bolt+s`, `neo4j+s`) are not served by this module; the
//! connection is plaintext TCP.

pub mod packstream;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::{CallParameters, DataTable, Row, Value};
use crate::runner::DriverConnection;
use crate::{Error, Result};

use self::packstream::{
    read_struct, write_map_header, write_string, write_struct_header, write_value, Structure,
};

const BOLT_MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

// Message tags
const HELLO: u8 = 0x01;
const GOODBYE: u8 = 0x02;
const RESET: u8 = 0x0F;
const RUN: u8 = 0x10;
const PULL: u8 = 0x3F;
const SUCCESS: u8 = 0x70;
const RECORD: u8 = 0x71;
const IGNORED: u8 = 0x7E;
const FAILURE: u8 = 0x7F;

/// How this client introduces itself in HELLO.
const USER_AGENT: &str = concat!("gds-rs/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Connection
// ============================================================================

/// A single Bolt connection. Not safe for concurrent use: requests are
/// serialized through an internal lock, callers get strict FIFO ordering.
pub struct BoltConnection {
    io: Mutex<BoltStream>,
}

impl BoltConnection {
    /// Connect and authenticate.
    ///
    /// `uri` is `bolt://host:port` or `neo4j://host:port`; encrypted
    /// schemes are rejected.
    pub async fn connect(uri: &str, auth: Option<(&str, &str)>) -> Result<Self> {
        let address = parse_uri(uri)?;
        let stream = TcpStream::connect(&address).await?;
        let mut io = BoltStream { stream };

        io.handshake().await?;
        io.hello(auth).await?;
        debug!(target: "gds_rs", %address, "bolt connection ready");

        Ok(Self { io: Mutex::new(io) })
    }
}

#[async_trait]
impl DriverConnection for BoltConnection {
    async fn run(
        &self,
        query: &str,
        params: CallParameters,
        database: Option<&str>,
    ) -> Result<DataTable> {
        let mut io = self.io.lock().await;
        io.run(query, params, database).await
    }

    async fn close(&self) -> Result<()> {
        let mut io = self.io.lock().await;
        io.goodbye().await
    }
}

fn parse_uri(uri: &str) -> Result<String> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| Error::Protocol(format!("malformed connection URI `{uri}`")))?;
    match scheme {
        "bolt" | "neo4j" => Ok(rest.to_string()),
        "bolt+s" | "bolt+ssc" | "neo4j+s" | "neo4j+ssc" => Err(Error::Protocol(format!(
            "encrypted scheme `{scheme}` is not served by the bolt feature"
        ))),
        other => Err(Error::Protocol(format!("unknown connection scheme `{other}`"))),
    }
}

// ============================================================================
// Wire I/O
// ============================================================================

struct BoltStream {
    stream: TcpStream,
}

impl BoltStream {
    /// Version negotiation: magic preamble plus four proposals, server
    /// answers with the agreed version or zero.
    async fn handshake(&mut self) -> Result<()> {
        let mut buf = BytesMut::with_capacity(20);
        buf.put_slice(&BOLT_MAGIC);
        // Propose 5.0, then 4.4.
        buf.put_slice(&[0, 0, 0, 5]);
        buf.put_slice(&[0, 0, 4, 4]);
        buf.put_slice(&[0, 0, 0, 0]);
        buf.put_slice(&[0, 0, 0, 0]);
        self.stream.write_all(&buf).await?;

        let mut agreed = [0u8; 4];
        self.stream.read_exact(&mut agreed).await?;
        if agreed == [0, 0, 0, 0] {
            return Err(Error::Protocol(
                "the server rejected every proposed Bolt version".into(),
            ));
        }
        debug!(target: "gds_rs", major = agreed[3], minor = agreed[2], "bolt version agreed");
        Ok(())
    }

    async fn hello(&mut self, auth: Option<(&str, &str)>) -> Result<()> {
        let mut body = BytesMut::new();
        let field_count = if auth.is_some() { 4 } else { 1 };
        write_struct_header(&mut body, HELLO, 1);
        write_map_header(&mut body, field_count);
        write_string(&mut body, "user_agent");
        write_string(&mut body, USER_AGENT);
        if let Some((user, password)) = auth {
            write_string(&mut body, "scheme");
            write_string(&mut body, "basic");
            write_string(&mut body, "principal");
            write_string(&mut body, user);
            write_string(&mut body, "credentials");
            write_string(&mut body, password);
        }
        self.send(body.freeze()).await?;

        match self.receive().await? {
            message if message.tag == SUCCESS => Ok(()),
            message if message.tag == FAILURE => Err(failure_error(&message)),
            message => Err(unexpected(message.tag)),
        }
    }

    async fn goodbye(&mut self) -> Result<()> {
        let mut body = BytesMut::new();
        write_struct_header(&mut body, GOODBYE, 0);
        self.send(body.freeze()).await?;
        Ok(())
    }

    /// RUN + PULL, pipelined, collecting every record.
    async fn run(
        &mut self,
        query: &str,
        params: CallParameters,
        database: Option<&str>,
    ) -> Result<DataTable> {
        let mut body = BytesMut::new();
        write_struct_header(&mut body, RUN, 3);
        write_string(&mut body, query);
        write_value(&mut body, &Value::Map(params.to_map()));
        let mut extra = HashMap::new();
        if let Some(db) = database {
            extra.insert("db".to_string(), Value::from(db));
        }
        write_value(&mut body, &Value::Map(extra));
        self.send(body.freeze()).await?;

        let mut pull = BytesMut::new();
        write_struct_header(&mut pull, PULL, 1);
        write_value(&mut pull, &Value::Map(HashMap::from([("n".to_string(), Value::Int(-1))])));
        self.send(pull.freeze()).await?;

        // RUN response carries the column names.
        let run_response = self.receive().await?;
        let columns = match run_response.tag {
            SUCCESS => success_fields(&run_response),
            FAILURE => return self.fail(run_response).await,
            tag => return Err(unexpected(tag)),
        };

        let mut table = DataTable::new(columns.clone());
        loop {
            let message = self.receive().await?;
            match message.tag {
                RECORD => {
                    let Some(Value::List(cells)) = message.fields.into_iter().next() else {
                        return Err(Error::Protocol("RECORD without a value list".into()));
                    };
                    let mut row = Row::new();
                    for (column, cell) in columns.iter().zip(cells) {
                        row.insert(column.clone(), cell);
                    }
                    table.push(row);
                }
                SUCCESS => return Ok(table),
                FAILURE => return self.fail(message).await,
                tag => return Err(unexpected(tag)),
            }
        }
    }

    /// Drain the ignored follow-up, reset the connection, surface the
    /// server's rejection unchanged.
    async fn fail(&mut self, failure: Structure) -> Result<DataTable> {
        loop {
            let message = self.receive().await?;
            if message.tag != IGNORED {
                break;
            }
        }
        let mut reset = BytesMut::new();
        write_struct_header(&mut reset, RESET, 0);
        self.send(reset.freeze()).await?;

        Err(failure_error(&failure))
    }

    /// Write one message as chunks with a zero terminator.
    async fn send(&mut self, message: Bytes) -> Result<()> {
        let mut framed = BytesMut::with_capacity(message.len() + 4);
        for chunk in message.chunks(0xFFFF) {
            framed.put_u16(chunk.len() as u16);
            framed.put_slice(chunk);
        }
        framed.put_u16(0);
        self.stream.write_all(&framed).await?;
        Ok(())
    }

    /// Read chunks until the zero terminator, decode one message.
    async fn receive(&mut self) -> Result<Structure> {
        let mut message = BytesMut::new();
        loop {
            let mut header = [0u8; 2];
            self.stream.read_exact(&mut header).await?;
            let size = u16::from_be_bytes(header) as usize;
            if size == 0 {
                if message.is_empty() {
                    // NOOP keep-alive chunk.
                    continue;
                }
                break;
            }
            let start = message.len();
            message.resize(start + size, 0);
            self.stream.read_exact(&mut message[start..]).await?;
        }
        let mut bytes = message.freeze();
        let structure = read_struct(&mut bytes)?;
        if bytes.has_remaining() {
            return Err(Error::Protocol("trailing bytes after Bolt message".into()));
        }
        Ok(structure)
    }
}

fn success_fields(message: &Structure) -> Vec<String> {
    let Some(Value::Map(meta)) = message.fields.first() else {
        return Vec::new();
    };
    match meta.get("fields") {
        Some(Value::List(names)) => names
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

fn failure_error(message: &Structure) -> Error {
    let Some(Value::Map(meta)) = message.fields.first() else {
        return Error::Server("the server reported an unspecified failure".into());
    };
    let code = meta.get("code").and_then(Value::as_str).unwrap_or("Neo.UnknownError");
    let text = meta.get("message").and_then(Value::as_str).unwrap_or("");
    Error::Server(format!("{code}: {text}"))
}

fn unexpected(tag: u8) -> Error {
    Error::Protocol(format!("unexpected Bolt message tag 0x{tag:02X}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_parsing() {
        assert_eq!(parse_uri("bolt://localhost:7687").unwrap(), "localhost:7687");
        assert_eq!(parse_uri("neo4j://db.internal:7687").unwrap(), "db.internal:7687");
        assert!(parse_uri("bolt+s://secure:7687").is_err());
        assert!(parse_uri("http://nope:80").is_err());
        assert!(parse_uri("localhost:7687").is_err());
    }

    #[test]
    fn failure_message_passes_server_text_through() {
        let failure = Structure {
            tag: FAILURE,
            fields: vec![Value::Map(HashMap::from([
                (
                    "code".to_string(),
                    Value::from("Neo.ClientError.Procedure.ProcedureNotFound"),
                ),
                (
                    "message".to_string(),
                    Value::from(
                        "There is no procedure with the name `gds.pagerank.stream` \
                         registered for this database instance",
                    ),
                ),
            ]))],
        };
        let error = failure_error(&failure);
        let text = error.to_string();
        assert!(text.contains("ProcedureNotFound"));
        assert!(text.contains("gds.pagerank.stream"));
    }
}
