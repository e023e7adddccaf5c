//! Tonic-based Arrow Flight wire implementation of [`FlightTransport`].

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray,
    StringArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow_flight::decode::FlightRecordBatchStream;
use arrow_flight::error::FlightError;
use arrow_flight::flight_service_client::FlightServiceClient;
use arrow_flight::{Action, HandshakeRequest, Ticket};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::{stream, TryStreamExt};
use parking_lot::Mutex;
use tonic::metadata::MetadataValue;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

use super::client::FlightTransport;
use super::ArrowAuthentication;
use crate::model::{DataTable, Row, Value};
use crate::{Error, Result, TransportErrorKind};

/// How this client introduces itself on the streaming channel.
const USER_AGENT: &str = concat!("gds-rs/", env!("CARGO_PKG_VERSION"));

/// TLS and identification options for the streaming channel.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Dial `https` instead of `http`.
    pub encrypted: bool,
    /// PEM-encoded roots to trust instead of the system store.
    pub root_certs: Option<Vec<u8>>,
    /// Requested TLS verification override. The rustls stack refuses
    /// unverified TLS, so enabling this fails construction with a pointer
    /// to `root_certs` rather than silently downgrading.
    pub disable_server_verification: bool,
    /// Override the default user-agent string.
    pub user_agent: Option<String>,
}

/// A Flight connection over a tonic channel.
pub struct TonicFlightTransport {
    client: FlightServiceClient<Channel>,
    token: Mutex<Option<String>>,
}

impl TonicFlightTransport {
    /// Dial the endpoint.
    pub async fn connect(host: &str, port: u16, options: TlsOptions) -> Result<Self> {
        if options.encrypted && options.disable_server_verification {
            return Err(Error::Protocol(
                "TLS verification cannot be disabled on this transport; \
                 provide trusted root certificates instead"
                    .into(),
            ));
        }

        let scheme = if options.encrypted { "https" } else { "http" };
        let user_agent = options.user_agent.as_deref().unwrap_or(USER_AGENT);

        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{host}:{port}"))
            .map_err(|e| Error::transport(TransportErrorKind::Other, e.to_string()))?
            .user_agent(user_agent)
            .map_err(|e| Error::transport(TransportErrorKind::Other, e.to_string()))?;

        if options.encrypted {
            let mut tls = ClientTlsConfig::new().domain_name(host.to_string());
            if let Some(pem) = &options.root_certs {
                tls = tls.ca_certificate(Certificate::from_pem(pem.clone()));
            }
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| Error::transport(TransportErrorKind::Other, e.to_string()))?;
        }

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::transport(TransportErrorKind::Unavailable, e.to_string()))?;
        debug!(target: "gds_rs", %host, port, "flight channel connected");

        Ok(Self {
            client: FlightServiceClient::new(channel),
            token: Mutex::new(None),
        })
    }

    fn authorize<T>(&self, request: &mut tonic::Request<T>) -> Result<()> {
        if let Some(token) = self.token.lock().as_deref() {
            let value: MetadataValue<_> = format!("Bearer {token}")
                .parse()
                .map_err(|_| Error::Protocol("bearer token is not valid metadata".into()))?;
            request.metadata_mut().insert("authorization", value);
        }
        Ok(())
    }
}

fn map_status(status: tonic::Status) -> Error {
    use tonic::Code;
    let kind = match status.code() {
        Code::DeadlineExceeded => TransportErrorKind::TimedOut,
        Code::Unavailable => TransportErrorKind::Unavailable,
        Code::Internal => TransportErrorKind::Internal,
        Code::Cancelled => TransportErrorKind::Cancelled,
        Code::Unauthenticated => TransportErrorKind::Unauthenticated,
        _ => TransportErrorKind::Other,
    };
    match kind {
        // Application-level rejections keep the server's message intact.
        TransportErrorKind::Other => Error::Server(status.message().to_string()),
        kind => Error::transport(kind, status.message().to_string()),
    }
}

#[async_trait]
impl FlightTransport for TonicFlightTransport {
    async fn handshake(&self, auth: &ArrowAuthentication) -> Result<Option<String>> {
        let token = match auth {
            ArrowAuthentication::None => return Ok(None),
            ArrowAuthentication::Token(token) => Some(token.clone()),
            ArrowAuthentication::UsernamePassword { username, password } => {
                let mut request =
                    tonic::Request::new(stream::iter(vec![HandshakeRequest::default()]));
                let basic = BASE64.encode(format!("{username}:{password}"));
                let value: MetadataValue<_> = format!("Basic {basic}")
                    .parse()
                    .map_err(|_| Error::Protocol("credentials are not valid metadata".into()))?;
                request.metadata_mut().insert("authorization", value);

                let mut client = self.client.clone();
                let response = client.handshake(request).await.map_err(map_status)?;
                response
                    .metadata()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(str::to_owned)
            }
        };
        *self.token.lock() = token.clone();
        Ok(token)
    }

    async fn do_action(&self, action_type: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let mut request = tonic::Request::new(Action {
            r#type: action_type.to_string(),
            body: body.into(),
        });
        self.authorize(&mut request)?;

        let mut client = self.client.clone();
        let mut results = client.do_action(request).await.map_err(map_status)?.into_inner();
        let first = results
            .message()
            .await
            .map_err(map_status)?
            .ok_or_else(|| Error::Protocol("action returned no result body".into()))?;
        // Drain so the stream completes cleanly.
        while results.message().await.map_err(map_status)?.is_some() {}
        Ok(first.body.to_vec())
    }

    async fn do_get(&self, ticket: Vec<u8>) -> Result<DataTable> {
        let mut request = tonic::Request::new(Ticket { ticket: ticket.into() });
        self.authorize(&mut request)?;

        let mut client = self.client.clone();
        let flight_data = client.do_get(request).await.map_err(map_status)?.into_inner();
        let batches: Vec<RecordBatch> = FlightRecordBatchStream::new_from_flight_data(
            flight_data.map_err(|status| FlightError::Tonic(Box::new(status))),
        )
        .try_collect()
        .await
        .map_err(|e| match e {
            FlightError::Tonic(status) => map_status(*status),
            other => Error::Protocol(other.to_string()),
        })?;

        batches_to_table(&batches)
    }
}

/// Normalize record batches into the client's tabular representation.
fn batches_to_table(batches: &[RecordBatch]) -> Result<DataTable> {
    let Some(first) = batches.first() else {
        return Ok(DataTable::default());
    };
    let columns: Vec<String> = first
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    let mut table = DataTable::new(columns.clone());
    for batch in batches {
        for row_idx in 0..batch.num_rows() {
            let mut row = Row::new();
            for (col_idx, column) in columns.iter().enumerate() {
                let array = batch.column(col_idx);
                row.insert(column.clone(), cell_value(array.as_ref(), row_idx)?);
            }
            table.push(row);
        }
    }
    Ok(table)
}

fn cell_value(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        DataType::Int64 => {
            Value::Int(array.as_any().downcast_ref::<Int64Array>().expect("checked").value(row))
        }
        DataType::Int32 => Value::Int(
            array.as_any().downcast_ref::<Int32Array>().expect("checked").value(row) as i64,
        ),
        DataType::Float64 => Value::Float(
            array.as_any().downcast_ref::<Float64Array>().expect("checked").value(row),
        ),
        DataType::Float32 => Value::Float(
            array.as_any().downcast_ref::<Float32Array>().expect("checked").value(row) as f64,
        ),
        DataType::Boolean => Value::Bool(
            array.as_any().downcast_ref::<BooleanArray>().expect("checked").value(row),
        ),
        DataType::Utf8 => Value::String(
            array.as_any().downcast_ref::<StringArray>().expect("checked").value(row).to_string(),
        ),
        DataType::LargeUtf8 => Value::String(
            array
                .as_any()
                .downcast_ref::<LargeStringArray>()
                .expect("checked")
                .value(row)
                .to_string(),
        ),
        other => {
            return Err(Error::Protocol(format!(
                "unsupported column type `{other}` in streamed result"
            )));
        }
    };
    Ok(value)
}
