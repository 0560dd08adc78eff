//! Networking code for talking to a Stratum pool

use crate::prelude::*;
use futures::{future, sink, stream, Sink, Stream, TryStreamExt};
use serde_json::Value;
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use url::Url;

#[derive(Debug, Clone, StructOpt)]
pub struct NetConfig {
    /// The pool to connect to, e.g. `stratum+tcp://pool.example.com:3333`
    #[structopt(short, long)]
    pub pool: Url,

    /// Worker name to authorize with
    #[structopt(short, long, default_value = "stratforge")]
    pub user: String,

    /// Worker password
    #[structopt(long, default_value = "")]
    pub password: String,
}

impl NetConfig {
    /// Host and port of the pool. Stratum has no default port, so one is required.
    pub fn address(&self) -> Result<(String, u16), NetworkError> {
        match (self.pool.host_str(), self.pool.port()) {
            (Some(host), Some(port)) if !host.is_empty() => Ok((host.to_string(), port)),
            _ => Err(NetworkError::InvalidPoolUrl(self.pool.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("pool URL needs a host and port: {0}")]
    InvalidPoolUrl(String),

    #[error("connection closed by pool")]
    Closed,
}

/// A line received from the pool
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// A call or notification such as `mining.notify`
    Request {
        id: Option<Value>,
        method: String,
        #[serde(default)]
        params: Vec<Value>,
    },

    /// A reply to one of our requests
    Response {
        id: Value,
        result: Option<Value>,
        error: Option<Value>,
    },

    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientMessage {
    pub id: u64,
    pub method: &'static str,
    pub params: Vec<Value>,
}

impl ClientMessage {
    pub fn subscribe() -> Self {
        ClientMessage {
            id: 1,
            method: "mining.subscribe",
            params: vec![Value::from(concat!("stratforge/", env!("CARGO_PKG_VERSION")))],
        }
    }

    pub fn authorize(user: &str, password: &str) -> Self {
        ClientMessage {
            id: 2,
            method: "mining.authorize",
            params: vec![Value::from(user), Value::from(password)],
        }
    }
}

/// Parse one line from the pool.
pub fn parse_line(line: &str) -> Result<ServerMessage, NetworkError> {
    Ok(serde_json::from_str(line)?)
}

/// Open a connection to the pool, split into a sending and a receiving half.
///
/// Both halves are newline-delimited JSON. The stream ends when the pool
/// closes the connection; a line that isn't valid JSON yields an error
/// without ending it.
pub async fn connect(
    cfg: &NetConfig,
) -> Result<
    (
        impl Sink<ClientMessage, Error = NetworkError>,
        impl Stream<Item = Result<ServerMessage, NetworkError>>,
    ),
    NetworkError,
> {
    let (host, port) = cfg.address()?;
    debug!("Connecting to {}:{}", host, port);

    let (read, write) = TcpStream::connect((host.as_str(), port))
        .await?
        .into_split();

    // map the sending half
    let sink = sink::unfold(write, |mut write, msg: ClientMessage| async move {
        let mut line = serde_json::to_string(&msg)?;
        debug!("Client message: {}", line);

        line.push('\n');
        write.write_all(line.as_bytes()).await?;
        Ok::<_, NetworkError>(write)
    });

    // map the receiving half
    let lines = stream::try_unfold(BufReader::new(read).lines(), |mut lines| async move {
        let line = lines.next_line().await?;
        Ok::<_, NetworkError>(line.map(|line| (line, lines)))
    });

    let stream = lines
        .try_filter(|line| future::ready(!line.trim().is_empty()))
        .inspect_ok(|line| debug!("Server message: {}", line))
        .and_then(|line| future::ready(parse_line(&line)));

    Ok((sink, stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn net_config(pool: &str) -> NetConfig {
        NetConfig {
            pool: pool.parse().unwrap(),
            user: "worker".to_string(),
            password: String::new(),
        }
    }

    #[test]
    fn test_client_messages() {
        assert_eq!(
            serde_json::to_value(ClientMessage::subscribe()).unwrap(),
            json!({
                "id": 1,
                "method": "mining.subscribe",
                "params": [format!("stratforge/{}", env!("CARGO_PKG_VERSION"))],
            })
        );

        assert_eq!(
            serde_json::to_value(ClientMessage::authorize("worker", "x")).unwrap(),
            json!({"id": 2, "method": "mining.authorize", "params": ["worker", "x"]})
        );
    }

    #[test]
    fn test_parse_notify() {
        let line = json!({
            "id": null,
            "method": "mining.notify",
            "params": ["job1", "00", "11", "", [], "20000000", "5f5e1000", "1d00ffff", true],
        })
        .to_string();

        match parse_line(&line).unwrap() {
            ServerMessage::Request { id, method, params } => {
                assert_eq!(id, None);
                assert_eq!(method, "mining.notify");
                assert_eq!(params.len(), 9);
                assert_eq!(params[0], json!("job1"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_parse_response() {
        assert_eq!(
            parse_line(r#"{"id":2,"result":true,"error":null}"#).unwrap(),
            ServerMessage::Response {
                id: json!(2),
                result: Some(json!(true)),
                error: None,
            }
        );
    }

    #[test]
    fn test_parse_other() {
        assert_eq!(
            parse_line(r#"{"jsonrpc":"2.0"}"#).unwrap(),
            ServerMessage::Other(json!({"jsonrpc": "2.0"}))
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_line("{\"id\": 1, \"method\""),
            Err(NetworkError::JsonError(_))
        ));
    }

    #[test]
    fn test_pool_address() {
        assert_eq!(
            net_config("stratum+tcp://pool.example.com:3333")
                .address()
                .unwrap(),
            ("pool.example.com".to_string(), 3333)
        );

        assert!(matches!(
            net_config("stratum+tcp://pool.example.com").address(),
            Err(NetworkError::InvalidPoolUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_exchanges_lines() {
        use futures::{SinkExt, StreamExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();

            let first = lines.next_line().await.unwrap().unwrap();
            write
                .write_all(b"{\"id\":1,\"result\":[],\"error\":null}\n\nnot json\n")
                .await
                .unwrap();
            first
        });

        let (sink, stream) = connect(&net_config(&format!("stratum+tcp://127.0.0.1:{}", port)))
            .await
            .unwrap();
        futures::pin_mut!(sink);
        futures::pin_mut!(stream);

        sink.send(ClientMessage::subscribe()).await.unwrap();

        match stream.next().await {
            Some(Ok(ServerMessage::Response { id, .. })) => assert_eq!(id, json!(1)),
            other => panic!("expected a response, got {:?}", other),
        }
        assert!(matches!(
            stream.next().await,
            Some(Err(NetworkError::JsonError(_)))
        ));
        assert!(stream.next().await.is_none());

        let first = server.await.unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&first).unwrap()["method"],
            json!("mining.subscribe")
        );
    }
}
