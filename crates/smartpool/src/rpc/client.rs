use std::time::Duration;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{PoolError, Result};

/// JSON-RPC 2.0 client for an Ethereum node. Every request carries the
/// client's timeout.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    client: HttpClient,
    url: String,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(&url)?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A null result is an error; use [`JsonRpcClient::call_optional`] for
    /// methods where null means "not found".
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| PoolError::RpcResponse {
                code: 0,
                message: format!("{} returned null", method),
            })
    }

    pub async fn call_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Option<T>> {
        debug!("RPC {}", method);
        self.client
            .request::<Option<T>, _>(method, params)
            .await
            .map_err(rpc_error)
    }
}

/// Error objects returned by the node keep their code; transport failures
/// stay transport errors.
fn rpc_error(err: ClientError) -> PoolError {
    match err {
        ClientError::Call(object) => PoolError::RpcResponse {
            code: i64::from(object.code()),
            message: object.message().to_string(),
        },
        other => PoolError::Rpc(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_rpc, RpcReply};
    use serde_json::json;
    use wiremock::MockServer;

    fn client(server: &MockServer) -> JsonRpcClient {
        JsonRpcClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn result_is_returned() {
        let server = MockServer::start().await;
        mock_rpc(&server, "eth_blockNumber", RpcReply::result(json!("0x1"))).await;

        let number: String = client(&server).call("eth_blockNumber", vec![]).await.unwrap();
        assert_eq!(number, "0x1");
    }

    #[tokio::test]
    async fn null_result_is_none_or_an_error() {
        let server = MockServer::start().await;
        mock_rpc(&server, "eth_getTransactionReceipt", RpcReply::result(Value::Null)).await;
        let client = client(&server);

        let receipt: Option<Value> = client
            .call_optional("eth_getTransactionReceipt", vec![json!("0x01")])
            .await
            .unwrap();
        assert!(receipt.is_none());

        let err = client
            .call::<Value>("eth_getTransactionReceipt", vec![json!("0x01")])
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::RpcResponse { code: 0, .. }));
    }

    #[tokio::test]
    async fn error_object_becomes_rpc_error() {
        let server = MockServer::start().await;
        mock_rpc(&server, "eth_call", RpcReply::error(-32000, "execution reverted")).await;

        let err = client(&server)
            .call::<String>("eth_call", vec![json!({}), json!("latest")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PoolError::RpcResponse { code: -32000, ref message } if message == "execution reverted"
        ));
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let client = JsonRpcClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client.call::<String>("eth_blockNumber", vec![]).await.unwrap_err();
        assert!(matches!(err, PoolError::Rpc(_)));
        assert_eq!(client.url(), "http://127.0.0.1:9");
    }
}
