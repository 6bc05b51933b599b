//! 流媒体中继。
//!
//! 把一个已经解析好的上游媒体 URL 拉成字节流，换上规范化的响应头
//! 重新吐给调用方。只动三个头：content-type（上游缺失时默认通用
//! 音频 MIME）、content-disposition（强制 inline，移动端/浏览器
//! 直接播放而不是下载）、content-length（已知时透传）。
//!
//! 超时只约束响应头阶段：上游必须在限时内给出状态行和响应头，
//! 但正文传输不设上限，一首几十 MB 的曲目在慢速网络下想传多久
//! 传多久。
//!
//! 中继本身失败时这里只返回 `Err`；要不要退回为重定向由各提供商
//! 声明的 `RelayFallback` 决定，在门面层处理。

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};

use crate::error::{AggregatorError, Result};

/// 上游未声明 content-type 时使用的默认音频 MIME。
const DEFAULT_AUDIO_MIME: &str = "audio/mpeg";

/// 等待上游返回响应头的超时。正文传输不受此限制。
const HEADER_TIMEOUT: Duration = Duration::from_secs(10);

/// 强制使用的 disposition 值。
pub const INLINE_DISPOSITION: &str = "inline";

/// 一条已规范化响应头的上游字节流。
pub struct RelayedStream {
    /// 媒体类型，上游缺失时为 `audio/mpeg`。
    pub content_type: String,
    /// 内容长度，上游已知时透传。
    pub content_length: Option<u64>,
    /// 固定为 `inline`。
    pub content_disposition: &'static str,
    /// 上游响应体的字节流。
    pub bytes: BoxStream<'static, reqwest::Result<Bytes>>,
}

impl fmt::Debug for RelayedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayedStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("content_disposition", &self.content_disposition)
            .finish_non_exhaustive()
    }
}

/// 一次流媒体请求的最终产物。
#[derive(Debug)]
pub enum RelayOutcome {
    /// 中继成功，向客户端回放这条字节流。
    Stream(RelayedStream),
    /// 把客户端重定向到上游地址（解析计划如此，或中继失败后的回退）。
    Redirect(String),
}

/// 抓取上游媒体并包装为强制 inline 的字节流。
///
/// 上游超时未给出响应头、返回非 2xx 或传输失败时返回 `Err`，
/// 由调用方按提供商策略回退。
pub async fn fetch_inline(client: &Client, url: &str) -> Result<RelayedStream> {
    fetch_inline_with_timeout(client, url, HEADER_TIMEOUT).await
}

async fn fetch_inline_with_timeout(
    client: &Client,
    url: &str,
    header_timeout: Duration,
) -> Result<RelayedStream> {
    let response = tokio::time::timeout(header_timeout, client.get(url).send())
        .await
        .map_err(|_| {
            AggregatorError::Network(format!("上游在 {header_timeout:?} 内未返回响应头: {url}"))
        })??
        .error_for_status()?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_AUDIO_MIME)
        .to_string();

    let content_length = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    Ok(RelayedStream {
        content_type,
        content_length,
        content_disposition: INLINE_DISPOSITION,
        bytes: response.bytes_stream().boxed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn collect(mut stream: BoxStream<'static, reqwest::Result<Bytes>>) -> Vec<u8> {
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk.unwrap());
        }
        buffer
    }

    /// 起一个先给完响应头、再分片慢吐正文的单连接服务器。
    async fn spawn_dribbling_server(body: &'static [u8], chunk_delay: Duration) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let header = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: audio/mpeg\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(header.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();

            for chunk in body.chunks(4) {
                tokio::time::sleep(chunk_delay).await;
                socket.write_all(chunk).await.unwrap();
                socket.flush().await.unwrap();
            }
        });
        format!("http://{addr}/track.mp3")
    }

    #[tokio::test]
    async fn test_relay_normalizes_headers_and_streams_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/track.mp3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/ogg")
                    .set_body_bytes(b"abc123".to_vec()),
            )
            .mount(&server)
            .await;

        let relayed = fetch_inline(&Client::new(), &format!("{}/track.mp3", server.uri()))
            .await
            .unwrap();

        assert_eq!(relayed.content_type, "audio/ogg");
        assert_eq!(relayed.content_disposition, INLINE_DISPOSITION);
        assert_eq!(relayed.content_length, Some(6));
        assert_eq!(collect(relayed.bytes).await, b"abc123");
    }

    #[tokio::test]
    async fn test_relay_defaults_to_generic_audio_mime() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raw"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;

        let relayed = fetch_inline(&Client::new(), &format!("{}/raw", server.uri()))
            .await
            .unwrap();
        assert_eq!(relayed.content_type, DEFAULT_AUDIO_MIME);
    }

    #[tokio::test]
    async fn test_upstream_404_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetch_inline(&Client::new(), &format!("{}/missing", server.uri())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stalled_headers_hit_the_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stalled"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let result = fetch_inline_with_timeout(
            &Client::new(),
            &format!("{}/stalled", server.uri()),
            Duration::from_millis(100),
        )
        .await;
        assert!(matches!(result, Err(AggregatorError::Network(_))));
    }

    #[tokio::test]
    async fn test_slow_body_outlasting_the_timeout_is_relayed_in_full() {
        let body: &[u8] = b"0123456789abcdef";
        // 正文总耗时远超响应头超时，流必须完整读完而不是被掐断。
        let url = spawn_dribbling_server(body, Duration::from_millis(120)).await;

        let relayed = fetch_inline_with_timeout(&Client::new(), &url, Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(relayed.content_length, Some(body.len() as u64));
        assert_eq!(collect(relayed.bytes).await, body);
    }

    #[tokio::test]
    async fn test_debug_output_elides_the_byte_stream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dbg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"secret-bytes".to_vec()))
            .mount(&server)
            .await;

        let relayed = fetch_inline(&Client::new(), &format!("{}/dbg", server.uri()))
            .await
            .unwrap();

        let rendered = format!("{:?}", RelayOutcome::Stream(relayed));
        assert!(rendered.contains("RelayedStream"));
        assert!(rendered.contains("content_length"));
        assert!(!rendered.contains("secret-bytes"));

        let redirect = format!("{:?}", RelayOutcome::Redirect("https://cdn/x.mp3".to_string()));
        assert!(redirect.contains("Redirect"));
    }
}
