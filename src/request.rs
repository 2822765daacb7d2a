// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体：
//! 1. 请求行（Request-Line）的解析（方法、路径、查询串、版本）。
//! 2. 标头（Headers）按原样保存，查询时大小写不敏感。
//! 3. 空行之后的内容作为请求体保留。

use bytes::Bytes;
use log::error;

use crate::{exception::Exception, param::*};

#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, POST 等）
    method: HttpRequestMethod,
    /// 请求路径（不含查询串）
    path: String,
    /// 查询串（不含 `?`）
    query: Option<String>,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 所有标头，保持原始顺序
    headers: Vec<(String, String)>,
    /// 请求体
    body: Bytes,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 请求 ID，用于在多任务环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        // 缓冲区末尾可能残留未写入的 0 字节
        let end = buffer.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        let request_string = match std::str::from_utf8(&buffer[..end]) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let (head, body) = match request_string.split_once("\r\n\r\n") {
            Some((h, b)) => (h, b),
            None => (request_string, ""),
        };
        let mut lines = head.split(CRLF);

        // 请求行，例如 "GET /index?x=1 HTTP/1.1"
        let request_line = lines.next().unwrap_or("");
        let parts: Vec<&str> = request_line.split(' ').collect();
        if parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequestLine);
        }

        let method_str = parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version_str = parts[parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中出现空格虽不规范，仍尝试拼回
        let target = parts[1..parts.len() - 1].join(" ");
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target, None),
        };

        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        Ok(Self {
            method,
            path,
            query,
            version,
            headers,
            body: Bytes::copy_from_slice(body.as_bytes()),
        })
    }

    /// 构造一个不经过网络解析的请求，便于在进程内直接驱动路由。
    pub fn new(method: HttpRequestMethod, path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            version: HttpVersion::V1_1,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }
}

impl Request {
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 大小写不敏感地查询标头，返回第一个匹配值
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or("")
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
