// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中定义了模板渲染层与 HTTP 层共享的常量：
//! - 响应头名称以及常见的 Content-Type。
//! - 模板集（Template Set）的默认值：目录、扩展名、字符集、保留集名。
//! - HTTP 状态码及其原因短语（Reason Phrase）。
//! - HTTP 方法、版本的强类型枚举。

use lazy_static::lazy_static;
use std::collections::HashMap;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "pongo-webserver";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

// --- 响应头名称 ---
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";

// --- Content-Type ---
pub const CONTENT_JSON: &str = "application/json";
pub const CONTENT_HTML: &str = "text/html";
pub const CONTENT_XHTML: &str = "application/xhtml+xml";
pub const CONTENT_PLAIN: &str = "text/plain; charset=utf-8";

/// 未指定字符集时追加到 Content-Type 的默认值
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// 保留的默认模板集名称，渲染器安装后始终存在
pub const DEFAULT_SET_NAME: &str = "default";

/// 默认的模板根目录
pub const DEFAULT_DIRECTORY: &str = "templates";

/// 默认识别的模板文件扩展名
pub const DEFAULT_EXTENSIONS: [&str; 2] = [".tmpl", ".html"];

/// 模板错误信息的前缀
pub const ENGINE_LABEL: &str = "pongo2";

lazy_static! {
    /// 服务器当前允许处理的 HTTP 方法列表，用于 OPTIONS 响应的 `Allow` 头。
    pub static ref ALLOWED_METHODS: Vec<HttpRequestMethod> = {
        vec![
            HttpRequestMethod::Get,
            HttpRequestMethod::Head,
            HttpRequestMethod::Options,
            HttpRequestMethod::Post,
        ]
    };
}

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        // 1xx
        map.insert(100, "Continue");
        map.insert(101, "Switching Protocols");

        // 2xx
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(203, "Non-Authoritative Information");
        map.insert(204, "No Content");
        map.insert(205, "Reset Content");
        map.insert(206, "Partial Content");

        // 3xx
        map.insert(300, "Multiple Choices");
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        // 4xx
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(406, "Not Acceptable");
        map.insert(408, "Request Timeout");
        map.insert(409, "Conflict");
        map.insert(410, "Gone");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(418, "I'm a teapot");
        map.insert(422, "Unprocessable Content");
        map.insert(429, "Too Many Requests");

        // 5xx
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map.insert(504, "Gateway Timeout");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

/// 查询状态码的原因短语，未知状态码返回空串而不是 panic。
pub fn reason_phrase(code: u16) -> &'static str {
    STATUS_CODES.get(&code).copied().unwrap_or("")
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    /// HTTP/1.0 版本，部分命令行工具仍会发送
    V1_0,
    /// HTTP/1.1 版本
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
    /// 查询服务器支持的选项
    Options,
    /// 提交数据或执行操作
    Post,
}

use std::fmt;

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_phrase_known() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(500), "Internal Server Error");
    }

    #[test]
    fn test_reason_phrase_unknown() {
        assert_eq!(reason_phrase(799), "");
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpRequestMethod::Options.to_string(), "OPTIONS");
        assert_eq!(HttpVersion::V1_1.to_string(), "HTTP/1.1");
    }
}
