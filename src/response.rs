//! # HTTP 响应模块
//!
//! - [`ResponseWriter`]：处理器与渲染器写出响应的句柄。状态码只能写一次，
//!   写出状态码之后再修改标头不会生效，与真实连接上「标头已发送」的语义一致。
//! - [`Response`]：处理完成后的不可变响应，负责序列化为 HTTP/1.1 报文。

use std::io::{self, Write};

use bytes::Bytes;
use chrono::prelude::*;
use log::{debug, warn};

use crate::{
    param::*,
    util::HtmlBuilder,
};

pub struct ResponseWriter {
    id: u128,
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new(id: u128) -> Self {
        Self {
            id,
            status: None,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 设置（覆盖）一个标头。状态码写出后调用将被忽略。
    pub fn set_header(&mut self, name: &str, value: &str) {
        if self.status.is_some() {
            debug!("[ID{}]标头已写出，忽略对{}的修改", self.id, name);
            return;
        }
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// 写出状态码。重复调用只记录警告，保留第一次的状态码。
    pub fn write_header(&mut self, status: u16) {
        if let Some(written) = self.status {
            warn!(
                "[ID{}]重复的write_header调用：{}，已写出的状态码为{}",
                self.id, status, written
            );
            return;
        }
        self.status = Some(status);
    }

    /// 状态码是否已经写出
    pub fn written(&self) -> bool {
        self.status.is_some()
    }

    pub fn status(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        Response::new(status, self.headers, Bytes::from(self.body))
    }
}

impl Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.write_header(200);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 以纯文本写出错误信息，正文为 `message` 加换行。
pub fn http_error(w: &mut ResponseWriter, message: &str, code: u16) {
    w.set_header(CONTENT_TYPE, CONTENT_PLAIN);
    w.set_header("X-Content-Type-Options", "nosniff");
    w.write_header(code);
    // 写入内存缓冲区不会失败
    let _ = writeln!(w, "{}", message);
}

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    headers: Vec<(String, String)>,
    content: Bytes,
    date: DateTime<Utc>,
    server_name: String,
    head_only: bool,
}

impl Response {
    pub fn new(status_code: u16, headers: Vec<(String, String)>, content: Bytes) -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code,
            information: reason_phrase(status_code).to_string(),
            headers,
            content,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            head_only: false,
        }
    }

    /// 框架层错误页（404、405 等），不经过模板渲染。
    pub fn from_status_code(code: u16) -> Self {
        let note = match code {
            404 => Some(r"<h2>噢！</h2><p>你指定的网页无法找到。</p>"),
            405 => Some(r"<h2>噢！</h2><p>该路径不支持此请求方法。</p>"),
            500 => Some(r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"),
            _ => None,
        };
        let content = HtmlBuilder::from_status_code(code, note).build();
        Self::new(
            code,
            vec![(CONTENT_TYPE.to_string(), "text/html; charset=utf-8".to_string())],
            Bytes::from(content),
        )
    }

    /// OPTIONS 请求的 204 响应，携带 `Allow` 头。
    pub fn options() -> Self {
        let allow = ALLOWED_METHODS
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self::new(204, vec![("Allow".to_string(), allow)], Bytes::new())
    }

    /// HEAD 请求：保留 Content-Length，不发送正文。
    pub fn into_head(mut self) -> Self {
        self.head_only = true;
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut header = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        for (name, value) in &self.headers {
            // Content-Length 由正文长度决定，处理器设置的值不予采用
            if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
                continue;
            }
            header.push_str(&format!("{}: {}{}", name, value, CRLF));
        }
        header.push_str(&format!("{}: {}{}", CONTENT_LENGTH, self.content.len(), CRLF));
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        header.push_str(CRLF);

        let mut bytes = header.into_bytes();
        if !self.head_only {
            bytes.extend_from_slice(&self.content);
        }
        bytes
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.content
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.content).to_string()
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
