// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了两类错误：
//! - [`Exception`]：请求报文解析阶段的协议错误，上层直接映射为 4xx 响应。
//! - [`TemplateError`]：模板集编译与渲染阶段的错误。编译期错误（目录不可读、模板解析失败）
//!   由调用方决定是否终止启动；渲染期错误只影响当前请求，转化为 500 响应。

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::param::{DEFAULT_SET_NAME, ENGINE_LABEL};

/// 请求解析过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行缺失或格式不正确。
    MalformedRequestLine,
    /// 客户端使用了服务器暂不支持的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequestLine => write!(f, "Malformed request line"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
        }
    }
}

/// 模板集编译、查找与执行时可能出现的错误。
#[derive(Debug, Error)]
pub enum TemplateError {
    /// 遍历模板目录或读取模板文件失败。
    #[error("pongo2: template io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// 模板集中至少有一个模板无法解析，整个集合不会被发布。
    #[error("pongo2: failed to compile template set \"{set}\": {}", error_chain(.source))]
    Parse { set: String, source: tera::Error },

    /// 请求的模板集从未注册过。
    #[error("pongo2: template set \"{0}\" is undefined")]
    SetUndefined(String),

    /// 模板集存在，但其中没有该名称的模板。
    #[error("{}", undefined_message(.set, .name))]
    TemplateUndefined { set: String, name: String },

    /// 模板执行失败（变量缺失、过滤器出错、写出失败等）。
    #[error("{}", error_chain(.source))]
    Execute { name: String, source: tera::Error },

    /// 请求上下文上没有挂载渲染句柄（渲染器钩子未安装）。
    #[error("pongo2: renderer is not installed")]
    RendererMissing,

    /// 渲染数据无法转换为模板上下文或 JSON。
    #[error("pongo2: serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TemplateError {
    /// 是否属于查找失败（模板集或模板名未定义）。
    pub fn is_undefined(&self) -> bool {
        matches!(
            self,
            TemplateError::SetUndefined(_) | TemplateError::TemplateUndefined { .. }
        )
    }
}

fn undefined_message(set: &str, name: &str) -> String {
    if set == DEFAULT_SET_NAME {
        format!("{}: \"{}\" is undefined", ENGINE_LABEL, name)
    } else {
        format!("{}: \"{}\" is undefined in set \"{}\"", ENGINE_LABEL, name, set)
    }
}

/// Tera 的顶层错误信息通常只有 "Failed to render"，真正原因在 source 链上。
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        current = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_in_default_set() {
        let err = TemplateError::TemplateUndefined {
            set: DEFAULT_SET_NAME.to_string(),
            name: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "pongo2: \"nope\" is undefined");
        assert!(err.is_undefined());
    }

    #[test]
    fn test_undefined_in_named_set() {
        let err = TemplateError::TemplateUndefined {
            set: "admin".to_string(),
            name: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "pongo2: \"nope\" is undefined in set \"admin\"");
    }

    #[test]
    fn test_set_undefined() {
        let err = TemplateError::SetUndefined("ghost".to_string());
        assert_eq!(err.to_string(), "pongo2: template set \"ghost\" is undefined");
        assert!(err.is_undefined());
    }

    #[test]
    fn test_exception_display() {
        assert_eq!(
            Exception::UnsupportedHttpVersion.to_string(),
            "Unsupported HTTP version"
        );
    }
}
