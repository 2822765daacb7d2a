// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板集选项
//!
//! [`Options`] 是单个模板集在一次编译期间不可变的配置记录。
//! [`prepare_options`] 为缺省字段填充默认值，[`prepare_charset`] 预先拼好
//! Content-Type 的字符集后缀，避免每次请求重复拼接。

use serde_derive::{Deserialize, Serialize};

use crate::param::{
    CONTENT_HTML, DEFAULT_CHARSET, DEFAULT_DIRECTORY, DEFAULT_EXTENSIONS, DEFAULT_SET_NAME,
};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Options {
    /// 模板集名称，留空时使用保留的默认集名
    pub name: String,
    /// 模板根目录，默认 "templates"
    pub directory: String,
    /// 参与编译的文件扩展名，默认 [".tmpl", ".html"]
    pub extensions: Vec<String>,
    /// 追加到 Content-Type 的字符集，默认 "UTF-8"
    pub charset: String,
    /// 输出带缩进的 JSON
    pub indent_json: bool,
    /// 输出带缩进的 XML（HTML 渲染路径不使用）
    pub indent_xml: bool,
    /// JSON 输出前缀字节
    pub prefix_json: Vec<u8>,
    /// XML 输出前缀字节（HTML 渲染路径不使用）
    pub prefix_xml: Vec<u8>,
    /// HTML 的 Content-Type，可改为 XHTML，默认 "text/html"
    pub html_content_type: String,
}

impl Options {
    /// 以目录构造选项，其余字段走默认值。
    pub fn with_directory(directory: &str) -> Self {
        Self {
            directory: directory.to_string(),
            ..Self::default()
        }
    }

    /// 以集名和目录构造命名模板集的选项。
    pub fn named(name: &str, directory: &str) -> Self {
        Self {
            name: name.to_string(),
            directory: directory.to_string(),
            ..Self::default()
        }
    }
}

/// 填充默认值。纯函数，不触碰注册表。
pub fn prepare_options(options: Option<Options>) -> Options {
    let mut opt = options.unwrap_or_default();

    if opt.name.is_empty() {
        opt.name = DEFAULT_SET_NAME.to_string();
    }
    if opt.directory.is_empty() {
        opt.directory = DEFAULT_DIRECTORY.to_string();
    }
    if opt.extensions.is_empty() {
        opt.extensions = DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect();
    }
    if opt.charset.is_empty() {
        opt.charset = DEFAULT_CHARSET.to_string();
    }
    if opt.html_content_type.is_empty() {
        opt.html_content_type = CONTENT_HTML.to_string();
    }

    opt
}

/// 生成 `"; charset=<charset>"` 形式的后缀，空字符集回落到 UTF-8。
pub fn prepare_charset(charset: &str) -> String {
    if !charset.is_empty() {
        return format!("; charset={}", charset);
    }
    format!("; charset={}", DEFAULT_CHARSET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::CONTENT_XHTML;

    #[test]
    fn test_prepare_options_defaults() {
        let opt = prepare_options(None);

        assert_eq!(opt.name, DEFAULT_SET_NAME);
        assert_eq!(opt.directory, "templates");
        assert_eq!(opt.extensions, vec![".tmpl".to_string(), ".html".to_string()]);
        assert_eq!(opt.charset, "UTF-8");
        assert_eq!(opt.html_content_type, "text/html");
        assert!(!opt.indent_json);
    }

    #[test]
    fn test_prepare_options_keeps_explicit_values() {
        let opt = prepare_options(Some(Options {
            name: "admin".to_string(),
            directory: "fixtures/admin".to_string(),
            extensions: vec![".tpl".to_string()],
            charset: "ISO-8859-1".to_string(),
            html_content_type: CONTENT_XHTML.to_string(),
            indent_json: true,
            ..Options::default()
        }));

        assert_eq!(opt.name, "admin");
        assert_eq!(opt.directory, "fixtures/admin");
        assert_eq!(opt.extensions, vec![".tpl".to_string()]);
        assert_eq!(opt.charset, "ISO-8859-1");
        assert_eq!(opt.html_content_type, CONTENT_XHTML);
        assert!(opt.indent_json);
    }

    #[test]
    fn test_prepare_charset() {
        assert_eq!(prepare_charset(""), "; charset=UTF-8");
        assert_eq!(prepare_charset("GBK"), "; charset=GBK");
    }

    #[test]
    fn test_options_from_toml_fragment() {
        let opt: Options = toml::from_str(
            r#"
            name = "mail"
            directory = "templates/mail"
            extensions = [".txt"]
            "#,
        )
        .unwrap();

        assert_eq!(opt.name, "mail");
        assert_eq!(opt.extensions, vec![".txt".to_string()]);
        assert!(opt.charset.is_empty());
    }
}
