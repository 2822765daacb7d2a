// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板集编译器
//!
//! 递归遍历模板根目录，挑出扩展名匹配的文件，以「相对路径去掉扩展名、分隔符统一为 `/`」
//! 作为查找键，一次性交给 Tera 解析。任何一个文件读取或解析失败都会让整个编译失败，
//! 不会发布半成品的模板集。

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tera::Tera;

use crate::exception::TemplateError;
use crate::options::Options;

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> TemplateError {
    TemplateError::Io {
        path: path.into(),
        source,
    }
}

/// 取文件名中第一个 `.` 开始的后缀，例如 `"a.b.html"` 得到 `".b.html"`。
pub fn template_ext(file_name: &str) -> &str {
    match file_name.find('.') {
        Some(index) => &file_name[index..],
        None => "",
    }
}

/// 由相对路径和已匹配的后缀生成查找键。
pub fn template_key(relative: &str, ext: &str) -> String {
    let stem = relative.strip_suffix(ext).unwrap_or(relative);
    stem.replace('\\', "/").trim_start_matches('/').to_string()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), TemplateError> {
    let entries = fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            collect_template_files(&path, out)?;
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            // 符号链接只跟随到文件，避免目录环
            out.push(path);
        }
    }
    Ok(())
}

/// 编译一个模板集，返回全新的 Tera 实例。
pub fn compile(options: &Options) -> Result<Tera, TemplateError> {
    let root = Path::new(&options.directory);
    let mut files = Vec::new();
    collect_template_files(root, &mut files)?;
    files.sort();

    let mut sources: Vec<(String, String)> = Vec::new();
    for path in files {
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        let ext = template_ext(file_name);
        if !options.extensions.iter().any(|e| e == ext) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path.as_path());
        let name = template_key(&relative.to_string_lossy(), ext);
        let content = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        debug!("模板集{}载入模板：{} <- {}", options.name, name, path.display());
        sources.push((name, content));
    }

    let count = sources.len();
    let mut tera = Tera::default();
    // 与 pongo2 一致：所有模板默认转义
    tera.autoescape_on(vec![""]);
    tera.add_raw_templates(sources)
        .map_err(|source| TemplateError::Parse {
            set: options.name.clone(),
            source,
        })?;

    info!(
        "模板集{}编译完成，目录：{}，模板数：{}",
        options.name, options.directory, count
    );
    Ok(tera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::prepare_options;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn names(tera: &Tera) -> Vec<String> {
        let mut names: Vec<String> = tera.get_template_names().map(String::from).collect();
        names.sort();
        names
    }

    #[test]
    fn test_template_ext() {
        assert_eq!(template_ext("hello.tmpl"), ".tmpl");
        assert_eq!(template_ext("layout.base.html"), ".base.html");
        assert_eq!(template_ext("README"), "");
    }

    #[test]
    fn test_template_key() {
        assert_eq!(template_key("hello.tmpl", ".tmpl"), "hello");
        assert_eq!(template_key("admin\\users\\list.html", ".html"), "admin/users/list");
        assert_eq!(template_key("/admin/index.html", ".html"), "admin/index");
    }

    #[test]
    fn test_compile_two_extensions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "hello.tmpl", "<h1>Hello {{ Name }}</h1>");
        write(dir.path(), "hypertext.html", "Hypertext!");
        write(dir.path(), "admin/index.html", "admin");
        write(dir.path(), "notes.txt", "ignored");
        write(dir.path(), "layout.base.html", "ignored too");

        let opt = prepare_options(Some(Options::with_directory(
            dir.path().to_str().unwrap(),
        )));
        let tera = compile(&opt).unwrap();

        assert_eq!(names(&tera), vec!["admin/index", "hello", "hypertext"]);
    }

    #[test]
    fn test_compile_custom_extension() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "mail/welcome.txt", "Welcome {{ user }}");
        write(dir.path(), "hello.tmpl", "not picked");

        let mut opt = Options::with_directory(dir.path().to_str().unwrap());
        opt.extensions = vec![".txt".to_string()];
        let tera = compile(&prepare_options(Some(opt))).unwrap();

        assert_eq!(names(&tera), vec!["mail/welcome"]);
    }

    #[test]
    fn test_compile_missing_directory() {
        let opt = prepare_options(Some(Options::with_directory(
            "/definitely/not/a/template/dir",
        )));
        let err = compile(&opt).unwrap_err();
        assert!(matches!(err, TemplateError::Io { .. }));
    }

    #[test]
    fn test_compile_parse_error_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "ok.tmpl", "fine");
        write(dir.path(), "broken.tmpl", "{% if %}");

        let opt = prepare_options(Some(Options::named("broken", dir.path().to_str().unwrap())));
        match compile(&opt) {
            Err(TemplateError::Parse { set, .. }) => assert_eq!(set, "broken"),
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_compile_resolves_inheritance_within_set() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "base.html",
            "<main>{% block content %}{% endblock content %}</main>",
        );
        write(
            dir.path(),
            "page.html",
            "{% extends \"base\" %}{% block content %}{{ title }}{% endblock content %}",
        );

        let opt = prepare_options(Some(Options::with_directory(
            dir.path().to_str().unwrap(),
        )));
        let tera = compile(&opt).unwrap();
        let mut ctx = tera::Context::new();
        ctx.insert("title", "<b>hi</b>");

        assert_eq!(
            tera.render("page", &ctx).unwrap(),
            "<main>&lt;b&gt;hi&lt;&#x2F;b&gt;</main>"
        );
    }

    proptest! {
        #[test]
        fn prop_template_key_is_normalized(
            segments in proptest::collection::vec("[a-z0-9_]{1,8}", 1..5),
            backslash in any::<bool>(),
        ) {
            let sep = if backslash { "\\" } else { "/" };
            let relative = format!("{}.tmpl", segments.join(sep));
            let key = template_key(&relative, template_ext(&relative));

            prop_assert!(!key.contains('\\'));
            prop_assert!(!key.starts_with('/'));
            prop_assert_eq!(key, segments.join("/"));
        }
    }
}
