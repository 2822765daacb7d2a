// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 渲染调度器
//!
//! [`TemplateRenderer`] 在启动时编译所有模板集并持有缓存；它提供一个请求钩子，
//! 为每个请求挂上轻量的 [`Render`] 句柄。处理器通过 `Render` 按
//! （模板集, 模板名, 状态码, 数据）渲染 HTML。
//!
//! 开发模式（[`Env::Development`]）下每次渲染前都会整体重新编译目标模板集，
//! 以便修改模板后刷新即可看到效果；生产模式只在显式 reload 时重新编译。

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_derive::Deserialize;
use tera::Context;

use crate::{
    cache::{CompiledTemplate, TemplateCache},
    exception::TemplateError,
    options::{prepare_charset, prepare_options, Options},
    param::{CONTENT_JSON, CONTENT_TYPE, DEFAULT_SET_NAME},
    response::{http_error, ResponseWriter},
    server::Context as RequestContext,
};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde_derive::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    /// 每次渲染前重新编译模板集
    #[default]
    Development,
    /// 只在显式 reload 时重新编译
    Production,
    /// 与生产模式相同的缓存策略，供测试使用
    Test,
}

impl FromStr for Env {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "development" | "dev" => Ok(Env::Development),
            "production" | "prod" => Ok(Env::Production),
            "test" => Ok(Env::Test),
            other => Err(format!("unknown env: {}", other)),
        }
    }
}

pub struct TemplateRenderer {
    cache: Arc<TemplateCache>,
    env: Env,
}

impl TemplateRenderer {
    /// 只安装默认模板集。
    pub fn new(env: Env, options: Option<Options>) -> Result<Self, TemplateError> {
        Self::with_sets(env, options, Vec::new())
    }

    /// 安装默认模板集以及若干命名模板集。任一集合编译失败即返回错误，
    /// 由调用方决定是否终止启动。
    pub fn with_sets(
        env: Env,
        default: Option<Options>,
        sets: Vec<Options>,
    ) -> Result<Self, TemplateError> {
        let cache = TemplateCache::new();

        let mut default = prepare_options(default);
        if default.name != DEFAULT_SET_NAME {
            warn!(
                "默认模板集的名称{}被忽略，使用保留名称{}",
                default.name, DEFAULT_SET_NAME
            );
            default.name = DEFAULT_SET_NAME.to_string();
        }
        cache.install(default)?;

        for set in sets {
            let set = prepare_options(Some(set));
            if set.name == DEFAULT_SET_NAME {
                warn!("命名模板集未指定名称或使用了保留名称，将覆盖默认模板集");
            }
            cache.install(set)?;
        }

        info!(
            "模板渲染器已就绪，运行模式：{:?}，模板集：{:?}",
            env,
            cache.set_names()
        );
        Ok(Self {
            cache: Arc::new(cache),
            env,
        })
    }

    pub fn env(&self) -> Env {
        self.env
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    /// 生成一个请求级渲染句柄。
    pub fn render(&self) -> Render {
        Render {
            cache: Arc::clone(&self.cache),
            env: self.env,
        }
    }

    /// 显式重新编译某个模板集，生产模式下刷新模板的唯一途径。
    pub fn reload(&self, set: &str) -> Result<(), TemplateError> {
        self.cache.recompile(set)
    }

    /// 重新编译全部模板集，遇到第一个错误即停止。
    pub fn reload_all(&self) -> Result<(), TemplateError> {
        for set in self.cache.set_names() {
            self.cache.recompile(&set)?;
        }
        Ok(())
    }

    /// 请求钩子：为每个请求挂上 `Render`。
    pub fn hook(self: &Arc<Self>) -> impl Fn(&mut RequestContext) + Send + Sync + 'static {
        let renderer = Arc::clone(self);
        move |ctx: &mut RequestContext| ctx.set_render(renderer.render())
    }
}

#[derive(Clone)]
pub struct Render {
    cache: Arc<TemplateCache>,
    env: Env,
}

impl Render {
    fn resolve(&self, set: &str, name: &str, id: u128) -> Result<CompiledTemplate, TemplateError> {
        if self.env == Env::Development {
            debug!("[ID{}]开发模式，重新编译模板集{}", id, set);
            self.cache.recompile(set)?;
        }
        self.cache.lookup(set, name)
    }

    /// 用默认模板集渲染 HTML。
    pub fn html(&self, w: &mut ResponseWriter, status: u16, name: &str, data: &Context) {
        self.html_set(w, status, DEFAULT_SET_NAME, name, data)
    }

    /// 用指定模板集渲染 HTML。
    ///
    /// 查找失败只影响当前请求：写出 500 和纯文本错误信息。
    /// 执行失败时状态码与标头已经写出，错误信息会追加在已输出内容之后。
    pub fn html_set(
        &self,
        w: &mut ResponseWriter,
        status: u16,
        set: &str,
        name: &str,
        data: &Context,
    ) {
        let id = w.id();
        let template = match self.resolve(set, name, id) {
            Ok(t) => t,
            Err(e) => {
                warn!("[ID{}]无法渲染模板{}/{}：{}", id, set, name, e);
                http_error(w, &e.to_string(), 500);
                return;
            }
        };

        let options = template.options();
        let content_type = format!(
            "{}{}",
            options.html_content_type,
            prepare_charset(&options.charset)
        );
        w.set_header(CONTENT_TYPE, &content_type);
        w.write_header(status);

        if let Err(e) = template.execute_writer(data, &mut *w) {
            error!("[ID{}]执行模板{}/{}失败：{}", id, set, name, e);
            http_error(w, &e.to_string(), 500);
            return;
        }
        debug!("[ID{}]模板{}/{}渲染完成", id, set, name);
    }

    /// 用默认模板集渲染为字符串，适用于只需要 HTML 片段的场景。
    pub fn html_string(&self, name: &str, data: &Context) -> Result<String, TemplateError> {
        self.html_set_string(DEFAULT_SET_NAME, name, data)
    }

    pub fn html_set_string(
        &self,
        set: &str,
        name: &str,
        data: &Context,
    ) -> Result<String, TemplateError> {
        self.resolve(set, name, 0)?.execute(data)
    }

    /// 切换默认模板集的目录并重新编译，下一次渲染即使用新模板。
    pub fn set_template_path(&self, path: &str) -> Result<(), TemplateError> {
        self.set_template_path_for(DEFAULT_SET_NAME, path)
    }

    pub fn set_template_path_for(&self, set: &str, path: &str) -> Result<(), TemplateError> {
        info!("模板集{}切换目录：{}", set, path);
        self.cache.set_directory(set, path)
    }

    /// 输出 JSON，遵循默认模板集的 `indent_json` 与 `prefix_json`。
    pub fn json<T: Serialize + ?Sized>(&self, w: &mut ResponseWriter, status: u16, value: &T) {
        let options = match self.cache.options(DEFAULT_SET_NAME) {
            Ok(o) => o,
            Err(e) => {
                http_error(w, &e.to_string(), 500);
                return;
            }
        };
        let encoded = if options.indent_json {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        let body = match encoded {
            Ok(b) => b,
            Err(e) => {
                error!("[ID{}]JSON序列化失败：{}", w.id(), e);
                http_error(w, &TemplateError::from(e).to_string(), 500);
                return;
            }
        };

        w.set_header(
            CONTENT_TYPE,
            &format!("{}{}", CONTENT_JSON, prepare_charset(&options.charset)),
        );
        w.write_header(status);
        // 写入内存缓冲区不会失败
        if !options.prefix_json.is_empty() {
            let _ = w.write_all(&options.prefix_json);
        }
        let _ = w.write_all(&body);
    }

    /// 以纯文本写出错误。
    pub fn error(&self, w: &mut ResponseWriter, status: u16, message: &str) {
        http_error(w, message, status);
    }
}
