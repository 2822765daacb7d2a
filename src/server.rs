// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 宿主框架
//!
//! 一个最小的请求分发层：按注册顺序执行请求钩子，再交给精确匹配路径的处理器。
//! 模板渲染器以钩子的形式安装（见 [`TemplateRenderer::hook`](crate::render::TemplateRenderer::hook)），
//! 处理器通过 [`Context`] 上的 `html` 系列方法渲染页面。
//!
//! [`App::run`] 是基于 Tokio 的接收循环，每个连接一个任务；同步的处理器
//! （包括开发模式下的目录遍历与重新编译）放到阻塞线程池中执行。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::Serialize;
use tera::Context as Data;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::watch,
};

use crate::{
    exception::{Exception, TemplateError},
    param::HttpRequestMethod,
    render::Render,
    request::Request,
    response::{http_error, Response, ResponseWriter},
};

/// 请求钩子与处理器的统一签名
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// 单次读取请求报文的缓冲区大小
const READ_BUFFER_SIZE: usize = 8192;

/// 读取请求报文的超时时间
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// 单个请求的处理上下文。
pub struct Context {
    request: Request,
    writer: ResponseWriter,
    render: Option<Render>,
}

impl Context {
    pub fn new(request: Request, id: u128) -> Self {
        Self {
            request,
            writer: ResponseWriter::new(id),
            render: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn writer(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    pub fn written(&self) -> bool {
        self.writer.written()
    }

    pub fn set_render(&mut self, render: Render) {
        self.render = Some(render);
    }

    pub fn render(&self) -> Option<&Render> {
        self.render.as_ref()
    }

    pub fn html(&mut self, status: u16, name: &str, data: &Data) {
        match &self.render {
            Some(render) => render.html(&mut self.writer, status, name, data),
            None => render_missing(&mut self.writer),
        }
    }

    pub fn html_set(&mut self, status: u16, set: &str, name: &str, data: &Data) {
        match &self.render {
            Some(render) => render.html_set(&mut self.writer, status, set, name, data),
            None => render_missing(&mut self.writer),
        }
    }

    pub fn html_string(&self, name: &str, data: &Data) -> Result<String, TemplateError> {
        match &self.render {
            Some(render) => render.html_string(name, data),
            None => Err(TemplateError::RendererMissing),
        }
    }

    pub fn set_template_path(&self, path: &str) -> Result<(), TemplateError> {
        match &self.render {
            Some(render) => render.set_template_path(path),
            None => Err(TemplateError::RendererMissing),
        }
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, status: u16, value: &T) {
        match &self.render {
            Some(render) => render.json(&mut self.writer, status, value),
            None => render_missing(&mut self.writer),
        }
    }

    pub fn error(&mut self, status: u16, message: &str) {
        http_error(&mut self.writer, message, status);
    }

    fn into_response(self) -> Response {
        self.writer.into_response()
    }
}

#[derive(Default)]
pub struct App {
    hooks: Vec<Handler>,
    routes: HashMap<(HttpRequestMethod, String), Handler>,
    active_connections: AtomicUsize,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册请求钩子，按注册顺序在处理器之前执行。
    /// 钩子一旦写出了状态码，后续钩子与处理器都不再执行。
    pub fn use_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn route<F>(&mut self, method: HttpRequestMethod, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.routes
            .insert((method, path.to_string()), Arc::new(handler));
        self
    }

    /// 注册 GET 路由，HEAD 请求共用该处理器。
    pub fn get<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(HttpRequestMethod::Get, path, handler)
    }

    pub fn post<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(HttpRequestMethod::Post, path, handler)
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// 在进程内处理一个请求，返回完整响应。
    pub fn serve_http(&self, request: Request, id: u128) -> Response {
        let method = request.method();
        if method == HttpRequestMethod::Options {
            debug!("[ID{}]请求方法为OPTIONS", id);
            return Response::options();
        }

        let lookup = match method {
            HttpRequestMethod::Head => HttpRequestMethod::Get,
            m => m,
        };
        let handler = match self.routes.get(&(lookup, request.path().to_string())) {
            Some(h) => Arc::clone(h),
            None => {
                let path_known = self.routes.keys().any(|(_, p)| p == request.path());
                return if path_known {
                    Response::from_status_code(405)
                } else {
                    Response::from_status_code(404)
                };
            }
        };

        let mut ctx = Context::new(request, id);
        for hook in &self.hooks {
            hook(&mut ctx);
            if ctx.written() {
                debug!("[ID{}]钩子已写出响应，跳过处理器", id);
                return finish(ctx.into_response(), method);
            }
        }
        handler(&mut ctx);
        finish(ctx.into_response(), method)
    }

    /// 接收循环。`shutdown` 变为 `true` 后停止接收新连接。
    pub async fn run(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        let mut id: u128 = 0;
        loop {
            let (stream, addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("接收连接失败：{}", e);
                        continue;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("接收循环收到停机指令，正在退出...");
                        break;
                    }
                    continue;
                }
            };
            debug!("[ID{}]新的连接：{}", id, addr);

            let app = Arc::clone(&self);
            tokio::spawn(async move {
                app.active_connections.fetch_add(1, Ordering::SeqCst);
                handle_connection(Arc::clone(&app), stream, id).await;
                app.active_connections.fetch_sub(1, Ordering::SeqCst);
            });
            id += 1;
        }
    }
}

fn render_missing(w: &mut ResponseWriter) {
    error!("[ID{}]未安装模板渲染器", w.id());
    http_error(w, &TemplateError::RendererMissing.to_string(), 500);
}

fn finish(response: Response, method: HttpRequestMethod) -> Response {
    match method {
        HttpRequestMethod::Head => response.into_head(),
        _ => response,
    }
}

async fn read_request(stream: &mut TcpStream, id: u128) -> Option<Vec<u8>> {
    let mut buffer = vec![0; READ_BUFFER_SIZE];
    match tokio::time::timeout(READ_TIMEOUT, stream.read(&mut buffer)).await {
        Ok(Ok(0)) => None,
        Ok(Ok(n)) => {
            buffer.truncate(n);
            Some(buffer)
        }
        Ok(Err(e)) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            None
        }
        Err(_) => {
            warn!("[ID{}]读取请求超时", id);
            None
        }
    }
}

async fn handle_connection(app: Arc<App>, mut stream: TcpStream, id: u128) {
    let buffer = match read_request(&mut stream, id).await {
        Some(b) => b,
        None => return,
    };
    let start_time = Instant::now();

    let request = match Request::try_from(&buffer, id) {
        Ok(req) => req,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}", id, e);
            let code = match e {
                Exception::UnsupportedHttpVersion => 505,
                Exception::UnSupportedRequestMethod => 405,
                _ => 400,
            };
            let _ = stream
                .write_all(&Response::from_status_code(code).as_bytes())
                .await;
            return;
        }
    };

    let method = request.method();
    let path = request.path().to_string();
    let user_agent = request.user_agent().to_string();

    // 处理器是同步的，开发模式下还会遍历目录，放到阻塞线程池执行
    let worker = Arc::clone(&app);
    let response = match tokio::task::spawn_blocking(move || worker.serve_http(request, id)).await
    {
        Ok(r) => r,
        Err(e) => {
            error!("[ID{}]处理器异常退出：{}", id, e);
            Response::from_status_code(500)
        }
    };

    info!(
        "[ID{}] {}, {}, {}, {}, {}ms, {}",
        id,
        method,
        path,
        response.status_code(),
        response.information(),
        start_time.elapsed().as_millis(),
        user_agent,
    );

    if let Err(e) = stream.write_all(&response.as_bytes()).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}
