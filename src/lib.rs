pub mod cache;
pub mod compiler;
pub mod config;
pub mod exception;
pub mod options;
pub mod param;
pub mod render;
pub mod request;
pub mod response;
pub mod server;
pub mod util;

pub use cache::{CompiledTemplate, TemplateCache};
pub use config::Config;
pub use exception::{Exception, TemplateError};
pub use options::{prepare_charset, prepare_options, Options};
pub use param::{HttpRequestMethod, HttpVersion};
pub use render::{Env, Render, TemplateRenderer};
pub use request::Request;
pub use response::{http_error, Response, ResponseWriter};
pub use server::{App, Context};

/// 模板渲染数据
pub use tera::Context as Data;
