use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs;

use crate::options::Options;
use crate::render::Env;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    port: u16,
    local: bool,
    worker_threads: usize,
    env: Env,
    /// 默认模板集
    templates: Options,
    /// 额外的命名模板集
    sets: Vec<Options>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 7878,
            local: true,
            worker_threads: 0,
            env: Env::Development,
            templates: Options::default(),
            sets: Vec::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default().normalized()
    }

    /// 从 TOML 文件载入配置。文件缺失或格式错误时记录日志并使用默认配置。
    pub fn from_toml(filename: &str) -> Self {
        let str_val = match fs::read_to_string(filename) {
            Ok(s) => s,
            Err(e) => {
                warn!("无法读取配置文件{}：{}，使用默认配置", filename, e);
                return Self::new();
            }
        };

        match Self::from_toml_str(&str_val) {
            Ok(config) => config,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象：{}，使用默认配置", e);
                Self::new()
            }
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let raw_config: Config = toml::from_str(s)?;
        Ok(raw_config.normalized())
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        self
    }

    /// 运行模式可由外部（例如环境变量）覆盖
    pub fn set_env(&mut self, env: Env) {
        self.env = env;
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn env(&self) -> Env {
        self.env
    }

    pub fn templates(&self) -> &Options {
        &self.templates
    }

    pub fn sets(&self) -> &[Options] {
        &self.sets
    }
}
