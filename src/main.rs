// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板渲染演示服务器
//!
//! 启动流程：
//! - 载入日志与 TOML 配置，`PONGO_ENV` 环境变量可覆盖运行模式
//! - 编译全部模板集，任一集合解析失败即终止启动
//! - 注册渲染钩子与演示路由，启动 Tokio 接收循环
//! - 后台管理控制台（stop / status / reload / help）

use pongo::{App, Config, Data, Env, TemplateRenderer};

use log::{error, info, warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    runtime::Builder,
    sync::watch,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::Arc,
};

const LOG_CONFIG: &str = "config/log4rs.yaml";
const APP_CONFIG: &str = "config/development.toml";

fn init_logging() {
    if log4rs::init_file(LOG_CONFIG, Default::default()).is_ok() {
        return;
    }
    // 找不到日志配置文件时退回到控制台输出
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {m}{n}",
        )))
        .build();
    let config = log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    if let Ok(config) = config {
        let _ = log4rs::init_config(config);
    }
    warn!("未找到日志配置文件{}，使用默认控制台日志", LOG_CONFIG);
}

fn main() {
    init_logging();

    let mut config = Config::from_toml(APP_CONFIG);
    if let Ok(value) = std::env::var("PONGO_ENV") {
        match value.parse::<Env>() {
            Ok(env) => config.set_env(env),
            Err(e) => warn!("忽略环境变量PONGO_ENV：{}", e),
        }
    }
    info!("配置文件已载入，运行模式：{:?}", config.env());

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };

    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    let renderer = match TemplateRenderer::with_sets(
        config.env(),
        Some(config.templates().clone()),
        config.sets().to_vec(),
    ) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            error!("模板编译失败，服务器无法启动：{}", e);
            process::exit(1);
        }
    };

    let mut app = App::new();
    app.use_hook(renderer.hook());
    app.get("/", |ctx| {
        let mut data = Data::new();
        data.insert("title", "pongo-webserver");
        data.insert("user_agent", ctx.request().user_agent());
        ctx.html(200, "index", &data);
    });
    {
        let cache = Arc::clone(renderer.cache());
        app.get("/api/sets", move |ctx| {
            let sets: Vec<(String, Vec<String>)> = cache
                .set_names()
                .into_iter()
                .map(|set| {
                    let names = cache.template_names(&set).unwrap_or_default();
                    (set, names)
                })
                .collect();
            ctx.json(200, &sets);
        });
    }
    let app = Arc::new(app);

    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, port);
    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            process::exit(1);
        }
    };
    info!("服务端将在{}上监听Socket连接", socket);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 后台管理控制台
    tokio::spawn({
        let app = Arc::clone(&app);
        let renderer = Arc::clone(&renderer);
        async move {
            let mut reader = BufReader::new(tokio::io::stdin());
            let mut input = String::new();
            loop {
                input.clear();
                match reader.read_line(&mut input).await {
                    Ok(0) | Err(_) => {
                        // 标准输入关闭后继续持有停机信号的发送端
                        warn!("控制台输入已关闭，管理指令不可用");
                        std::future::pending::<()>().await;
                        break;
                    }
                    Ok(_) => {}
                }
                let cmd = input.trim();
                match cmd {
                    "stop" => {
                        let _ = shutdown_tx.send(true);
                        println!("停机指令已激活，服务器不再接收新连接...");
                        break;
                    }
                    "status" => {
                        println!("== Webserver 状态 ===");
                        println!("运行模式: {:?}", renderer.env());
                        println!("模板集: {:?}", renderer.cache().set_names());
                        println!("当前活跃连接数: {}", app.active_connections());
                        println!("====================");
                    }
                    "reload" => match renderer.reload_all() {
                        Ok(()) => println!("全部模板集已重新编译"),
                        Err(e) => println!("重新编译失败，保留原有模板：{}", e),
                    },
                    "help" => {
                        println!("== Webserver Help ==");
                        println!("stop   - 发出停机信号");
                        println!("status - 查看当前服务器运行状态");
                        println!("reload - 重新编译全部模板集");
                        println!("help   - 显示此帮助信息");
                        println!("====================");
                    }
                    "" => {}
                    _ => println!("无效的命令：{}", cmd),
                }
            }
        }
    });

    app.run(listener, shutdown_rx).await;
    info!("服务器已停止");
}
