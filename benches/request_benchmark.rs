use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pongo::{App, HttpRequestMethod, Request};

fn request_parse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse");

    let requests = [
        (
            "simple",
            b"GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test\r\n\r\n".as_slice(),
        ),
        (
            "with_query",
            b"GET /users/profile?id=123&tab=posts HTTP/1.1\r\nHost: localhost\r\n\r\n".as_slice(),
        ),
        (
            "browser",
            b"GET /index HTTP/1.1\r\n\
              Host: localhost:7878\r\n\
              User-Agent: Mozilla/5.0 (Windows NT 10.0; Win64; x64)\r\n\
              Accept: text/html,application/xhtml+xml\r\n\
              Accept-Language: en-US,en;q=0.9\r\n\
              Connection: keep-alive\r\n\
              \r\n"
                .as_slice(),
        ),
        (
            "post_with_body",
            b"POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 13\r\n\r\nname=gophers!".as_slice(),
        ),
    ];

    for (name, request) in requests.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), request, |b, request| {
            b.iter(|| {
                let _ = Request::try_from(black_box(request), 0).unwrap();
            });
        });
    }

    group.finish();
}

fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    let mut app = App::new();
    app.use_hook(|_| {});
    app.get("/ping", |ctx| ctx.error(200, "pong"));

    for (name, method, path) in [
        ("route_hit", HttpRequestMethod::Get, "/ping"),
        ("head", HttpRequestMethod::Head, "/ping"),
        ("not_found", HttpRequestMethod::Get, "/missing"),
        ("options", HttpRequestMethod::Options, "/ping"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let response = app.serve_http(Request::new(method, black_box(path)), 0);
                black_box(response.as_bytes());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, request_parse_benchmark, dispatch_benchmark);
criterion_main!(benches);
