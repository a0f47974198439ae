/*
 * http_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ritagli, a web application utility toolkit.
 *
 * Ritagli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ritagli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ritagli.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Page fetcher against an in-process HTTP/1.1 server: redirects with cookies, form POST,
//! HEAD, and page inspection.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ritagli_core::web::{Body, CallResult, HttpError, HttpRequest};

type Route = Arc<dyn Fn(&str, &str) -> Vec<u8> + Send + Sync>;

/// Requests seen by the server, as raw text.
type Log = Arc<Mutex<Vec<String>>>;

fn response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {}\r\n", status);
    for (k, v) in headers {
        out.push_str(&format!("{}: {}\r\n", k, v));
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()));
    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..end]).to_string();
            let length = head
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            while data.len() < end + 4 + length {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&buf[..n]);
            }
            break;
        }
    }
    String::from_utf8_lossy(&data).to_string()
}

/// Serve forever; `route(path, request)` returns the raw response.
async fn serve(route: Route) -> (String, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let seen = log.clone();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
            seen.lock().unwrap().push(request.clone());
            let reply = route(&path, &request);
            stream.write_all(&reply).await.unwrap();
            let _ = stream.shutdown().await;
        }
    });
    (base, log)
}

const PAGE: &str = "<html><head><title>\n  Fish &amp; Chips\t</title></head>\
<body><p>The sea and the fish are in the net of the boat</p></body></html>";

#[tokio::test]
async fn get_follows_redirect_with_cookies() {
    let (base, log) = serve(Arc::new(|path: &str, _: &str| match path {
        "/start?q=a+b" => response(
            "302 Found",
            &[("Location", "/final"), ("Set-Cookie", "sid=abc; path=/")],
            b"",
        ),
        "/final" => response("200 OK", &[("Set-Cookie", "seen=1")], PAGE.as_bytes()),
        _ => response("404 Not Found", &[], b"missing"),
    }))
    .await;

    let mut req = HttpRequest::with_method(
        format!("{}/start", base),
        None,
        "get",
        vec![("q".to_string(), "a b".to_string())],
    );
    req.add_cookie("lang", "es");
    let body = req.call().await.unwrap();
    assert_eq!(body, CallResult::Body(Body::Bytes(PAGE.as_bytes().to_vec())));
    assert_eq!(req.url(), "/final");
    assert_eq!(req.response_code(), 200);
    assert_eq!(
        req.cookies(),
        &[
            ("lang".to_string(), "es".to_string()),
            ("sid".to_string(), "abc".to_string()),
            ("seen".to_string(), "1".to_string()),
        ]
    );

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("Cookie: lang=es;"));
    assert!(requests[0].contains("User-Agent: Mozilla/5.0 (Windows; U; Windows NT 6.1; rv:2.2) Gecko/20110201"));
    assert!(requests[1].starts_with("GET /final "));
    assert!(requests[1].contains("Cookie: lang=es; sid=abc;"));

    assert_eq!(req.title().await.unwrap().as_deref(), Some("Fish & Chips"));
    assert_eq!(req.encoding().await.unwrap(), Some("US-ASCII"));
    assert_eq!(req.language().await.unwrap().as_deref(), Some("en"));
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn post_sends_form_and_continues_redirect_as_get() {
    let (base, log) = serve(Arc::new(|path: &str, request: &str| match path {
        "/form" if request.starts_with("POST ") => {
            response("302 Found", &[("Location", "/done")], b"")
        }
        "/done" => response("200 OK", &[], b"thanks"),
        _ => response("405 Method Not Allowed", &[], b""),
    }))
    .await;

    let mut req = HttpRequest::with_credentials(
        format!("{}/form", base),
        None,
        "POST",
        vec![
            ("name".to_string(), "José".to_string()),
            ("n".to_string(), "1&2".to_string()),
        ],
        "joe",
        "pw",
    );
    let body = req.post().await.unwrap().clone();
    assert_eq!(body, Body::Bytes(b"thanks".to_vec()));

    let requests = log.lock().unwrap().clone();
    assert!(requests[0].contains("Content-Type: application/x-www-form-urlencoded\r\n"));
    assert!(requests[0].contains("Authorization: Basic am9lOnB3\r\n"));
    assert!(requests[0].ends_with("\r\n\r\nname=Jos%E9&n=1%262"));
    assert!(requests[1].starts_with("GET /done "));
    assert!(!requests[1].contains("Authorization"));
}

#[tokio::test]
async fn head_returns_first_code_and_final_url() {
    let (base, _log) = serve(Arc::new(|path: &str, request: &str| {
        assert!(request.starts_with("HEAD "));
        match path {
            "/old" => response("301 Moved Permanently", &[("Location", "/new")], b""),
            _ => response("200 OK", &[], b""),
        }
    }))
    .await;

    let mut req = HttpRequest::with_method(format!("{}/old", base), None, "HEAD", Vec::new());
    assert_eq!(req.call().await.unwrap(), CallResult::Code(301));
    assert_eq!(req.url(), "/new");
}

#[tokio::test]
async fn status_error_and_declared_charset() {
    let latin1_page: &[u8] = b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=ISO-8859-1\">\
<title>Espa\xf1a</title></head><body>el r\xedo de la ciudad y los barcos del puerto</body></html>";
    let page = latin1_page.to_vec();
    let (base, _log) = serve(Arc::new(move |path: &str, _: &str| match path {
        "/es" => response("200 OK", &[], &page),
        _ => response("500 Internal Server Error", &[], b"boom"),
    }))
    .await;

    let mut broken = HttpRequest::new(format!("{}/broken", base));
    assert!(matches!(broken.get().await, Err(HttpError::Status(500))));
    assert_eq!(broken.response_code(), 500);

    let mut req = HttpRequest::new(format!("{}/es", base));
    assert_eq!(req.encoding().await.unwrap(), Some("ISO-8859-1"));
    assert_eq!(req.language().await.unwrap().as_deref(), Some("es"));
}

#[tokio::test]
async fn unknown_method_fails_before_connecting() {
    let mut req = HttpRequest::with_method("http://127.0.0.1:9/", None, "PATCH", Vec::new());
    match req.call().await {
        Err(HttpError::UnknownMethod(m)) => assert_eq!(m, "PATCH"),
        other => panic!("unexpected {:?}", other),
    }
}
