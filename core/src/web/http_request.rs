/*
 * http_request.rs
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

//! Page fetcher over the HTTP/1.1 client: GET, POST and HEAD with manual redirect handling,
//! cookie carry-over, basic auth, and page inspection (source, encoding, title, language).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use std::io;
use thiserror::Error;
use url::Url;

use crate::charset::{decode_with_label, Charset};
use crate::protocol::http::{BufferedResponse, HttpClient, Method, RequestBuilder};
use crate::web::{cookies, language, page, urlencode};
use crate::xhtml::html_text;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows; U; Windows NT 6.1; rv:2.2) Gecko/20110201";

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 20;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Unknown HTTP method {0}")]
    UnknownMethod(String),
    #[error("invalid URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported URL scheme {0}")]
    Scheme(String),
    /// Final status other than 200 or 202.
    #[error("{0}")]
    Status(u16),
    #[error("too many redirects from {0}")]
    TooManyRedirects(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Response body as returned by `get` and `post`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Raw bytes when the response had no Content-Encoding.
    Bytes(Vec<u8>),
    /// Decoded text when the response named a Content-Encoding.
    Text(String),
}

/// Outcome of `call()`: a body for GET and POST, the status code for HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult {
    Body(Body),
    Code(u16),
}

/// One request/response exchange with no redirect handling.
struct Exchange {
    code: u16,
    location: Option<String>,
    set_cookies: Vec<String>,
    content_encoding: Option<String>,
    body: Vec<u8>,
}

impl Exchange {
    fn is_redirect(&self) -> bool {
        self.code == 301 || self.code == 302
    }

    fn is_accepted(&self) -> bool {
        self.code == 200 || self.code == 202
    }

    fn into_body(self) -> (Body, Option<String>) {
        match self.content_encoding {
            Some(label) => (Body::Text(decode_with_label(&self.body, &label)), Some(label)),
            None => (Body::Bytes(self.body), None),
        }
    }
}

fn parse_url(url: &str, base: Option<&Url>) -> Result<Url, HttpError> {
    let parsed = match base {
        Some(b) => b.join(url),
        None => Url::parse(url),
    };
    parsed.map_err(|source| HttpError::Url {
        url: url.to_string(),
        source,
    })
}

async fn exchange(
    target: &Url,
    method: Method,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
) -> Result<Exchange, HttpError> {
    let use_tls = match target.scheme() {
        "http" => false,
        "https" => true,
        other => return Err(HttpError::Scheme(other.to_string())),
    };
    let host = target
        .host_str()
        .ok_or_else(|| HttpError::Scheme(target.to_string()))?;
    let port = target.port_or_known_default().unwrap_or(80);
    let mut conn = HttpClient::connect(host, port, use_tls).await?;

    let mut path = target.path().to_string();
    if let Some(q) = target.query() {
        path.push('?');
        path.push_str(q);
    }
    let mut request = RequestBuilder::new(method, path);
    for (k, v) in headers {
        request.header(k, v);
    }
    request.header("Connection", "close");
    if let Some(b) = body {
        request.body(b);
    }

    tracing::debug!(url = %target, %method, "HTTP request");
    let mut response = BufferedResponse::new();
    conn.send(request, &mut response).await?;
    let code = response.code();
    Ok(Exchange {
        code,
        location: response.header_value("Location").map(str::to_string),
        set_cookies: response.header_values("Set-Cookie").map(str::to_string).collect(),
        content_encoding: response.header_value("Content-Encoding").map(str::to_string),
        body: std::mem::take(&mut response.body),
    })
}

/// A page request. Construct, optionally add cookies and headers, then `call()` or one of
/// `get`, `post`, `head`. Redirects (301/302) are followed manually with cookies carried over.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    url: String,
    referer: Option<Url>,
    method: String,
    params: Vec<(String, String)>,
    user: Option<String>,
    password: Option<String>,
    cookies: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    response_code: u16,
    ret_val: Option<Body>,
    page_src: Option<String>,
    encoding: Option<String>,
}

impl HttpRequest {
    /// GET request for `url` with no parameters.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_method(url, None, "GET", Vec::new())
    }

    /// `url` is resolved against `referer` when given. `method` is checked at call time.
    pub fn with_method(
        url: impl Into<String>,
        referer: Option<Url>,
        method: impl Into<String>,
        params: Vec<(String, String)>,
    ) -> Self {
        Self {
            url: url.into(),
            referer,
            method: method.into(),
            params,
            user: None,
            password: None,
            cookies: Vec::new(),
            headers: Vec::new(),
            response_code: 0,
            ret_val: None,
            page_src: None,
            encoding: None,
        }
    }

    /// As `with_method`, sending basic auth credentials.
    pub fn with_credentials(
        url: impl Into<String>,
        referer: Option<Url>,
        method: impl Into<String>,
        params: Vec<(String, String)>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut r = Self::with_method(url, referer, method, params);
        r.user = Some(user.into());
        r.password = Some(password.into());
        r
    }

    pub fn add_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.push((name.into(), value.into()));
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Replace the cookies. Accepts a list of pairs or a map.
    pub fn set_cookies<I, K, V>(&mut self, cookies: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.cookies = cookies.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
    }

    /// Replace the custom headers. Accepts a list of pairs or a map.
    pub fn set_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = headers.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
    }

    /// Current URL; after a followed redirect, the final one.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn response_code(&self) -> u16 {
        self.response_code
    }

    /// Last body fetched by `get` or `post`.
    pub fn body(&self) -> Option<&Body> {
        self.ret_val.as_ref()
    }

    /// Run the request named by the method given at construction.
    pub async fn call(&mut self) -> Result<CallResult, HttpError> {
        let method: Method = self
            .method
            .parse()
            .map_err(|_| HttpError::UnknownMethod(self.method.clone()))?;
        match method {
            Method::Post => self.post().await.map(|b| CallResult::Body(b.clone())),
            Method::Get => self.get().await.map(|b| CallResult::Body(b.clone())),
            Method::Head => self.head().await.map(CallResult::Code),
        }
    }

    fn query_string(&self) -> String {
        urlencode::encode_params(&self.params, Charset::Latin1)
    }

    fn target_with_params(&self) -> Result<Url, HttpError> {
        let mut full = self.url.clone();
        if !self.params.is_empty() {
            if !self.url.contains('?') {
                full.push('?');
            }
            full.push_str(&self.query_string());
        }
        parse_url(&full, self.referer.as_ref())
    }

    fn base_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("User-Agent".to_string(), USER_AGENT.to_string())];
        if let (Some(user), Some(password)) = (&self.user, &self.password) {
            let credentials = format!("{}:{}", user, password);
            headers.push((
                "Authorization".to_string(),
                format!("Basic {}", STANDARD.encode(credentials.as_bytes())),
            ));
        }
        headers
    }

    fn with_custom_and_cookies(&self, mut headers: Vec<(String, String)>) -> Vec<(String, String)> {
        headers.extend(self.headers.iter().cloned());
        if !self.cookies.is_empty() {
            headers.push(("Cookie".to_string(), cookies::format_cookie_header(&self.cookies)));
        }
        headers
    }

    fn read_response_cookies(&mut self, set_cookies: &[String]) {
        let now = Utc::now();
        for value in set_cookies {
            if let Some(pair) = cookies::parse_set_cookie(value, now) {
                self.cookies.push(pair);
            }
        }
    }

    fn reset_result(&mut self) {
        self.ret_val = None;
        self.page_src = None;
        self.encoding = None;
    }

    /// Follow a redirect with a fresh GET against `location`, carrying the cookies.
    /// The continuation sends no parameters, credentials or custom headers.
    async fn follow_get(&mut self, from: Url, location: String) -> Result<(), HttpError> {
        let mut url = location;
        let mut base = from;
        for _ in 0..MAX_REDIRECTS {
            let target = parse_url(&url, Some(&base))?;
            let mut headers = vec![("User-Agent".to_string(), USER_AGENT.to_string())];
            if !self.cookies.is_empty() {
                headers.push(("Cookie".to_string(), cookies::format_cookie_header(&self.cookies)));
            }
            let ex = exchange(&target, Method::Get, headers, None).await?;
            self.response_code = ex.code;
            match ex.location.clone() {
                Some(next) if ex.is_redirect() && next != url => {
                    tracing::debug!(from = %target, to = %next, code = ex.code, "redirect");
                    self.read_response_cookies(&ex.set_cookies);
                    url = next;
                    base = target;
                }
                _ => {
                    self.url = url;
                    return self.accept_body(ex);
                }
            }
        }
        Err(HttpError::TooManyRedirects(self.url.clone()))
    }

    fn accept_body(&mut self, ex: Exchange) -> Result<(), HttpError> {
        self.read_response_cookies(&ex.set_cookies);
        let code = ex.code;
        let accepted = ex.is_accepted();
        let (body, encoding) = ex.into_body();
        self.encoding = encoding;
        self.ret_val = Some(body);
        if accepted {
            Ok(())
        } else {
            Err(HttpError::Status(code))
        }
    }

    /// GET the URL, with parameters appended to the query.
    pub async fn get(&mut self) -> Result<&Body, HttpError> {
        self.reset_result();
        let target = self.target_with_params()?;
        let headers = self.with_custom_and_cookies(self.base_headers());
        let ex = exchange(&target, Method::Get, headers, None).await?;
        self.response_code = ex.code;
        match ex.location.clone() {
            Some(location) if ex.is_redirect() && location != self.url => {
                tracing::debug!(from = %target, to = %location, code = ex.code, "redirect");
                self.read_response_cookies(&ex.set_cookies);
                self.follow_get(target, location).await?;
            }
            _ => self.accept_body(ex)?,
        }
        self.ret_val
            .as_ref()
            .ok_or_else(|| HttpError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "no body")))
    }

    /// POST the parameters as a form body. A redirect is continued as a GET.
    pub async fn post(&mut self) -> Result<&Body, HttpError> {
        self.reset_result();
        let target = parse_url(&self.url, self.referer.as_ref())?;
        let form = self.query_string().into_bytes();
        let mut headers = self.base_headers();
        headers.push((
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ));
        headers.push(("Content-Length".to_string(), form.len().to_string()));
        let headers = self.with_custom_and_cookies(headers);
        let ex = exchange(&target, Method::Post, headers, Some(form)).await?;
        self.response_code = ex.code;
        match ex.location.clone() {
            Some(location) if ex.is_redirect() && location != self.url => {
                tracing::debug!(from = %target, to = %location, code = ex.code, "redirect after POST");
                self.read_response_cookies(&ex.set_cookies);
                self.follow_get(target, location).await?;
            }
            _ if ex.is_accepted() => {
                self.read_response_cookies(&ex.set_cookies);
                // POST keeps no encoding for src()
                let (body, _) = ex.into_body();
                self.ret_val = Some(body);
            }
            _ => return Err(HttpError::Status(ex.code)),
        }
        self.ret_val
            .as_ref()
            .ok_or_else(|| HttpError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "no body")))
    }

    /// HEAD the URL and return the status code of the first response.
    /// Redirects are followed with HEAD to learn the final URL.
    pub async fn head(&mut self) -> Result<u16, HttpError> {
        self.reset_result();
        let target = self.target_with_params()?;
        let mut headers = self.base_headers();
        headers.extend(self.headers.iter().cloned());
        let ex = exchange(&target, Method::Head, headers, None).await?;
        self.response_code = ex.code;
        let first_code = ex.code;

        let mut next = ex.location.filter(|_| first_code == 301 || first_code == 302);
        let mut base = target;
        let mut hops = 0;
        while let Some(location) = next.take() {
            hops += 1;
            if hops > MAX_REDIRECTS {
                return Err(HttpError::TooManyRedirects(self.url.clone()));
            }
            let moved = parse_url(&location, Some(&base))?;
            let headers = vec![("User-Agent".to_string(), USER_AGENT.to_string())];
            let ex = exchange(&moved, Method::Head, headers, None).await?;
            self.url = location;
            if ex.is_redirect() {
                next = ex.location;
            }
            base = moved;
        }
        Ok(first_code)
    }

    /// Page source. Fetches with `get()` when nothing has been retrieved.
    /// Byte bodies are decoded with the charset the page declares, US-ASCII otherwise.
    pub async fn src(&mut self) -> Result<Option<&str>, HttpError> {
        if self.page_src.is_none() {
            if self.ret_val.is_none() {
                self.get().await?;
            }
            match &self.ret_val {
                Some(Body::Bytes(bytes)) => {
                    let first = match &self.encoding {
                        Some(label) => decode_with_label(bytes, label),
                        None => Charset::UsAscii.decode(bytes),
                    };
                    match page::sniff_charset(&first) {
                        Some(declared) => {
                            self.page_src = Some(decode_with_label(bytes, &declared));
                            self.encoding = Some(declared);
                        }
                        None => {
                            if self.encoding.is_none() {
                                self.encoding = Some(Charset::UsAscii.name().to_string());
                            }
                            self.page_src = Some(first);
                        }
                    }
                }
                Some(Body::Text(text)) => {
                    self.page_src = Some(text.clone());
                    self.encoding = Some("UTF8".to_string());
                }
                None => {}
            }
        }
        Ok(self.page_src.as_deref())
    }

    /// Encoding of the page source, resolved by `src()`.
    pub async fn encoding(&mut self) -> Result<Option<&str>, HttpError> {
        self.src().await?;
        Ok(self.encoding.as_deref())
    }

    /// Decoded `<title>` text.
    pub async fn title(&mut self) -> Result<Option<String>, HttpError> {
        Ok(self.src().await?.and_then(page::extract_title))
    }

    /// Two-letter page language: declared in markup, or guessed from the visible text.
    pub async fn language(&mut self) -> Result<Option<String>, HttpError> {
        let Some(src) = self.src().await? else {
            return Ok(None);
        };
        if let Some(lang) = page::declared_language(src) {
            return Ok(Some(lang));
        }
        let guessed = if src.to_ascii_lowercase().contains("<html") {
            language::guess_language(&html_text::extract_text(src))
        } else {
            language::guess_language(src)
        };
        Ok(guessed.map(str::to_string))
    }
}
