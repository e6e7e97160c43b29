//! Test doubles shared by the adapter, fetcher and pipeline tests.

use std::io::{Cursor, Write};

use parking_lot::Mutex;
use posrank_core::error::RankError;

use crate::http_helper::{HttpResponse, HttpTransport};

type Handler = Box<dyn Fn(&str) -> Result<HttpResponse, RankError> + Send + Sync>;

/// Answers every request from a closure and records what was asked.
///
/// GET requests are keyed by URL; form POSTs by `url?k=v&k=v` in form order.
pub struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&str) -> Result<HttpResponse, RankError> + Send + Sync + 'static) -> Self {
        Self { handler: Box::new(handler), requests: Mutex::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn answer(&self, key: String) -> Result<HttpResponse, RankError> {
        let resp = (self.handler)(&key);
        self.requests.lock().push(key);
        resp
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse, RankError> {
        self.answer(url.to_string())
    }

    fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<HttpResponse, RankError> {
        let query: Vec<String> = form.iter().map(|(k, v)| format!("{k}={v}")).collect();
        self.answer(format!("{url}?{}", query.join("&")))
    }
}

/// In-memory zip of `(name, body)` files, stored uncompressed so the archive
/// size tracks the content size.
pub fn zip_bytes(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
