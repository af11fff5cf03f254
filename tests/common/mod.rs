//! Shared fixtures: in-memory `.docx` documents and a fake Kroki server.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use zip::write::SimpleFileOptions;

// ── .docx fixtures ───────────────────────────────────────────────────────────

/// Builds a minimal WordprocessingML document.
#[derive(Debug, Default, Clone)]
pub struct DocxBuilder {
    body: String,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heading(mut self, level: u8, text: &str) -> Self {
        self.body.push_str(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading{level}"/></w:pPr><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            escape(text)
        ));
        self
    }

    pub fn paragraph(mut self, text: &str) -> Self {
        self.body.push_str(&format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            escape(text)
        ));
        self
    }

    /// A table; a cell text of `"<span N>text"` becomes a `gridSpan` cell.
    pub fn table(mut self, rows: &[&[&str]]) -> Self {
        self.body.push_str("<w:tbl>");
        for row in rows {
            self.body.push_str("<w:tr>");
            for cell in *row {
                let (props, text) = match cell.strip_prefix("<span ").and_then(|r| r.split_once('>')) {
                    Some((n, text)) => (format!(r#"<w:tcPr><w:gridSpan w:val="{n}"/></w:tcPr>"#), text),
                    None => (String::new(), *cell),
                };
                self.body.push_str(&format!(
                    r#"<w:tc>{props}<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:tc>"#,
                    escape(text)
                ));
            }
            self.body.push_str("</w:tr>");
        }
        self.body.push_str("</w:tbl>");
        self
    }

    /// Heading, role and a two-step table for `key`.
    ///
    /// Step 1 "nein" ends with A01, step 2 with A02 or "Ende".
    pub fn two_step_ebd(self, key: &str, name: &str) -> Self {
        self.heading(3, &format!("{key}_{name}")).table(&[
            &["<span 6>Prüfende Rolle: NB"],
            &["Nr.", "Prüfschritt", "Prüfergebnis", "Prüfergebnis", "Code", "Hinweis"],
            &["1", "Ist die Marktlokation bekannt?", "ja", "2", "", ""],
            &["1", "Ist die Marktlokation bekannt?", "nein", "Ende", "A01", "Marktlokation unbekannt"],
            &["2", "Liegt der Termin in der Zukunft?", "ja", "Ende", "", ""],
            &["2", "Liegt der Termin in der Zukunft?", "nein", "Ende", "A02", "Termin liegt in der Vergangenheit"],
        ])
    }

    /// An EBD whose step 1 points at a step that does not exist.
    pub fn dangling_ebd(self, key: &str) -> Self {
        self.heading(3, &format!("{key}_Verweis ins Leere")).table(&[
            &["<span 6>Prüfende Rolle: LF"],
            &["Nr.", "Prüfschritt", "Prüfergebnis", "Prüfergebnis", "Code", "Hinweis"],
            &["1", "Ist der Vorgang bekannt?", "ja", "7", "", ""],
            &["1", "Ist der Vorgang bekannt?", "nein", "Ende", "A01", ""],
        ])
    }

    /// An EBD whose step 1 has a "ja" row but no "nein" row.
    pub fn single_answer_ebd(self, key: &str) -> Self {
        self.heading(3, &format!("{key}_Halbe Antwort")).table(&[
            &["<span 6>Prüfende Rolle: NB"],
            &["Nr.", "Prüfschritt", "Prüfergebnis", "Prüfergebnis", "Code", "Hinweis"],
            &["1", "Ist der Vorgang bekannt?", "ja", "Ende", "", ""],
        ])
    }

    /// An EBD section that only refers to another EBD.
    pub fn reference_only(self, key: &str, target: &str) -> Self {
        self.heading(3, &format!("{key}_Verweis"))
            .paragraph(&format!("Es ist das EBD {target} zu nutzen."))
    }

    pub fn document_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            self.body
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(self.document_xml().as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A document with one chapter holding two convertible EBDs and a reference.
pub fn sample_document() -> DocxBuilder {
    DocxBuilder::new()
        .heading(1, "GPKE")
        .heading(2, "Lieferbeginn")
        .two_step_ebd("E_0001", "Anmeldung prüfen")
        .reference_only("E_0002", "E_0001")
        .two_step_ebd("E_0003", "Abmeldung prüfen")
}

// ── Fake Kroki ───────────────────────────────────────────────────────────────

/// One request received by [`FakeKroki`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// A local HTTP server answering every request with a fixed response.
pub struct FakeKroki {
    pub port: u16,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeKroki {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub const FAKE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><text>ok</text></svg>"#;

/// Start a server that answers `status` with `body`.
pub async fn spawn_fake_kroki(status: u16, body: &'static str) -> FakeKroki {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let recorded = Arc::clone(&recorded);
            tokio::spawn(async move {
                if let Some(request) = read_request(&mut socket).await {
                    recorded.lock().unwrap().push(request);
                }
                let reason = if status < 400 { "OK" } else { "Bad Request" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: image/svg+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    FakeKroki { port, requests }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let path = lines.next()?.split_whitespace().nth(1)?.to_string();
    let mut content_length = 0usize;
    let mut content_type = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "content-type" => content_type = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..end]).into_owned();

    Some(RecordedRequest {
        path,
        content_type,
        body,
    })
}
