// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DOCX reading and writing.
//
// Reading walks `word/document.xml` with quick-xml and produces both plain
// text and an HTML rendering (headings, run emphasis, lists, tables, breaks,
// inline images as data URIs). Writing produces one paragraph per text line
// through docx-rs; formatting is not reconstructed.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use docx_rs::{Docx, Paragraph, Run};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, instrument, warn};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::Format;
use zip::ZipArchive;

use super::ir::ExtractedAsset;
use super::markup::escape_html;

/// Characters per page for the DOCX page estimate.
pub const CHARS_PER_PAGE: usize = 2000;

/// Everything read out of one DOCX package.
#[derive(Debug, Default)]
pub struct DocxContent {
    pub text: String,
    pub html: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub media: Vec<ExtractedAsset>,
}

/// `ceil(chars / 2000)`, never less than one page.
pub fn estimate_pages(text: &str) -> u32 {
    let chars = text.chars().count();
    chars.div_ceil(CHARS_PER_PAGE).max(1) as u32
}

/// Reads an in-memory DOCX package.
pub struct DocxReader {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl DocxReader {
    // -- Construction ---------------------------------------------------------

    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data)).map_err(|err| {
            WandelError::DocxError(format!("failed to open DOCX package: {}", err))
        })?;
        debug!(entries = archive.len(), "DOCX package opened");
        Ok(Self { archive })
    }

    // -- Extraction -----------------------------------------------------------

    /// Read the package. `with_html` controls the HTML rendering,
    /// `with_media` whether `word/media/*` parts are returned as assets.
    #[instrument(skip(self))]
    pub fn read(&mut self, with_html: bool, with_media: bool) -> Result<DocxContent> {
        let document_xml = self
            .read_part("word/document.xml")?
            .ok_or_else(|| WandelError::DocxError("missing word/document.xml".into()))?;

        let media = if with_html || with_media {
            self.media_parts()?
        } else {
            HashMap::new()
        };
        let relationships = if with_html {
            self.relationships()?
        } else {
            HashMap::new()
        };
        let ordered_lists = if with_html {
            self.ordered_numbering()?
        } else {
            HashSet::new()
        };

        let mut walker = BodyWalker::new(with_html, &relationships, &media, &ordered_lists);
        walker.walk(&document_xml)?;
        let (text, html) = walker.finish();

        let (title, author) = self.core_properties()?;

        let media = if with_media {
            media_assets(media)
        } else {
            Vec::new()
        };

        debug!(
            chars = text.len(),
            html = html.is_some(),
            media = media.len(),
            "DOCX read complete"
        );

        Ok(DocxContent {
            text,
            html,
            title,
            author,
            media,
        })
    }

    /// Read a part as UTF-8; `None` if the part does not exist.
    fn read_part(&mut self, name: &str) -> Result<Option<String>> {
        let Ok(mut part) = self.archive.by_name(name) else {
            return Ok(None);
        };
        let mut content = String::new();
        part.read_to_string(&mut content).map_err(|err| {
            WandelError::DocxError(format!("failed to read {}: {}", name, err))
        })?;
        Ok(Some(content))
    }

    /// All `word/media/*` parts keyed by their package path.
    fn media_parts(&mut self) -> Result<HashMap<String, Vec<u8>>> {
        let names: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| name.starts_with("word/media/"))
            .map(String::from)
            .collect();

        let mut media = HashMap::new();
        for name in names {
            let mut part = self.archive.by_name(&name).map_err(|err| {
                WandelError::DocxError(format!("failed to open {}: {}", name, err))
            })?;
            let mut bytes = Vec::new();
            part.read_to_end(&mut bytes).map_err(|err| {
                WandelError::DocxError(format!("failed to read {}: {}", name, err))
            })?;
            media.insert(name, bytes);
        }
        Ok(media)
    }

    /// Relationship id → package path, from `word/_rels/document.xml.rels`.
    fn relationships(&mut self) -> Result<HashMap<String, String>> {
        let Some(xml) = self.read_part("word/_rels/document.xml.rels")? else {
            return Ok(HashMap::new());
        };

        let mut relationships = HashMap::new();
        let mut reader = Reader::from_str(&xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"Relationship" => {
                    if let (Some(id), Some(target)) = (get_attr(&e, b"Id"), get_attr(&e, b"Target"))
                    {
                        relationships.insert(id, resolve_target(&target));
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => {
                    return Err(WandelError::DocxError(format!(
                        "failed to parse relationships: {}",
                        err
                    )));
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(relationships)
    }

    /// numIds whose first level is numbered rather than bulleted.
    fn ordered_numbering(&mut self) -> Result<HashSet<String>> {
        let Some(xml) = self.read_part("word/numbering.xml")? else {
            return Ok(HashSet::new());
        };

        let mut abstract_formats: HashMap<String, String> = HashMap::new();
        let mut num_to_abstract: HashMap<String, String> = HashMap::new();
        let mut current_abstract: Option<String> = None;
        let mut current_num: Option<String> = None;
        let mut in_first_level = false;

        let mut reader = Reader::from_str(&xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"w:abstractNum" => current_abstract = get_attr(&e, b"w:abstractNumId"),
                    b"w:lvl" => in_first_level = get_attr(&e, b"w:ilvl").as_deref() == Some("0"),
                    b"w:num" => current_num = get_attr(&e, b"w:numId"),
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"w:numFmt" if in_first_level => {
                        if let (Some(id), Some(fmt)) = (&current_abstract, get_attr(&e, b"w:val")) {
                            abstract_formats.insert(id.clone(), fmt);
                        }
                    }
                    b"w:abstractNumId" => {
                        if let (Some(num), Some(id)) = (&current_num, get_attr(&e, b"w:val")) {
                            num_to_abstract.insert(num.clone(), id);
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"w:abstractNum" => current_abstract = None,
                    b"w:lvl" => in_first_level = false,
                    b"w:num" => current_num = None,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(err) => {
                    warn!(%err, "numbering.xml unreadable; lists default to bullets");
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(num_to_abstract
            .into_iter()
            .filter(|(_, abstract_id)| {
                abstract_formats
                    .get(abstract_id)
                    .is_some_and(|fmt| fmt != "bullet" && fmt != "none")
            })
            .map(|(num, _)| num)
            .collect())
    }

    /// Title and author from `docProps/core.xml`. A malformed part is ignored.
    fn core_properties(&mut self) -> Result<(Option<String>, Option<String>)> {
        let Some(xml) = self.read_part("docProps/core.xml")? else {
            return Ok((None, None));
        };

        let mut title = None;
        let mut author = None;
        let mut current: Option<&'static str> = None;

        let mut reader = Reader::from_str(&xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    current = match e.name().as_ref() {
                        b"dc:title" => Some("title"),
                        b"dc:creator" => Some("creator"),
                        _ => None,
                    };
                }
                Ok(Event::Text(e)) => {
                    if let (Some(field), Ok(value)) = (current, e.unescape()) {
                        let value = value.trim().to_string();
                        if !value.is_empty() {
                            match field {
                                "title" => title = Some(value),
                                _ => author = Some(value),
                            }
                        }
                    }
                }
                Ok(Event::End(_)) => current = None,
                Ok(Event::Eof) => break,
                Err(err) => {
                    debug!(%err, "core.xml unreadable; metadata omitted");
                    break;
                }
                _ => {}
            }
            buf.clear();
        }
        Ok((title, author))
    }
}

/// Extract an attribute value by qualified key.
fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .find(|a| a.as_ref().ok().map(|x| x.key.as_ref()) == Some(key))
        .and_then(|a| a.ok())
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Whether a toggle property (`<w:b w:val="0"/>`) is explicitly switched off.
fn toggle_off(e: &BytesStart) -> bool {
    matches!(
        get_attr(e, b"w:val").as_deref(),
        Some("0" | "false" | "none")
    )
}

/// Relationship targets are relative to `word/`.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target.trim_start_matches("./")),
    }
}

/// Heading level for a paragraph style id.
fn heading_level(style: &str) -> Option<u8> {
    if style.eq_ignore_ascii_case("title") {
        return Some(1);
    }
    let lower = style.to_ascii_lowercase();
    let level = lower.strip_prefix("heading")?.trim().parse::<u8>().ok()?;
    (1..=6).contains(&level).then_some(level)
}

// -- Body walker --------------------------------------------------------------

#[derive(Default)]
struct RunState {
    bold: bool,
    italic: bool,
    underline: bool,
    text: String,
}

#[derive(Default)]
struct TableState {
    rows_html: Vec<String>,
    rows_text: Vec<String>,
    cells_html: Vec<String>,
    cells_text: Vec<String>,
    cell_html: String,
    cell_text: String,
}

struct BodyWalker<'a> {
    with_html: bool,
    relationships: &'a HashMap<String, String>,
    media: &'a HashMap<String, Vec<u8>>,
    ordered_lists: &'a HashSet<String>,

    text: String,
    html: String,
    /// `Some(true)` for an open `<ol>`, `Some(false)` for `<ul>`.
    open_list: Option<bool>,

    in_paragraph: bool,
    para_style: Option<String>,
    para_num: Option<String>,
    para_text: String,
    para_html: String,

    run: Option<RunState>,
    in_run_props: bool,
    in_text: bool,

    table_depth: usize,
    table: TableState,
}

impl<'a> BodyWalker<'a> {
    fn new(
        with_html: bool,
        relationships: &'a HashMap<String, String>,
        media: &'a HashMap<String, Vec<u8>>,
        ordered_lists: &'a HashSet<String>,
    ) -> Self {
        Self {
            with_html,
            relationships,
            media,
            ordered_lists,
            text: String::new(),
            html: String::new(),
            open_list: None,
            in_paragraph: false,
            para_style: None,
            para_num: None,
            para_text: String::new(),
            para_html: String::new(),
            run: None,
            in_run_props: false,
            in_text: false,
            table_depth: 0,
            table: TableState::default(),
        }
    }

    fn walk(&mut self, xml: &str) -> Result<()> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => self.on_start(&e),
                Ok(Event::Empty(e)) => {
                    self.on_start(&e);
                    self.on_end(e.name().as_ref());
                }
                Ok(Event::Text(e)) => {
                    if self.in_text {
                        let text = e.unescape().map_err(|err| {
                            WandelError::DocxError(format!("invalid text run: {}", err))
                        })?;
                        if let Some(run) = self.run.as_mut() {
                            run.text.push_str(&text);
                        }
                    }
                }
                Ok(Event::End(e)) => self.on_end(e.name().as_ref()),
                Ok(Event::Eof) => break,
                Err(err) => {
                    return Err(WandelError::DocxError(format!(
                        "failed to parse word/document.xml at {}: {}",
                        reader.buffer_position(),
                        err
                    )));
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn on_start(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"w:p" => {
                self.in_paragraph = true;
                self.para_style = None;
                self.para_num = None;
                self.para_text.clear();
                self.para_html.clear();
            }
            b"w:pStyle" if self.in_paragraph => self.para_style = get_attr(e, b"w:val"),
            b"w:numId" if self.in_paragraph => {
                self.para_num = get_attr(e, b"w:val").filter(|id| id != "0");
            }
            b"w:r" if self.in_paragraph => self.run = Some(RunState::default()),
            b"w:rPr" if self.run.is_some() => self.in_run_props = true,
            b"w:b" | b"w:i" | b"w:u" if self.in_run_props => {
                let on = !toggle_off(e);
                if let Some(run) = self.run.as_mut() {
                    match e.name().as_ref() {
                        b"w:b" => run.bold = on,
                        b"w:i" => run.italic = on,
                        _ => run.underline = on,
                    }
                }
            }
            b"w:t" if self.run.is_some() => self.in_text = true,
            b"w:tab" if self.run.is_some() && !self.in_run_props => {
                if let Some(run) = self.run.as_mut() {
                    run.text.push('\t');
                }
            }
            b"w:br" | b"w:cr" if self.run.is_some() => {
                if let Some(run) = self.run.as_mut() {
                    run.text.push('\n');
                }
            }
            b"a:blip" if self.with_html => {
                if let Some(id) = get_attr(e, b"r:embed") {
                    self.push_image(&id);
                }
            }
            b"w:tbl" => {
                self.close_list();
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.table = TableState::default();
                }
            }
            b"w:tr" if self.table_depth == 1 => {
                self.table.cells_html.clear();
                self.table.cells_text.clear();
            }
            b"w:tc" if self.table_depth == 1 => {
                self.table.cell_html.clear();
                self.table.cell_text.clear();
            }
            _ => {}
        }
    }

    fn on_end(&mut self, name: &[u8]) {
        match name {
            b"w:t" => self.in_text = false,
            b"w:rPr" => self.in_run_props = false,
            b"w:r" => self.flush_run(),
            b"w:p" if self.in_paragraph => self.finish_paragraph(),
            b"w:tc" if self.table_depth == 1 => {
                let html = std::mem::take(&mut self.table.cell_html);
                let text = std::mem::take(&mut self.table.cell_text);
                self.table.cells_html.push(format!("<td>{html}</td>"));
                self.table.cells_text.push(text);
            }
            b"w:tr" if self.table_depth == 1 => {
                let cells_html = std::mem::take(&mut self.table.cells_html);
                let cells_text = std::mem::take(&mut self.table.cells_text);
                self.table
                    .rows_html
                    .push(format!("<tr>{}</tr>", cells_html.concat()));
                self.table.rows_text.push(cells_text.join("\t"));
            }
            b"w:tbl" if self.table_depth > 0 => {
                self.table_depth -= 1;
                if self.table_depth == 0 {
                    let table = std::mem::take(&mut self.table);
                    for row in &table.rows_text {
                        self.text.push_str(row);
                        self.text.push('\n');
                    }
                    if self.with_html {
                        self.html.push_str("<table>\n");
                        for row in &table.rows_html {
                            self.html.push_str(row);
                            self.html.push('\n');
                        }
                        self.html.push_str("</table>\n");
                    }
                }
            }
            _ => {}
        }
    }

    fn flush_run(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        self.in_run_props = false;
        self.in_text = false;
        if run.text.is_empty() {
            return;
        }

        self.para_text.push_str(&run.text);
        if self.with_html {
            let mut html = escape_html(&run.text).replace('\n', "<br>");
            if run.underline {
                html = format!("<u>{html}</u>");
            }
            if run.italic {
                html = format!("<em>{html}</em>");
            }
            if run.bold {
                html = format!("<strong>{html}</strong>");
            }
            self.para_html.push_str(&html);
        }
    }

    fn push_image(&mut self, relationship_id: &str) {
        let Some(path) = self.relationships.get(relationship_id) else {
            return;
        };
        let Some(bytes) = self.media.get(path) else {
            return;
        };
        let mime = path
            .rsplit('.')
            .next()
            .and_then(Format::from_extension)
            .map(|format| format.mime_type())
            .unwrap_or("application/octet-stream");
        self.para_html.push_str(&format!(
            "<img src=\"data:{};base64,{}\" alt=\"\">",
            mime,
            BASE64.encode(bytes)
        ));
    }

    fn finish_paragraph(&mut self) {
        self.flush_run();
        self.in_paragraph = false;
        let text = std::mem::take(&mut self.para_text);
        let html = std::mem::take(&mut self.para_html);

        if self.table_depth > 0 {
            if self.table_depth == 1 {
                if !self.table.cell_text.is_empty() {
                    self.table.cell_text.push(' ');
                    self.table.cell_html.push_str("<br>");
                }
                self.table.cell_text.push_str(&text);
                self.table.cell_html.push_str(&html);
            }
            return;
        }

        self.text.push_str(&text);
        self.text.push('\n');

        if !self.with_html {
            return;
        }

        if let Some(num) = self.para_num.take() {
            let ordered = self.ordered_lists.contains(&num);
            if self.open_list != Some(ordered) {
                self.close_list();
                self.html.push_str(if ordered { "<ol>\n" } else { "<ul>\n" });
                self.open_list = Some(ordered);
            }
            self.html.push_str(&format!("<li>{html}</li>\n"));
            return;
        }

        self.close_list();
        match self.para_style.as_deref().and_then(heading_level) {
            Some(level) => self.html.push_str(&format!("<h{level}>{html}</h{level}>\n")),
            None if !html.is_empty() => self.html.push_str(&format!("<p>{html}</p>\n")),
            None => {}
        }
    }

    fn close_list(&mut self) {
        match self.open_list.take() {
            Some(true) => self.html.push_str("</ol>\n"),
            Some(false) => self.html.push_str("</ul>\n"),
            None => {}
        }
    }

    fn finish(mut self) -> (String, Option<String>) {
        self.close_list();
        let text = self.text.trim_end_matches('\n').to_string();
        let html = self.with_html.then_some(self.html);
        (text, html)
    }
}

// -- Writing ------------------------------------------------------------------

/// Build a DOCX with one paragraph per line of `text`.
#[instrument(skip(text), fields(text_len = text.len()))]
pub fn write_docx(text: &str) -> Result<Vec<u8>> {
    let mut docx = Docx::new();
    for line in text.lines() {
        let paragraph = if line.is_empty() {
            Paragraph::new()
        } else {
            Paragraph::new().add_run(Run::new().add_text(line))
        };
        docx = docx.add_paragraph(paragraph);
    }

    let mut cursor = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut cursor)
        .map_err(|err| WandelError::DocxError(format!("failed to pack DOCX: {}", err)))?;
    Ok(cursor.into_inner())
}

/// Media parts as assets named by their file name, in package-path order.
///
/// A name that is empty, `.`/`..`, or carries a path separator is skipped.
/// A later part whose name is taken gets `stem_<n>.ext` with `n` counting
/// from 2.
fn media_assets(media: HashMap<String, Vec<u8>>) -> Vec<ExtractedAsset> {
    let mut parts: Vec<(String, Vec<u8>)> = media.into_iter().collect();
    parts.sort_by(|a, b| a.0.cmp(&b.0));

    let mut taken: HashSet<String> = HashSet::new();
    let mut assets = Vec::with_capacity(parts.len());
    for (path, bytes) in parts {
        let base = path.rsplit('/').next().unwrap_or_default();
        if base.is_empty() || base == "." || base == ".." || base.contains('\\') {
            warn!(part = %path, "skipping media part with unusable name");
            continue;
        }

        let mut name = base.to_string();
        if taken.contains(&name) {
            let (stem, ext) = match base.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
                _ => (base, None),
            };
            let mut n = 2;
            loop {
                name = match ext {
                    Some(ext) => format!("{stem}_{n}.{ext}"),
                    None => format!("{stem}_{n}"),
                };
                if !taken.contains(&name) {
                    break;
                }
                n += 1;
            }
        }

        taken.insert(name.clone());
        assets.push(ExtractedAsset { name, bytes });
    }
    assets
}
