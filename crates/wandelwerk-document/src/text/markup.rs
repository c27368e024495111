// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Markup transforms between Markdown, HTML, and plain text, plus the HTML
// document shell used for HTML and PDF output.

use pulldown_cmark::{Options, Parser, html};

/// Column width used when flattening HTML to text.
const TEXT_WIDTH: usize = 80;

const BASE_FONTS: &str =
    "-apple-system, BlinkMacSystemFont, \"Segoe UI\", Roboto, \"Helvetica Neue\", Arial, sans-serif";

const CJK_FONTS: &str = "\"Noto Sans CJK SC\", \"Source Han Sans SC\", \"PingFang SC\", \
     \"Microsoft YaHei\", \"WenQuanYi Micro Hei\", \"Hiragino Sans GB\", sans-serif";

/// Render Markdown (CommonMark plus tables, strikethrough, task lists, and
/// footnotes) to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn html_to_markdown(html: &str) -> String {
    html2md::parse_html(html)
}

pub fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), TEXT_WIDTH)
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Plain text as HTML: blank-line separated blocks become paragraphs, single
/// newlines become `<br>`.
pub fn text_to_html(text: &str) -> String {
    let normalised = text.replace("\r\n", "\n");
    normalised
        .split("\n\n")
        .map(|block| block.trim_matches('\n'))
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let lines: Vec<String> = block.lines().map(escape_html).collect();
            format!("<p>{}</p>", lines.join("<br>\n"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Contents of the first `<title>` element, if any.
pub fn html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;
    let title = html[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Whether `html` is already a complete document rather than a fragment.
pub fn is_full_document(html: &str) -> bool {
    let head: String = html
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype") || head.contains("<html")
}

/// Wrap a fragment in a minimal styled HTML document. Full documents pass
/// through untouched unless CJK fonts are requested, in which case the font
/// stack is injected into their `<head>`.
pub fn wrap_document(body: &str, title: Option<&str>, prefer_cjk_fonts: bool) -> String {
    let fonts = if prefer_cjk_fonts {
        format!("{CJK_FONTS}, {BASE_FONTS}")
    } else {
        BASE_FONTS.to_string()
    };

    if is_full_document(body) {
        if !prefer_cjk_fonts {
            return body.to_string();
        }
        let style = format!("<style>body {{ font-family: {fonts}; }}</style>");
        return match body.to_ascii_lowercase().find("</head>") {
            Some(index) => format!("{}{}{}", &body[..index], style, &body[index..]),
            None => format!("{style}{body}"),
        };
    }

    let title = escape_html(title.unwrap_or("Document"));
    format!(
        "<!DOCTYPE html>\n\
         <html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>\n\
         body {{ font-family: {fonts}; line-height: 1.5; color: #222; max-width: 48em; margin: 0 auto; }}\n\
         table {{ border-collapse: collapse; }}\n\
         th, td {{ border: 1px solid #999; padding: 4px 8px; }}\n\
         pre, code {{ font-family: Menlo, Consolas, monospace; background: #f4f4f4; }}\n\
         img {{ max-width: 100%; }}\n\
         </style>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}
