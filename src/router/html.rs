//! HTML pages served by the router

use std::fmt::Write;

use crate::directory::CameraGroup;

/// Escape text for HTML element content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `topic=<name>` query string, percent-encoded
pub fn topic_query(topic: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("topic", topic)
        .finish()
}

/// Discovery page listing each camera and its image topics
pub fn topic_list_page(groups: &[CameraGroup]) -> String {
    let mut page = String::from(
        "<html><head><title>Image Topic List</title></head>\
         <body><h1>Available Image Topics:</h1><ul>",
    );

    for group in groups {
        let _ = write!(page, "<li>{}<ul>", escape(&group.base));
        for (topic, label) in group.children() {
            let query = escape(&topic_query(topic));
            let _ = write!(
                page,
                "<li><a href=\"/stream_viewer?{query}\">{label}</a> \
                 (<a href=\"/snapshot?{query}\">Snapshot</a>)</li>",
                label = escape(label),
            );
        }
        page.push_str("</ul></li>");
    }

    page.push_str("</ul></body></html>");
    page
}

/// Viewer page titled with `topic`, embedding a codec's player fragment
pub fn viewer_page(topic: &str, fragment: &str) -> String {
    let topic = escape(topic);
    format!("<html><head><title>{topic}</title></head><body><h1>{topic}</h1>{fragment}</body></html>")
}
