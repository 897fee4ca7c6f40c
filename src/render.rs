//! Server-side HTML for the single analysis page.

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde_json::Value;

use crate::models::PredictionResult;
use crate::upload::{Preview, ACCEPTED_EXTENSIONS};

pub const BEGIN_HINT: &str = "Upload a fundus image to begin.";
pub const ANNOTATION_MISSING: &str = "Annotated image not available from server.";
pub const MISSING_SERVER_URL: &str = "Please provide a valid server URL in the settings.";

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; display: flex; color: #111827; }
aside { width: 18rem; padding: 1.25rem; background: #f3f4f6; min-height: 100vh; box-sizing: border-box; }
aside input[type=text] { width: 100%; box-sizing: border-box; padding: .4rem; }
main { flex: 1; max-width: 56rem; padding: 1.5rem 2rem; }
.card { padding: 1rem 1.25rem; border: 1px solid #d1d5db; border-radius: 12px; background: #fafafa; display: flex; justify-content: space-between; gap: 1rem; }
.badge { display: inline-block; padding: .35rem .65rem; border-radius: 999px; font-weight: 600; font-size: .9rem; }
.badge-affirmative { background: #dcfce7; color: #166534; }
.badge-caution { background: #fef3c7; color: #92400e; }
.badge-alert { background: #fee2e2; color: #991b1b; }
.metric-label { color: #6b7280; font-size: .85rem; }
.metric-value { font-size: 2rem; font-weight: 600; }
.columns { display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; }
.columns img { width: 100%; border-radius: 8px; }
.notice { padding: .75rem 1rem; border-radius: 8px; white-space: pre-wrap; }
.notice-info { background: #e0f2fe; color: #075985; }
.notice-error { background: #fee2e2; color: #991b1b; }
.notice-warning { background: #fef3c7; color: #92400e; }
.subtle { color: #6b7280; }
pre { background: #f9fafb; padding: 1rem; overflow-x: auto; }
"#;

/// What the main area shows below the upload form.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Outcome {
    #[default]
    Idle,
    Error(String),
    Result(PredictionResult),
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub server_url: String,
    /// Set when predictions cannot work at all in this process.
    pub client_warning: Option<String>,
    pub preview: Option<Preview>,
    pub outcome: Outcome,
}

impl Page {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    pub fn render(&self) -> String {
        let mut html = String::with_capacity(4096);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        html.push_str("<title>Glaucoma Agent</title>\n<style>");
        html.push_str(STYLE);
        html.push_str("</style>\n</head>\n<body>\n");

        self.render_sidebar(&mut html);

        html.push_str("<main>\n<h1>Glaucoma Agent</h1>\n");
        html.push_str(
            "<p class=\"subtle\">Upload a retinal fundus image to receive an automated analysis, \
             including CDR and an annotated visualization.</p>\n",
        );
        self.render_upload_form(&mut html);

        if let Some(preview) = &self.preview {
            html.push_str(&format!(
                "<section class=\"columns\"><div><h3>Original image</h3>{}</div></section>\n",
                figure(&preview.data_url, &preview.caption)
            ));
        }

        match &self.outcome {
            Outcome::Idle if self.preview.is_none() => {
                html.push_str(&notice("info", BEGIN_HINT));
            }
            Outcome::Idle => {}
            Outcome::Error(message) => html.push_str(&notice("error", message)),
            Outcome::Result(result) => self.render_result(&mut html, result),
        }

        if let Some(warning) = &self.client_warning {
            html.push_str(&notice("warning", warning));
        }

        html.push_str("</main>\n</body>\n</html>\n");
        html
    }

    fn render_sidebar(&self, html: &mut String) {
        html.push_str(&format!(
            "<aside>\n<h2>Settings</h2>\n\
             <form method=\"post\" action=\"/settings\">\n\
             <label for=\"server_url\">Server URL</label>\n\
             <input type=\"text\" id=\"server_url\" name=\"server_url\" value=\"{}\" \
             title=\"Base URL of the backend exposing /predict\">\n\
             <button type=\"submit\">Save</button>\n</form>\n\
             <p class=\"subtle\">The backend must expose POST /predict accepting a form-data file \
             under key 'image' and return JSON with classification, detail, ratio, and \
             annotated_image_url.</p>\n</aside>\n",
            attr(&self.server_url)
        ));
    }

    fn render_upload_form(&self, html: &mut String) {
        let accept = ACCEPTED_EXTENSIONS
            .iter()
            .map(|ext| format!(".{}", ext))
            .collect::<Vec<_>>()
            .join(",");

        // The button only unlocks once the picker holds a file.
        html.push_str(&format!(
            "<form method=\"post\" action=\"/analyze\" enctype=\"multipart/form-data\">\n\
             <label for=\"image\">Upload fundus image</label><br>\n\
             <input type=\"file\" id=\"image\" name=\"image\" accept=\"{}\" \
             onchange=\"document.getElementById('analyze').disabled = !this.files.length\">\n\
             <button type=\"submit\" id=\"analyze\" disabled>Analyze</button>\n\
             <span class=\"subtle\">Accepted formats: PNG, JPG. Typical processing time: a few seconds.</span>\n\
             </form>\n",
            accept
        ));
    }

    fn render_result(&self, html: &mut String, result: &PredictionResult) {
        html.push_str("<h2>Results</h2>\n<div class=\"card\">\n<div>\n");
        html.push_str(&format!(
            "Classification: <span class=\"badge {}\">{}</span>\n",
            result.badge().css_class(),
            text(&result.classification)
        ));
        if let Some(detail) = &result.detail {
            html.push_str(&format!("<p>{}</p>\n", text(detail)));
        }
        html.push_str(&format!(
            "</div>\n<div><div class=\"metric-label\">Cup-to-Disc Ratio</div>\
             <div class=\"metric-value\">{}</div></div>\n</div>\n<hr>\n",
            text(&result.ratio_display())
        ));

        html.push_str("<section class=\"columns\">\n<div><h3>Annotated image</h3>\n");
        match result.annotated_image() {
            Some(url) => html.push_str(&figure(url, "Server-provided annotation")),
            None => html.push_str(&notice("warning", ANNOTATION_MISSING)),
        }
        html.push_str("</div>\n<div><h3>Original image (repeated)</h3>\n");
        if let Some(preview) = &self.preview {
            html.push_str(&figure(&preview.data_url, ""));
        }
        html.push_str("</div>\n</section>\n");

        let raw = serde_json::to_string_pretty(&Value::Object(result.raw.clone()))
            .unwrap_or_else(|_| "{}".to_string());
        html.push_str(&format!(
            "<details>\n<summary>Advanced • Raw response</summary>\n<pre>{}</pre>\n</details>\n",
            text(&raw)
        ));
    }
}

fn figure(src: &str, caption: &str) -> String {
    let mut out = format!("<figure><img src=\"{}\" alt=\"{}\">", attr(src), attr(caption));
    if !caption.is_empty() {
        out.push_str(&format!("<figcaption class=\"subtle\">{}</figcaption>", text(caption)));
    }
    out.push_str("</figure>\n");
    out
}

fn notice(kind: &str, message: &str) -> String {
    format!(
        "<div class=\"notice notice-{}\" role=\"status\">{}</div>\n",
        kind,
        text(message)
    )
}
