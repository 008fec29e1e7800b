//! Generator module.
//! `Generator::new()` is the capability-free base: an empty field set.
//! `compose` folds capabilities over a generator left to right; each step layers
//! that capability's fields on top, so the last writer of a key wins.
//! Rendering produces Layui form markup plus the script the interactive fields need.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::capability::Capability;
use crate::field::{FieldDescriptor, FieldKind, FieldSet};
use crate::payload::{self, FieldViolation};

/// Markup and client script for one site's configuration form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RenderedForm {
    pub html: String,
    pub js: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Generator {
    fields: FieldSet,
}

/// Applies `capabilities` to `base` in order.
pub fn compose(base: Generator, capabilities: &[Capability]) -> Generator {
    capabilities
        .iter()
        .fold(base, |generator, capability| capability.apply(generator))
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field: FieldDescriptor) {
        self.fields.insert(field);
    }

    pub fn remove_field(&mut self, key: &str) {
        self.fields.remove(key);
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn render(&self) -> RenderedForm {
        RenderedForm {
            html: self.html(),
            js: self.js(),
        }
    }

    pub fn html(&self) -> String {
        let mut html = String::new();
        for field in &self.fields {
            render_field(&mut html, field);
        }
        html
    }

    /// Empty when no field needs client-side behaviour.
    pub fn js(&self) -> String {
        let lists: Vec<&FieldDescriptor> = self
            .fields
            .iter()
            .filter(|field| field.kind.is_interactive())
            .collect();
        if lists.is_empty() {
            return String::new();
        }

        let mut js = String::from("layui.use(['jquery'], function () {\n    let $ = layui.$;\n");
        for field in lists {
            let id = dom_id(field.key);
            let _ = write!(
                js,
                "    $('[data-url-list-add=\"{id}\"]').on('click', function () {{\n        \
                 $(this).before('{row}');\n    }});\n",
                row = url_list_row(field, "", true).replace('\'', "\\'"),
            );
        }
        js.push_str(
            "    $(document).on('click', '[data-url-list-remove]', function () {\n        \
             $(this).parent().remove();\n    });\n});\n",
        );
        js
    }

    pub fn validate(&self, payload: &Map<String, Value>) -> Result<(), Vec<FieldViolation>> {
        payload::validate(&self.fields, payload)
    }

    pub fn default_payload(&self) -> Map<String, Value> {
        payload::defaults(&self.fields)
    }
}

// *************** Markup helpers ***************

fn render_field(out: &mut String, field: &FieldDescriptor) {
    let required_class = if field.required { " required" } else { "" };
    let _ = writeln!(out, "<div class=\"layui-form-item\">");
    let _ = writeln!(
        out,
        "    <label class=\"layui-form-label{required_class}\">{}</label>",
        escape(field.label)
    );
    match field.kind {
        FieldKind::UrlList => {
            let id = dom_id(field.key);
            let _ = writeln!(out, "    <div class=\"layui-input-block\" id=\"{id}\">");
            for value in field.default.unwrap_or("").lines().filter(|v| !v.is_empty()) {
                let _ = writeln!(out, "        {}", url_list_row(field, value, true));
            }
            let _ = writeln!(out, "        {}", url_list_row(field, "", false));
            let _ = writeln!(
                out,
                "        <button type=\"button\" class=\"layui-btn layui-btn-sm\" data-url-list-add=\"{id}\">+</button>"
            );
            let _ = writeln!(out, "    </div>");
        }
        _ => {
            let _ = writeln!(out, "    <div class=\"layui-input-block\">");
            let _ = writeln!(out, "        {}", input_tag(field));
            let _ = writeln!(out, "    </div>");
        }
    }
    let _ = writeln!(out, "</div>");
}

fn input_tag(field: &FieldDescriptor) -> String {
    let mut tag = format!(
        "<input type=\"{}\" name=\"{}\" value=\"{}\"",
        field.kind.input_type(),
        escape(field.key),
        escape(field.default.unwrap_or("")),
    );
    if let FieldKind::Number { min, max } = field.kind {
        let _ = write!(tag, " min=\"{min}\" max=\"{max}\"");
    }
    let verify = match (field.required, field.kind) {
        (true, FieldKind::Number { .. }) => "required|number",
        (true, _) => "required",
        (false, FieldKind::Number { .. }) => "number",
        (false, _) => "",
    };
    if !verify.is_empty() {
        let _ = write!(tag, " lay-verify=\"{verify}\"");
    }
    let _ = write!(
        tag,
        " placeholder=\"{}\" autocomplete=\"off\" class=\"layui-input\">",
        escape(field.help)
    );
    tag
}

/// One URL input inside a list; `removable` rows get a delete button.
fn url_list_row(field: &FieldDescriptor, value: &str, removable: bool) -> String {
    let mut row = format!(
        "<div class=\"url-list-row\"><input type=\"url\" name=\"{}[]\" value=\"{}\" placeholder=\"{}\" autocomplete=\"off\" class=\"layui-input\">",
        escape(field.key),
        escape(value),
        escape(field.help),
    );
    if removable {
        row.push_str(
            "<button type=\"button\" class=\"layui-btn layui-btn-danger layui-btn-sm\" data-url-list-remove>-</button>",
        );
    }
    row.push_str("</div>");
    row
}

/// `options[url_join]` -> `options-url-join`
fn dom_id(key: &str) -> String {
    let mut id = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_lowercase());
        } else if !id.is_empty() && !id.ends_with('-') {
            id.push('-');
        }
    }
    while id.ends_with('-') {
        id.pop();
    }
    id
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(generator: &Generator) -> Vec<&'static str> {
        generator.fields().keys().collect()
    }

    #[test]
    fn test_base_generator_is_empty() {
        let base = Generator::new();
        assert!(base.fields().is_empty());
        assert_eq!(base.render(), RenderedForm::default());
    }

    #[test]
    fn test_collision_follows_application_order() {
        let nexus_label = FieldDescriptor::url("base_url", "Nexus URL");
        let music_label = FieldDescriptor::url("base_url", "Music URL").required();

        let mut a_then_b = Generator::new();
        a_then_b.add_field(nexus_label.clone());
        a_then_b.add_field(music_label.clone());
        assert_eq!(a_then_b.fields().get("base_url"), Some(&music_label));

        let mut b_then_a = Generator::new();
        b_then_a.add_field(music_label);
        b_then_a.add_field(nexus_label.clone());
        assert_eq!(b_then_a.fields().get("base_url"), Some(&nexus_label));
    }

    #[test]
    fn test_compose_collision_between_protocol_families() {
        let nexus_then_music = compose(Generator::new(), &[Capability::NexusPhp, Capability::DicMusic]);
        let music_then_nexus = compose(Generator::new(), &[Capability::DicMusic, Capability::NexusPhp]);

        let nexus_base_url = Capability::NexusPhp.fields().into_iter().find(|f| f.key == "base_url");
        let music_base_url = Capability::DicMusic.fields().into_iter().find(|f| f.key == "base_url");

        assert_eq!(nexus_then_music.fields().get("base_url"), music_base_url.as_ref());
        assert_eq!(music_then_nexus.fields().get("base_url"), nexus_base_url.as_ref());
        // The later family drops the earlier one's credentials; shared keys keep their slot.
        assert_eq!(
            keys(&nexus_then_music),
            vec!["base_url", "options[authkey]", "options[torrent_pass]"]
        );
        assert_eq!(keys(&music_then_nexus), vec!["base_url", "options[passkey]"]);
    }

    #[test]
    fn test_compose_is_idempotent() {
        let list = [Capability::NexusPhp, Capability::Uid, Capability::Limit, Capability::UrlJoin];
        let once = compose(Generator::new(), &list);
        let twice = compose(compose(Generator::new(), &list), &list);
        assert_eq!(once, twice);
        assert_eq!(once.render(), twice.render());
    }

    #[test]
    fn test_html_renders_fields_in_insertion_order() {
        let generator = compose(Generator::new(), &[Capability::CookieRequired, Capability::Limit]);
        let html = generator.html();
        let cookie = html.find("name=\"cookie\"").unwrap();
        let count = html.find("name=\"options[limit][count]\"").unwrap();
        let sleep = html.find("name=\"options[limit][sleep]\"").unwrap();
        assert!(cookie < count && count < sleep);
        assert!(html.contains("min=\"1\" max=\"100\""));
        assert!(html.contains("value=\"20\""));
        assert!(html.contains("lay-verify=\"required\""));
        assert!(html.contains("layui-form-label required"));
    }

    #[test]
    fn test_js_only_for_url_lists() {
        let plain = compose(Generator::new(), &[Capability::NexusPhp, Capability::Limit]);
        assert!(plain.js().is_empty());

        let joined = compose(Generator::new(), &[Capability::NexusPhp, Capability::UrlJoin]);
        let js = joined.js();
        assert!(js.contains("data-url-list-add=\"options-url-join\""));
        assert!(js.contains("data-url-list-remove"));
        assert!(joined.html().contains("id=\"options-url-join\""));
        assert!(joined.html().contains("name=\"options[url_join][]\""));
    }

    #[test]
    fn test_dom_id_and_escape() {
        assert_eq!(dom_id("options[limit][count]"), "options-limit-count");
        assert_eq!(dom_id("cookie"), "cookie");
        assert_eq!(escape("a\"<b>&'"), "a&quot;&lt;b&gt;&amp;&#39;");
    }
}
