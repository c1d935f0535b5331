use axum_template::TemplateEngine;
use serde::Serialize;
use tera::Tera;

use crate::model::Counts;

/// Template key the widget fragment is registered under.
pub const TEMPLATE: &str = "widget.html";

/// Shown in both placeholders until a strategy has produced numbers.
pub const LOADING: &str = "loading...";
/// Shown when the counting script never published usable counters.
pub const UNKNOWN: &str = "unknown";
/// Shown when the view store chain failed.
pub const UNAVAILABLE: &str = "unavailable";

const WIDGET_TEMPLATE: &str = r#"<div id="view-counter" style="margin: 20px auto; text-align: center; padding: 10px; font-size: 0.9em; color: var(--md-default-fg-color--lighter); border-top: 1px solid var(--md-default-fg-color--lightest);">
  🌐 Site views: <span id="view-count-site">{{ site }}</span> |
  👁️ Page views: <span id="view-count-page">{{ page }}</span>
</div>"#;

pub fn templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE, WIDGET_TEMPLATE)?;
    Ok(tera)
}

/// The footer widget: a single container with the site-total and page-total
/// placeholders, in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Widget {
    site: String,
    page: String,
}

impl Widget {
    pub fn new() -> Widget {
        Widget {
            site: LOADING.to_string(),
            page: LOADING.to_string(),
        }
    }

    pub fn set_counts(&mut self, counts: Counts) {
        self.site = counts.site.to_string();
        self.page = counts.page.to_string();
    }

    /// Overwrites both placeholders with a fixed fallback token.
    pub fn degrade(&mut self, token: &str) {
        self.site = token.to_string();
        self.page = token.to_string();
    }

    pub fn render<E: TemplateEngine>(&self, engine: &E) -> Result<String, E::Error> {
        engine.render(TEMPLATE, self)
    }
}

impl Default for Widget {
    fn default() -> Widget {
        Widget::new()
    }
}

/// Appends the widget fragment as the last child of the page body, keeping
/// everything after `</body>` intact. Pages without a closing body tag get
/// the fragment appended at the end.
pub fn attach(page: &str, fragment: &str) -> String {
    match page.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(page.len() + fragment.len() + 1);
            out.push_str(&page[..at]);
            out.push_str(fragment);
            out.push('\n');
            out.push_str(&page[at..]);
            out
        }
        None => {
            let mut out = page.to_string();
            out.push('\n');
            out.push_str(fragment);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use axum_template::engine::Engine;

    use super::*;

    fn engine() -> Engine<Tera> {
        Engine::from(templates().unwrap())
    }

    fn rendered(widget: &Widget) -> String {
        widget.render(&engine()).unwrap()
    }

    #[test]
    fn renders_one_container_with_two_placeholders() {
        let html = rendered(&Widget::new());

        assert_eq!(html.matches(r#"id="view-counter""#).count(), 1);
        assert_eq!(html.matches(r#"id="view-count-site""#).count(), 1);
        assert_eq!(html.matches(r#"id="view-count-page""#).count(), 1);
    }

    #[test]
    fn starts_with_loading_placeholders() {
        let html = rendered(&Widget::new());
        assert_eq!(html.matches(LOADING).count(), 2);
    }

    #[test]
    fn writes_site_then_page() {
        let mut widget = Widget::new();
        widget.set_counts(Counts { site: 42, page: 7 });
        let html = rendered(&widget);

        assert!(html.contains(r#"id="view-count-site">42</span>"#));
        assert!(html.contains(r#"id="view-count-page">7</span>"#));

        let site_at = html.find("view-count-site").unwrap();
        let page_at = html.find("view-count-page").unwrap();
        assert!(site_at < page_at, "site label comes before the page label");
    }

    #[test]
    fn degrades_both_placeholders() {
        let mut widget = Widget::new();
        widget.degrade(UNKNOWN);
        let html = rendered(&widget);
        assert_eq!(html.matches(UNKNOWN).count(), 2);
    }

    #[test]
    fn attaches_before_closing_body() {
        let page = "<html><body><h1>guide</h1></body></html>";
        let out = attach(page, "<div id=\"view-counter\"></div>");

        assert_eq!(out.matches("view-counter").count(), 1);
        let widget_at = out.find("view-counter").unwrap();
        let body_at = out.find("</body>").unwrap();
        assert!(widget_at < body_at);
        assert!(out.ends_with("</body></html>"));
    }

    #[test]
    fn attaches_at_the_end_without_body_tag() {
        let out = attach("plain fragment", "<div id=\"view-counter\"></div>");
        assert!(out.ends_with("</div>"));
        assert!(out.starts_with("plain fragment"));
    }
}
