//! Helpfile/message renderer (spec §4.7, component D): a per-language
//! message catalog, the `$`-escape/expansion template engine, the line
//! wrapper, and the table sender.

mod table;
mod template;
mod wrap;

pub use table::{Table, TableFlags};
pub use template::Segment;
pub use wrap::LineWrapper;

use std::collections::HashMap;

/// Color/formatting escapes, matching mIRC control codes.
const BOLD: &str = "\u{2}";
const RESET: &str = "\u{f}";
const REVERSE: &str = "\u{16}";
const UNDERLINE: &str = "\u{1f}";

pub const BASE_LANGUAGE: &str = "C";
pub const DEFAULT_LINE_WIDTH: usize = 80;
/// The protocol line cap every screen-width preference is clamped to.
pub const PROTOCOL_LINE_CAP: usize = 400;

/// How a rendered message is ultimately delivered; the actual delivery is
/// an external collaborator (spec §1), this only picks the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    Notice,
    Privmsg,
    Wallchops,
}

/// Values `$(name)` / `${name}` / `$(module:name)` expansions may produce.
#[derive(Debug, Clone)]
pub enum ExpansionValue {
    Text(String),
    Table(Table),
}

/// Per-helpfile custom expansion callback.
pub trait Expander {
    fn expand(&self, name: &str) -> Option<ExpansionValue>;
}

/// Per-module expansion callback, addressed via `$(module:name)`.
pub trait ModuleExpander {
    fn expand(&self, module: &str, name: &str) -> Option<ExpansionValue>;
}

/// The service nicknames substituted for `$G`/`$C`/`$O`/`$N`.
#[derive(Debug, Clone)]
pub struct ServiceNicks {
    pub global: String,
    pub chanserv: String,
    pub opserv: String,
    pub nickserv: String,
}

/// Everything the renderer needs besides the template itself.
pub struct RenderContext<'a> {
    /// `$S` — the nick of the bot sending this particular message.
    pub src_nick: &'a str,
    pub services: &'a ServiceNicks,
    /// `$s` — this server's name.
    pub server_name: &'a str,
    /// `$H` — the recipient's authenticated account, if any.
    pub handle: Option<&'a str>,
    pub use_color: bool,
    pub line_width: usize,
}

/// One flushed unit of output: either a text line or a table to send
/// immediately in place (spec: "An expansion may return ... a table
/// (flushed as its own tabular send)").
#[derive(Debug, Clone)]
pub enum Output {
    Line(String),
    Table(Table, TableFlags),
}

/// A language's message-id -> template map, with a parent language to fall
/// back to for ids it doesn't define.
#[derive(Debug, Clone, Default)]
pub struct LanguageEntry {
    pub parent: Option<String>,
    pub templates: HashMap<String, String>,
}

/// Per-language templates, looked up by walking the parent chain to `C`.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    languages: HashMap<String, LanguageEntry>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCatalog {
    pub fn new() -> Self {
        let mut languages = HashMap::new();
        languages.insert(BASE_LANGUAGE.to_string(), LanguageEntry::default());
        Self { languages }
    }

    pub fn add_language(&mut self, lang: &str, parent: Option<&str>) {
        self.languages.entry(lang.to_string()).or_default().parent = parent.map(str::to_string);
    }

    pub fn set_message(&mut self, lang: &str, id: &str, template: &str) {
        self.languages
            .entry(lang.to_string())
            .or_default()
            .templates
            .insert(id.to_string(), template.to_string());
    }

    /// Walk `lang`'s parent chain (terminating at `C`) looking for `id`.
    pub fn lookup(&self, lang: &str, id: &str) -> Option<&str> {
        let mut current = lang;
        let mut guard = 0;
        loop {
            if let Some(entry) = self.languages.get(current) {
                if let Some(template) = entry.templates.get(id) {
                    return Some(template.as_str());
                }
                match &entry.parent {
                    Some(parent) if parent != current => current = parent,
                    _ if current != BASE_LANGUAGE => current = BASE_LANGUAGE,
                    _ => return None,
                }
            } else if current != BASE_LANGUAGE {
                current = BASE_LANGUAGE;
            } else {
                return None;
            }
            guard += 1;
            if guard > 32 {
                return None; // cyclic parent chain; fail closed rather than loop forever.
            }
        }
    }
}

/// Render `id` in `lang` against `ctx`, delegating custom expansions to
/// `expander`/`modules`. Returns the sequence of flushed lines and tables in
/// emission order; `None` if no language in the chain defines `id`.
pub fn render(
    catalog: &MessageCatalog,
    lang: &str,
    id: &str,
    ctx: &RenderContext<'_>,
    expander: Option<&dyn Expander>,
    modules: Option<&dyn ModuleExpander>,
) -> Option<Vec<Output>> {
    let template = catalog.lookup(lang, id)?;
    Some(render_template(template, ctx, expander, modules))
}

pub fn render_template(
    template: &str,
    ctx: &RenderContext<'_>,
    expander: Option<&dyn Expander>,
    modules: Option<&dyn ModuleExpander>,
) -> Vec<Output> {
    let segments = template::parse(template);
    let width = ctx.line_width.clamp(1, PROTOCOL_LINE_CAP);
    let mut wrapper = LineWrapper::new(width);
    let mut out = Vec::new();

    for segment in segments {
        match segment {
            Segment::Literal(text) => wrapper.push_literal(&text),
            Segment::Dollar(c) => wrapper.push_expansion(&dollar_value(c, ctx)),
            Segment::Named { module, name } => {
                let value = match (&module, modules) {
                    (Some(m), Some(modules)) => modules.expand(m, &name),
                    _ => expander.and_then(|e| e.expand(&name)),
                };
                match value {
                    Some(ExpansionValue::Text(text)) => wrapper.push_expansion(&text),
                    Some(ExpansionValue::Table(table)) => {
                        // Flush whatever is pending, then emit the table as
                        // its own send before resuming text accumulation.
                        let pending = std::mem::replace(&mut wrapper, LineWrapper::new(width));
                        out.extend(pending.finish().into_iter().map(Output::Line));
                        out.push(Output::Table(table, TableFlags::default()));
                    }
                    None => {}
                }
            }
        }
    }

    out.extend(wrapper.finish().into_iter().map(Output::Line));
    out
}

fn dollar_value(c: char, ctx: &RenderContext<'_>) -> String {
    match c {
        '$' => "$".to_string(),
        'b' => if ctx.use_color { BOLD.to_string() } else { String::new() },
        'o' => if ctx.use_color { RESET.to_string() } else { String::new() },
        'r' => if ctx.use_color { REVERSE.to_string() } else { String::new() },
        'u' => if ctx.use_color { UNDERLINE.to_string() } else { String::new() },
        'S' => ctx.src_nick.to_string(),
        'G' => ctx.services.global.clone(),
        'C' => ctx.services.chanserv.clone(),
        'O' => ctx.services.opserv.clone(),
        'N' => ctx.services.nickserv.clone(),
        's' => ctx.server_name.to_string(),
        'H' => ctx.handle.unwrap_or("Account").to_string(),
        other => format!("${other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nicks() -> ServiceNicks {
        ServiceNicks {
            global: "Global".to_string(),
            chanserv: "ChanServ".to_string(),
            opserv: "OpServ".to_string(),
            nickserv: "NickServ".to_string(),
        }
    }

    fn ctx<'a>(nicks: &'a ServiceNicks) -> RenderContext<'a> {
        RenderContext {
            src_nick: "OpServ",
            services: nicks,
            server_name: "services.example.net",
            handle: Some("alice"),
            use_color: false,
            line_width: 80,
        }
    }

    #[test]
    fn language_falls_back_through_parent_chain_to_base() {
        let mut cat = MessageCatalog::new();
        cat.set_message("C", "GREETING", "hello $H");
        cat.add_language("en_gb", Some("C"));
        cat.add_language("en_us", Some("en_gb"));
        assert_eq!(cat.lookup("en_us", "GREETING"), Some("hello $H"));
    }

    #[test]
    fn language_override_takes_precedence_over_parent() {
        let mut cat = MessageCatalog::new();
        cat.set_message("C", "GREETING", "hello $H");
        cat.add_language("es", Some("C"));
        cat.set_message("es", "GREETING", "hola $H");
        assert_eq!(cat.lookup("es", "GREETING"), Some("hola $H"));
    }

    #[test]
    fn missing_id_returns_none() {
        let cat = MessageCatalog::new();
        assert_eq!(cat.lookup("C", "NOPE"), None);
    }

    #[test]
    fn renders_service_nick_escapes_and_account() {
        let nicks = nicks();
        let c = ctx(&nicks);
        let out = render_template("ask $O, I am $S, you are $H", &c, None, None);
        let lines: Vec<String> = out
            .into_iter()
            .map(|o| match o {
                Output::Line(l) => l,
                Output::Table(..) => panic!("unexpected table"),
            })
            .collect();
        assert_eq!(lines, vec!["ask OpServ, I am OpServ, you are alice"]);
    }

    #[test]
    fn custom_expansion_inlines_text() {
        struct Upper;
        impl Expander for Upper {
            fn expand(&self, name: &str) -> Option<ExpansionValue> {
                Some(ExpansionValue::Text(name.to_uppercase()))
            }
        }
        let nicks = nicks();
        let c = ctx(&nicks);
        let out = render_template("value: $(count)", &c, Some(&Upper), None);
        let Output::Line(line) = &out[0] else { panic!() };
        assert_eq!(line, "value: COUNT");
    }

    #[test]
    fn table_expansion_flushes_pending_line_then_emits_table() {
        struct WithTable;
        impl Expander for WithTable {
            fn expand(&self, _name: &str) -> Option<ExpansionValue> {
                Some(ExpansionValue::Table(Table::new(vec![vec!["x".to_string()]])))
            }
        }
        let nicks = nicks();
        let c = ctx(&nicks);
        let out = render_template("before $(t)after", &c, Some(&WithTable), None);
        assert_eq!(out.len(), 3);
        assert!(matches!(out[0], Output::Line(ref l) if l == "before"));
        assert!(matches!(out[1], Output::Table(..)));
        assert!(matches!(out[2], Output::Line(ref l) if l == "after"));
    }

    #[test]
    fn module_qualified_expansion_routes_to_module_expander() {
        struct Modules;
        impl ModuleExpander for Modules {
            fn expand(&self, module: &str, name: &str) -> Option<ExpansionValue> {
                Some(ExpansionValue::Text(format!("{module}/{name}")))
            }
        }
        let nicks = nicks();
        let c = ctx(&nicks);
        let out = render_template("$(opserv:trusts)", &c, None, Some(&Modules));
        let Output::Line(line) = &out[0] else { panic!() };
        assert_eq!(line, "opserv/trusts");
    }
}
