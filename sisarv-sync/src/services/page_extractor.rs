//! HTML state extraction
//!
//! The portal renders its state as HTML and nothing else, so this module is
//! the only place markup is interpreted. Every extraction is pure and
//! tolerant of absence: a page without the expected region yields an empty
//! result, never an error. The rest of the engine consumes the structured
//! [`EditScreen`] snapshot instead of markup.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::models::EditScreen;

/// Marker the portal's intermediate redirect pages carry.
pub const REDIRECT_SHIM_MARKER: &str = "document.redir.submit()";

/// Bodies at or under this length are treated as shim candidates even
/// without the marker.
const SHIM_MAX_LEN: usize = 500;

static PANEL_TBODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)id=["']?panelArvores["']?[^>]*>.*?<table[^>]*>.*?<tbody>(.*?)</tbody>"#,
    )
    .expect("valid regex")
});

static ROW_FIRST_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<tr[^>]*>\s*<td[^>]*>\s*(\d+)\s*</td>").expect("valid regex")
});

static DELETE_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"excluiArvore\s*\(\s*['"](\d+)['"]"#).expect("valid regex")
});

static EDIT_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"abreTelaCadastroInventarioBotanico\s*\(\s*['"](\d+)['"]\s*,\s*['"]consulta['"]\s*\)"#,
    )
    .expect("valid regex")
});

static SELECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<select[^>]+id=["']?([A-Za-z0-9_.:-]+)["']?[^>]*>(.*?)</select>"#)
        .expect("valid regex")
});

static OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<option\s+value="(\d+)"[^>]*>\s*([^<]+?)\s*</option>"#)
        .expect("valid regex")
});

static CSRF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="csrf_key"[^>]*value="([^"]+)""#).expect("valid regex")
});

/// Project numbers already submitted: the first cell of every row inside the
/// inventory tree table.
pub fn existing_project_numbers(html: &str) -> HashSet<u64> {
    let Some(caps) = PANEL_TBODY_RE.captures(html) else {
        return HashSet::new();
    };
    let tbody = &caps[1];
    ROW_FIRST_CELL_RE
        .captures_iter(tbody)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// Entity ids carrying a rendered delete action, de-duplicated with
/// insertion order preserved.
pub fn deletable_entity_ids(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    DELETE_CALL_RE
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// The inventory entity id of the edit-screen-open action scoped to the
/// search-results context.
pub fn edit_screen_entity_id(html: &str) -> Option<String> {
    EDIT_CALL_RE.captures(html).map(|caps| caps[1].to_string())
}

/// Display text → option id for one select control. Entries with empty
/// display text are dropped; a missing control yields an empty catalog.
pub fn option_catalog(html: &str, select_id: &str) -> HashMap<String, String> {
    for caps in SELECT_RE.captures_iter(html) {
        if &caps[1] != select_id {
            continue;
        }
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        return OPTION_RE
            .captures_iter(body)
            .filter_map(|option| {
                let text = option[2].trim().to_string();
                (!text.is_empty()).then(|| (text, option[1].to_string()))
            })
            .collect();
    }
    HashMap::new()
}

/// CSRF token from the login page's hidden field.
pub fn csrf_token(html: &str) -> Option<String> {
    CSRF_RE.captures(html).map(|caps| caps[1].to_string())
}

/// Whether a response body is the client-side auto-submit redirect page
/// rather than real content.
pub fn is_redirect_shim(html: &str) -> bool {
    html.contains(REDIRECT_SHIM_MARKER) || html.len() <= SHIM_MAX_LEN
}

/// Scrape the full structured state of the inventory edit screen.
pub fn edit_screen(html: &str) -> EditScreen {
    EditScreen {
        existing_numbers: existing_project_numbers(html),
        deletable_ids: deletable_entity_ids(html),
        common_names: option_catalog(html, "nome_popular"),
        scientific_names: option_catalog(html, "nome_cientifico"),
    }
}
