//! Taxon name resolution
//!
//! Maps free-text names from the dataset to the internal option ids of the
//! portal's name pickers. Tiered, first hit wins: deployment-manual alias,
//! portal-spelling alias, normalized-text index over the scraped catalog,
//! then literal and upper-cased literal lookup. Pure lookups over the tables
//! and catalog supplied at construction.

use std::collections::HashMap;

use sisarv_common::tables::NameAliases;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalizes a name for comparison: lower-cased, diacritics stripped via
/// NFD decomposition, hyphens/dashes, spaces and periods removed.
pub fn normalize_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| !matches!(c, '-' | '\u{2013}' | '\u{2014}' | ' ' | '.'))
        .collect()
}

/// Alias tables plus one page load's option catalog, indexed for resolution.
pub struct NameLookup<'a> {
    aliases: &'a NameAliases,
    literal: &'a HashMap<String, String>,
    normalized: HashMap<String, String>,
}

impl<'a> NameLookup<'a> {
    /// Index a scraped catalog. The normalized index lives as long as the
    /// page the catalog came from.
    pub fn new(aliases: &'a NameAliases, catalog: &'a HashMap<String, String>) -> Self {
        let normalized = catalog
            .iter()
            .map(|(text, id)| (normalize_name(text), id.clone()))
            .collect();
        Self {
            aliases,
            literal: catalog,
            normalized,
        }
    }

    /// Rewrite an input label toward the portal's spelling: manual alias
    /// first, then the portal-label alias; unmapped labels pass through.
    pub fn portal_label(&self, raw: &str) -> String {
        let manual = self
            .aliases
            .manual
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw);
        let trimmed = manual.trim();
        self.aliases
            .portal
            .get(trimmed)
            .or_else(|| self.aliases.portal.get(manual))
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// Resolve a raw input label to the portal's internal option id.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        self.resolve_label(&self.portal_label(raw))
    }

    /// Resolve an already-rewritten label against the catalog only.
    pub fn resolve_label(&self, label: &str) -> Option<String> {
        self.normalized
            .get(&normalize_name(label))
            .or_else(|| self.literal.get(label))
            .or_else(|| self.literal.get(&label.to_uppercase()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(text, id)| (text.to_string(), id.to_string()))
            .collect()
    }

    #[test]
    fn normalize_strips_diacritics_dashes_spaces_periods() {
        assert_eq!(normalize_name("Ipê-Roxo"), "iperoxo");
        assert_eq!(normalize_name("Cenostigma sp."), "cenostigmasp");
        assert_eq!(normalize_name("  Árvore do Buda "), "arvoredobuda");
        assert_eq!(normalize_name("figueira\u{2013}branca"), "figueirabranca");
    }

    #[test]
    fn verbatim_catalog_labels_resolve() {
        let aliases = NameAliases::default();
        let options = catalog(&[("Sibipiruna", "12"), ("IPÊ-ROXO", "7")]);
        let lookup = NameLookup::new(&aliases, &options);
        assert_eq!(lookup.resolve("Sibipiruna").as_deref(), Some("12"));
    }

    #[test]
    fn diacritic_and_hyphen_drift_resolves_to_same_id() {
        let aliases = NameAliases::default();
        let options = catalog(&[("IPÊ-ROXO", "7")]);
        let lookup = NameLookup::new(&aliases, &options);
        assert_eq!(lookup.resolve("Ipe Roxo").as_deref(), Some("7"));
        assert_eq!(lookup.resolve("ipê roxo").as_deref(), Some("7"));
        assert_eq!(lookup.resolve("IPÊ-ROXO").as_deref(), Some("7"));
    }

    #[test]
    fn alias_rewrites_win_before_normalization() {
        let mut aliases = NameAliases::default();
        aliases
            .portal
            .insert("Ficus lyrata".to_string(), "ficus-lira".to_string());
        let options = catalog(&[("ficus-lira", "31"), ("Ficus lyrata", "99")]);
        let lookup = NameLookup::new(&aliases, &options);
        // The alias redirects away from the literal entry the portal would
        // otherwise mismatch.
        assert_eq!(lookup.portal_label("Ficus lyrata"), "ficus-lira");
        assert_eq!(lookup.resolve("Ficus lyrata").as_deref(), Some("31"));
    }

    #[test]
    fn manual_alias_applies_before_portal_alias() {
        let mut aliases = NameAliases::default();
        aliases
            .manual
            .insert("arvore morta".to_string(), "Morta".to_string());
        aliases
            .portal
            .insert("Morta".to_string(), "não-identificada".to_string());
        let options = catalog(&[("não-identificada", "1")]);
        let lookup = NameLookup::new(&aliases, &options);
        assert_eq!(lookup.resolve("arvore morta").as_deref(), Some("1"));
    }

    #[test]
    fn unknown_label_is_none() {
        let aliases = NameAliases::default();
        let options = catalog(&[("Goiaba", "4")]);
        let lookup = NameLookup::new(&aliases, &options);
        assert_eq!(lookup.resolve("Pau-brasil"), None);
    }
}
