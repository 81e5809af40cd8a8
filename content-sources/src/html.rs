//! Extraction minimale depuis le HTML des publications (blog, CMS)
//!
//! Pas de DOM : on ne lit que le texte brut et les attributs des balises
//! ouvrantes, ce qui suffit pour le résumé et la détection des médias.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Longueur maximale du résumé, en caractères
pub const EXCERPT_LENGTH: usize = 150;

/// Suffixe ajouté au résumé
pub const ELLIPSIS: &str = "...";

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Une balise commence par un nom, `/`, `!` ou `?` : « 3 < 5 » reste du texte
    RE.get_or_init(|| Regex::new(r"(?s)<[A-Za-z/!?][^>]*>").expect("valid tag regex"))
}

fn open_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<([A-Za-z][A-Za-z0-9]*)\b([^>]*)>").expect("valid open tag regex")
    })
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("valid attribute regex")
    })
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z]+);").expect("valid entity regex")
    })
}

/// Texte brut d'un fragment HTML (balises retirées, entités décodées)
pub fn text_content(html: &str) -> String {
    let without_comments = comment_re().replace_all(html, "");
    let without_tags = tag_re().replace_all(&without_comments, "");
    decode_entities(&without_tags)
}

/// Résumé d'un fragment HTML
///
/// Texte tronqué à 150 caractères, retours à la ligne remplacés par des
/// espaces, `...` ajouté, puis espaces de tête retirés.
pub fn excerpt(html: &str) -> String {
    let text: String = text_content(html).chars().take(EXCERPT_LENGTH).collect();
    let mut excerpt = text.replace('\n', " ");
    excerpt.push_str(ELLIPSIS);
    excerpt.trim_start().to_string()
}

/// Attributs des balises ouvrantes `tag`, dans l'ordre du document
pub fn tags<'a>(html: &'a str, tag: &'a str) -> impl Iterator<Item = HashMap<String, String>> + 'a {
    open_tag_re()
        .captures_iter(html)
        .filter(move |caps| caps[1].eq_ignore_ascii_case(tag))
        .map(|caps| parse_attributes(&caps[2]))
}

/// Valeur de `attr` sur la première balise `tag` qui le porte
pub fn first_attr(html: &str, tag: &str, attr: &str) -> Option<String> {
    tags(html, tag).find_map(|mut attrs| attrs.remove(attr))
}

fn parse_attributes(raw: &str) -> HashMap<String, String> {
    attr_re()
        .captures_iter(raw)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            (name, decode_entities(value))
        })
        .collect()
}

/// Décode les entités HTML courantes ; les entités inconnues sont conservées
pub fn decode_entities(text: &str) -> String {
    entity_re()
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(num) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(num, 16).ok().and_then(char::from_u32)
            } else if let Some(num) = entity.strip_prefix('#') {
                num.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };

            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "bull" => '\u{2022}',
        "middot" => '\u{b7}',
        "laquo" => '\u{ab}',
        "raquo" => '\u{bb}',
        "iexcl" => '\u{a1}',
        "iquest" => '\u{bf}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "deg" => '\u{b0}',
        "sect" => '\u{a7}',
        "para" => '\u{b6}',
        "times" => '\u{d7}',
        "divide" => '\u{f7}',
        "frac12" => '\u{bd}',
        "frac14" => '\u{bc}',
        "frac34" => '\u{be}',
        "cent" => '\u{a2}',
        "pound" => '\u{a3}',
        "yen" => '\u{a5}',
        "euro" => '\u{20ac}',
        "shy" => '\u{ad}',
        "szlig" => '\u{df}',
        "agrave" => 'à',
        "aacute" => 'á',
        "acirc" => 'â',
        "atilde" => 'ã',
        "auml" => 'ä',
        "aring" => 'å',
        "aelig" => 'æ',
        "ccedil" => 'ç',
        "egrave" => 'è',
        "eacute" => 'é',
        "ecirc" => 'ê',
        "euml" => 'ë',
        "igrave" => 'ì',
        "iacute" => 'í',
        "icirc" => 'î',
        "iuml" => 'ï',
        "ntilde" => 'ñ',
        "ograve" => 'ò',
        "oacute" => 'ó',
        "ocirc" => 'ô',
        "otilde" => 'õ',
        "ouml" => 'ö',
        "oslash" => 'ø',
        "ugrave" => 'ù',
        "uacute" => 'ú',
        "ucirc" => 'û',
        "uuml" => 'ü',
        "yacute" => 'ý',
        "yuml" => 'ÿ',
        "Agrave" => 'À',
        "Aacute" => 'Á',
        "Acirc" => 'Â',
        "Atilde" => 'Ã',
        "Auml" => 'Ä',
        "Aring" => 'Å',
        "AElig" => 'Æ',
        "Ccedil" => 'Ç',
        "Egrave" => 'È',
        "Eacute" => 'É',
        "Ecirc" => 'Ê',
        "Euml" => 'Ë',
        "Igrave" => 'Ì',
        "Iacute" => 'Í',
        "Icirc" => 'Î',
        "Iuml" => 'Ï',
        "Ntilde" => 'Ñ',
        "Ograve" => 'Ò',
        "Oacute" => 'Ó',
        "Ocirc" => 'Ô',
        "Otilde" => 'Õ',
        "Ouml" => 'Ö',
        "Oslash" => 'Ø',
        "Ugrave" => 'Ù',
        "Uacute" => 'Ú',
        "Ucirc" => 'Û',
        "Uuml" => 'Ü',
        "Yacute" => 'Ý',
        _ => return None,
    };
    Some(c)
}
