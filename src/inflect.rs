//! Rails-style naming conventions: table names to model names and back.

use std::sync::LazyLock;

use regex::Regex;

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "jeans",
    "police",
    "metadata",
    "data",
    "news"
];

const IRREGULAR: &[(&str, &str)] = &[
    ("people", "person"),
    ("men", "man"),
    ("children", "child"),
    ("sexes", "sex"),
    ("moves", "move"),
    ("zombies", "zombie")
];

/// Singularization rules, first match wins
static SINGULAR_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(database)s$", "${1}"),
        (r"(quiz)zes$", "${1}"),
        (r"(matr)ices$", "${1}ix"),
        (r"(vert|ind)ices$", "${1}ex"),
        (r"^(ox)en", "${1}"),
        (r"(alias|status)(es)?$", "${1}"),
        (r"(octop|vir)i$", "${1}us"),
        (r"(octop|vir|cact|radi|fung|alumn|stimul|syllab)us$", "${1}us"),
        (r"^(a)xes$", "${1}xis"),
        (r"(cris|test)es$", "${1}is"),
        (
            r"(analys|bas|diagnos|ellips|hypothes|oas|paralys|parenthes|synops|thes|cris|test)is$",
            "${1}is"
        ),
        (r"(shoe)s$", "${1}"),
        (r"(o)es$", "${1}"),
        (r"(bus)(es)?$", "${1}"),
        (r"^(m|l)ice$", "${1}ouse"),
        (r"(x|ch|ss|sh)es$", "${1}"),
        (r"(m)ovies$", "${1}ovie"),
        (r"(s)eries$", "${1}eries"),
        (r"([^aeiouy]|qu)ies$", "${1}y"),
        (r"([lr])ves$", "${1}f"),
        (r"(tive)s$", "${1}"),
        (r"(hive)s$", "${1}"),
        (r"([^f])ves$", "${1}fe"),
        (r"(^analy)ses$", "${1}sis"),
        (r"((a)naly|(b)a|(d)iagno|(p)arenthe|(p)rogno|(s)ynop|(t)he)ses$", "${1}sis"),
        (r"(phenomen)a$", "${1}on"),
        (r"^(news)$", "${1}"),
        (r"^([^m].*[ti])a$", "${1}um"),
        (r"^(d)ata$", "${1}atum"),
        (r"(ss)$", "${1}"),
        (r"s$", "")
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Singularize a (possibly underscored) table-style word.
///
/// ```
/// use sql_source_tracer::inflect::singularize;
///
/// assert_eq!(singularize("page_views"), "page_view");
/// assert_eq!(singularize("companies"), "company");
/// assert_eq!(singularize("people"), "person");
/// ```
pub fn singularize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    let (head, last) = match lower.rsplit_once('_') {
        Some((head, last)) => (Some(head), last),
        None => (None, lower.as_str())
    };

    if UNCOUNTABLE.contains(&last) {
        return lower;
    }
    if let Some((_, singular)) = IRREGULAR.iter().find(|(plural, _)| *plural == last) {
        return match head {
            Some(head) => format!("{}_{}", head, singular),
            None => (*singular).to_string()
        };
    }

    for (re, replacement) in SINGULAR_RULES.iter() {
        if re.is_match(&lower) {
            return re.replace(&lower, *replacement).into_owned();
        }
    }
    lower
}

/// `page_view` -> `PageView`
pub fn camelize(word: &str) -> String {
    word.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new()
            }
        })
        .collect()
}

/// `PageView` -> `page_view`
pub fn underscore(word: &str) -> String {
    let mut out = String::with_capacity(word.len() + 4);
    for (i, ch) in word.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a SQL table name to its conventional model class name.
///
/// Schema prefixes and identifier quotes are dropped.
///
/// ```
/// use sql_source_tracer::inflect::table_to_model;
///
/// assert_eq!(table_to_model("page_views"), "PageView");
/// assert_eq!(table_to_model("public.users"), "User");
/// ```
pub fn table_to_model(table: &str) -> String {
    let base = table
        .rsplit('.')
        .next()
        .unwrap_or(table)
        .trim_matches(|c: char| c == '`' || c == '"');
    camelize(&singularize(base))
}
