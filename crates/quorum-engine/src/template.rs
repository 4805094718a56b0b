use std::collections::HashMap;

/// Replace every `{{key}}` token in `template` with `vars[key]`.
///
/// Keys are trimmed of surrounding whitespace; absent keys resolve to the
/// empty string. Single pass, no recursive expansion, never fails.
/// Deliberately narrow: provider specs are operator-authored, so this stays
/// a flat token substitution and not a templating engine.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = vars.get(key) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated token: pass the remainder through verbatim.
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}
