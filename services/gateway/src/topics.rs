//! Pub/sub topic derivation (part of C9, `spec.md` §6).
//!
//! Name normalization strips a known prefix, lowercases the first
//! underscore-delimited token, and title-cases the rest:
//! `NASA_OUTDOOR_TW2_TEMP` → `outdoorTw2Temp`.

const STRIPPABLE_PREFIXES: &[&str] = &["ENUM_", "LVAR_", "NASA_", "VAR_", "STR_"];

/// Normalize a repository variable name into a topic-safe identifier.
pub fn normalize_name(name: &str) -> String {
    let stripped = STRIPPABLE_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name);

    stripped
        .split('_')
        .filter(|tok| !tok.is_empty())
        .enumerate()
        .map(|(i, tok)| if i == 0 { tok.to_lowercase() } else { title_case(tok) })
        .collect()
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// `<prefix>/entity/<normalized_name>` (`spec.md` §6).
pub fn state_topic(prefix: &str, raw_name: &str) -> String {
    format!("{prefix}/entity/{}", normalize_name(raw_name))
}

/// `<discovery_root>/<platform>/<device_id>_<normalized_name>/state`
/// (`spec.md` §6), the alternative state topic shape for a discovery-driven
/// downstream consumer.
pub fn discovery_state_topic(discovery_root: &str, platform: &str, device_id: &str, raw_name: &str) -> String {
    format!(
        "{discovery_root}/{platform}/{device_id}_{}/state",
        normalize_name(raw_name)
    )
}

/// `<prefix>/entity/<raw_name>/set` (`spec.md` §6) — the set topic uses the
/// raw repository name, not the normalized form, so control ingress can
/// resolve it directly against the repository.
pub fn set_topic(prefix: &str, raw_name: &str) -> String {
    format!("{prefix}/entity/{raw_name}/set")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_nasa_prefixed_name() {
        assert_eq!(normalize_name("NASA_OUTDOOR_TW2_TEMP"), "outdoorTw2Temp");
    }

    #[test]
    fn normalizes_var_prefixed_name() {
        assert_eq!(normalize_name("VAR_IN_FSV_1031"), "inFsv1031");
    }

    #[test]
    fn normalizes_enum_prefixed_name() {
        assert_eq!(normalize_name("ENUM_OUTDOOR_STATUS"), "outdoorStatus");
    }

    #[test]
    fn leaves_unprefixed_single_token_lowercase() {
        assert_eq!(normalize_name("UPTIME"), "uptime");
    }

    #[test]
    fn state_topic_uses_normalized_name() {
        assert_eq!(
            state_topic("ehsgateway", "NASA_OUTDOOR_TW1_TEMP"),
            "ehsgateway/entity/outdoorTw1Temp"
        );
    }

    #[test]
    fn set_topic_uses_raw_name() {
        assert_eq!(
            set_topic("ehsgateway", "VAR_IN_FSV_1031"),
            "ehsgateway/entity/VAR_IN_FSV_1031/set"
        );
    }
}
