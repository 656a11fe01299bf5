use std::panic;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 6] = [
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
];

/// Words after which the next chunk is the credential itself.
const CREDENTIAL_PREFIXES: [&str; 2] = ["bearer", "authorization:"];

/// Scrubs credential-looking fragments from free text before it is logged.
pub fn redact_text(input: &str) -> String {
    let mut redact_next = false;
    input
        .split_whitespace()
        .map(|chunk| {
            let lowered = chunk.to_ascii_lowercase();
            let output = if redact_next {
                REDACTED.to_owned()
            } else {
                redact_chunk(chunk, &lowered)
            };
            redact_next = CREDENTIAL_PREFIXES.contains(&lowered.as_str());
            output
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn install_panic_redaction_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload omitted".to_owned());

        let scrubbed = redact_text(&payload);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "chatsync panic: {} at {}:{}:{}",
                scrubbed,
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            eprintln!("chatsync panic: {}", scrubbed);
        }
    }));
}

fn redact_chunk(chunk: &str, lowered: &str) -> String {
    if CREDENTIAL_PREFIXES.contains(&lowered) {
        return chunk.to_owned();
    }

    if SENSITIVE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || looks_like_secret_value(chunk)
    {
        REDACTED.to_owned()
    } else {
        chunk.to_owned()
    }
}

fn looks_like_secret_value(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());

    let has_mixed = cleaned.chars().any(|ch| ch.is_ascii_alphabetic())
        && cleaned.chars().any(|ch| ch.is_ascii_digit());

    cleaned.len() >= 16 && has_mixed
}
