use super::prompts::{CANONICAL_DOMAIN, CANONICAL_URL, COMPANY_NAME};

const COMPANY_TOPIC_KEYWORDS: [&str; 9] = [
    "unisole",
    "your company",
    "this company",
    "startup",
    "who are you",
    "what do you do",
    "company website",
    "contact",
    "services",
];

pub fn is_company_topic(user_input: &str) -> bool {
    let normalized = user_input.to_lowercase();
    COMPANY_TOPIC_KEYWORDS
        .iter()
        .any(|keyword| normalized.contains(keyword))
}

/// Appends the website pointer to company-related replies that lack it.
///
/// Idempotent: once the suffix is present the domain check short-circuits.
pub fn post_process_reply(reply: &str, user_input: &str) -> String {
    if is_company_topic(user_input) && !reply.to_lowercase().contains(CANONICAL_DOMAIN) {
        format!("{reply}\n\nYou can learn more about {COMPANY_NAME} at our website: {CANONICAL_URL}")
    } else {
        reply.to_string()
    }
}
